//! Public link token generation.

use rand::distr::Alphanumeric;
use rand::Rng;

/// Generate a random alphanumeric link token.
///
/// Tokens address blobs directly, so the alphabet is restricted to
/// characters that never need path escaping.
pub fn generate_token(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::generate_token;

    #[test]
    fn test_length_and_alphabet() {
        let token = generate_token(15);
        assert_eq!(token.len(), 15);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_differ() {
        assert_ne!(generate_token(15), generate_token(15));
    }
}
