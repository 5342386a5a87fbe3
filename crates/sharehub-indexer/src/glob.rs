//! Minimal glob matching for `FindByPartial`.
//!
//! Supports `*` (any run of characters, including empty) and `?` (exactly
//! one character). No character classes and no escaping: index values
//! never contain glob metacharacters after segment escaping.

/// Whether `value` matches the glob `pattern`.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let val: Vec<char> = value.chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut p, mut v) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while v < val.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == val[v]) {
            p += 1;
            v += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, v));
            p += 1;
        } else if let Some((sp, sv)) = star {
            p = sp + 1;
            v = sv + 1;
            star = Some((sp, sv + 1));
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn test_literal() {
        assert!(glob_match("abc", "abc"));
        assert!(!glob_match("abc", "abd"));
        assert!(!glob_match("abc", "abcd"));
    }

    #[test]
    fn test_star() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("user:*", "user:idp:alice"));
        assert!(glob_match("*alice", "user:idp:alice"));
        assert!(glob_match("user:*:alice", "user:idp:alice"));
        assert!(!glob_match("group:*", "user:idp:alice"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(!glob_match("a?c", "abbc"));
    }

    #[test]
    fn test_mixed() {
        assert!(glob_match("s?!*", "s1!r1"));
        assert!(glob_match("*!r?", "s1!r1"));
        assert!(!glob_match("*!r?", "s1!r11"));
    }
}
