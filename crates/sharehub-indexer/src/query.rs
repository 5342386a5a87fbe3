//! Boolean query expressions over indexed fields.
//!
//! Grammar (keywords are case-insensitive, `and` binds tighter than `or`):
//!
//! ```text
//! expr     := and_expr ( "or" and_expr )*
//! and_expr := factor ( "and" factor )*
//! factor   := "(" expr ")"
//!           | "startswith" "(" field "," string ")"
//!           | field "eq" string
//! string   := "'" chars "'"
//! ```
//!
//! Example: `owner eq 'user:idp:alice' and startswith(resource,'s1!')`

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Equality against an indexed value.
    Eq {
        /// Index field name.
        field: String,
        /// Value to match.
        value: String,
    },
    /// Prefix match against indexed values.
    StartsWith {
        /// Index field name.
        field: String,
        /// Prefix to match.
        prefix: String,
    },
    /// Intersection of both operands' result sets.
    And(Box<Expr>, Box<Expr>),
    /// Union of both operands' result sets.
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> AppResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut lit = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => lit.push(c),
                        None => {
                            return Err(AppError::invalid_argument(
                                "unterminated string literal in query",
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(lit));
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c => {
                return Err(AppError::invalid_argument(format!(
                    "unexpected character '{c}' in query"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: Token, what: &str) -> AppResult<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(AppError::invalid_argument(format!(
                "expected {what} in query, got {other:?}"
            ))),
        }
    }

    fn expr(&mut self) -> AppResult<Expr> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> AppResult<Expr> {
        let mut left = self.factor()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.factor()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> AppResult<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "closing parenthesis")?;
                Ok(inner)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("startswith") => {
                self.expect(Token::LParen, "'(' after startswith")?;
                let field = match self.next() {
                    Some(Token::Ident(f)) => f,
                    other => {
                        return Err(AppError::invalid_argument(format!(
                            "expected field name in startswith, got {other:?}"
                        )))
                    }
                };
                self.expect(Token::Comma, "',' in startswith")?;
                let prefix = match self.next() {
                    Some(Token::Str(s)) => s,
                    other => {
                        return Err(AppError::invalid_argument(format!(
                            "expected string literal in startswith, got {other:?}"
                        )))
                    }
                };
                self.expect(Token::RParen, "')' after startswith")?;
                Ok(Expr::StartsWith { field, prefix })
            }
            Some(Token::Ident(field)) => {
                match self.next() {
                    Some(Token::Ident(op)) if op.eq_ignore_ascii_case("eq") => {}
                    other => {
                        return Err(AppError::invalid_argument(format!(
                            "expected 'eq' after field '{field}', got {other:?}"
                        )))
                    }
                }
                let value = match self.next() {
                    Some(Token::Str(s)) => s,
                    other => {
                        return Err(AppError::invalid_argument(format!(
                            "expected string literal after 'eq', got {other:?}"
                        )))
                    }
                };
                Ok(Expr::Eq { field, value })
            }
            other => Err(AppError::invalid_argument(format!(
                "expected predicate in query, got {other:?}"
            ))),
        }
    }
}

/// Parse a query expression.
pub fn parse(input: &str) -> AppResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(AppError::invalid_argument("empty query"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(AppError::invalid_argument(format!(
            "trailing tokens in query after position {}",
            parser.pos
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: &str) -> Expr {
        Expr::Eq {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_parse_eq() {
        assert_eq!(parse("owner eq 'alice'").unwrap(), eq("owner", "alice"));
    }

    #[test]
    fn test_parse_startswith() {
        assert_eq!(
            parse("startswith(resource,'s1!')").unwrap(),
            Expr::StartsWith {
                field: "resource".to_string(),
                prefix: "s1!".to_string(),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // a or b and c == a or (b and c)
        let expr = parse("owner eq 'a' or owner eq 'b' and grantee eq 'c'").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(eq("owner", "a")),
                Box::new(Expr::And(
                    Box::new(eq("owner", "b")),
                    Box::new(eq("grantee", "c")),
                )),
            )
        );
    }

    #[test]
    fn test_parentheses_override() {
        let expr = parse("(owner eq 'a' or owner eq 'b') and grantee eq 'c'").unwrap();
        assert_eq!(
            expr,
            Expr::And(
                Box::new(Expr::Or(
                    Box::new(eq("owner", "a")),
                    Box::new(eq("owner", "b")),
                )),
                Box::new(eq("grantee", "c")),
            )
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert!(parse("owner EQ 'a' AND grantee Eq 'b'").is_ok());
        assert!(parse("STARTSWITH(owner,'a') OR owner eq 'b'").is_ok());
    }

    #[test]
    fn test_values_with_specials() {
        assert_eq!(
            parse("owner eq 'user:idp:alice'").unwrap(),
            eq("owner", "user:idp:alice")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("owner eq").is_err());
        assert!(parse("owner eq 'unterminated").is_err());
        assert!(parse("owner eq 'a' extra").is_err());
        assert!(parse("(owner eq 'a'").is_err());
        assert!(parse("startswith(owner 'a')").is_err());
    }
}
