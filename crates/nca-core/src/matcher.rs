//! Precompiled wildcard name matching.
//!
//! Filter specifications name elements with `*` (any run of characters) and
//! `?` (exactly one character). Patterns are compiled once per specification
//! and evaluated many times, so the hot path is a token walk with no
//! allocation.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    AnyRun,
    AnyOne,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    tokens: Vec<Token>,
    source: String,
}

impl NamePattern {
    pub fn compile(pattern: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    // Collapse consecutive stars
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                }
                '?' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::AnyOne);
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self {
            tokens,
            source: pattern.to_string(),
        }
    }

    /// The pattern text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the pattern matches everything.
    pub fn is_match_all(&self) -> bool {
        !self.tokens.is_empty() && self.tokens.iter().all(|t| *t == Token::AnyRun)
    }

    pub fn matches(&self, name: &str) -> bool {
        let chars: Vec<char> = name.chars().collect();
        Self::matches_from(&self.tokens, &chars)
    }

    fn matches_from(tokens: &[Token], chars: &[char]) -> bool {
        match tokens.first() {
            None => chars.is_empty(),
            Some(Token::AnyOne) => !chars.is_empty() && Self::matches_from(&tokens[1..], &chars[1..]),
            Some(Token::AnyRun) => (0..=chars.len())
                .any(|skip| Self::matches_from(&tokens[1..], &chars[skip..])),
            Some(Token::Literal(lit)) => {
                let lit_chars: Vec<char> = lit.chars().collect();
                chars.len() >= lit_chars.len()
                    && chars[..lit_chars.len()] == lit_chars[..]
                    && Self::matches_from(&tokens[1..], &chars[lit_chars.len()..])
            }
        }
    }
}
