//! Tokenizer for calculator expressions.
//!
//! Words are checked against the visible array names before any attempt to
//! read them as numbers, so an array called `2Theta` lexes as a name.

use std::collections::BTreeSet;

use super::error::CalcError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// A bare word: array name, function name or constant.
    Ident(String),
    /// A `"quoted"` array name.
    Quoted(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number {v}"),
            Token::Ident(name) => format!("'{name}'"),
            Token::Quoted(name) => format!("\"{name}\""),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::Comma => "','".into(),
        }
    }
}

/// Token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Length in bytes of the leading run of `pred` characters.
fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Length of a numeric literal at the start of `s`: digits, an optional
/// fraction and an optional exponent. Zero when `s` has no mantissa digits.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

pub fn tokenize(src: &str, array_names: &BTreeSet<String>) -> Result<Vec<Spanned>, CalcError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let Some(c) = rest.chars().next() else { break };

        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, position: pos });
            pos += 1;
            continue;
        }

        if c == '"' {
            let body = &rest[1..];
            let Some(close) = body.find('"') else {
                return Err(CalcError::syntax(pos, "unterminated quoted array name"));
            };
            if close == 0 {
                return Err(CalcError::syntax(pos, "empty quoted array name"));
            }
            tokens.push(Spanned {
                token: Token::Quoted(body[..close].to_string()),
                position: pos,
            });
            pos += close + 2;
            continue;
        }

        let word_len = run_len(rest, is_word_char);
        let starts_numeric = c.is_ascii_digit() || c == '.';

        if word_len > 0 && (!starts_numeric || array_names.contains(&rest[..word_len])) {
            tokens.push(Spanned {
                token: Token::Ident(rest[..word_len].to_string()),
                position: pos,
            });
            pos += word_len;
            continue;
        }

        if starts_numeric {
            let len = number_len(rest);
            if len == 0 {
                return Err(CalcError::syntax(pos, format!("unexpected character '{c}'")));
            }
            // A literal glued to letters ("2Theta") is an unknown word, not a
            // number followed by a name.
            if rest[len..].chars().next().is_some_and(is_word_char) {
                let whole = len + run_len(&rest[len..], |ch| is_word_char(ch) || ch == '.');
                return Err(CalcError::UnknownIdentifier {
                    name: rest[..whole].to_string(),
                    position: pos,
                });
            }
            let value = rest[..len]
                .parse::<f64>()
                .map_err(|_| CalcError::syntax(pos, format!("malformed number '{}'", &rest[..len])))?;
            tokens.push(Spanned {
                token: Token::Number(value),
                position: pos,
            });
            pos += len;
            continue;
        }

        return Err(CalcError::syntax(pos, format!("unexpected character '{c}'")));
    }

    Ok(tokens)
}
