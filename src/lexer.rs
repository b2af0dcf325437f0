//! Splitting a raw input line into shell tokens.
//!
//! The grammar is deliberately flat: words are separated by whitespace and the
//! three operators are only recognised when they stand alone.

use thiserror::Error;

/// Longest line the shell accepts, in bytes.
pub const MAX_INPUT_LENGTH: usize = 2048;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Any whitespace-delimited word that is not an operator.
    Word(String),
    /// Input redirection symbol, `<`.
    RedirectIn,
    /// Output redirection symbol, `>`.
    RedirectOut,
    /// Background marker, `&`.
    Ampersand,
}

impl Token {
    /// Text of the token as it appeared on the line.
    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(w) => w,
            Token::RedirectIn => "<",
            Token::RedirectOut => ">",
            Token::Ampersand => "&",
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    #[error("input line too long ({0} bytes, limit is {max})", max = MAX_INPUT_LENGTH)]
    LineTooLong(usize),
}

/// Splits `line` into tokens.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    if line.len() > MAX_INPUT_LENGTH {
        return Err(LexingError::LineTooLong(line.len()));
    }
    Ok(line
        .split_ascii_whitespace()
        .map(|word| match word {
            "<" => Token::RedirectIn,
            ">" => Token::RedirectOut,
            "&" => Token::Ampersand,
            _ => Token::Word(word.to_string()),
        })
        .collect())
}
