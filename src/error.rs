/// Parse failure reporting
use thiserror::Error;

/// Fatal parse failure, carrying the 0-based line number and the content of
/// the line the scanner was on when it gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}:\n\t{content}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub content: String,
}

pub type Result<T> = std::result::Result<T, ParseError>;
