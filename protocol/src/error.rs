use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("room code must be {expected} chars, got {found}")]
    InvalidLength { expected: usize, found: usize },
    #[error("invalid character '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
    #[error("malformed document: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, ProtocolError>;
