use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    /// The candidate string is not a syntactically valid address.
    InvalidAddress(String),
    /// The mixed-case input does not match its EIP-55 checksum.
    ChecksumMismatch(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidAddress(msg) => write!(f, "invalid address: {msg}"),
            ModelError::ChecksumMismatch(addr) => {
                write!(f, "address checksum mismatch: {addr}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
