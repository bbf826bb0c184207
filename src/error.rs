//! Error taxonomy shared by every layer of the engine.
//!
//! Each public call reports failure as one of these variants; nothing
//! unwinds across the crate boundary.

use std::io;
use thiserror::Error;

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed bytes or a structural rule of the container was broken.
    #[error("Format error: {0}")]
    Format(String),
    /// The operation is not allowed in the current writer/reader state.
    #[error("State error: {0}")]
    State(String),
    #[error("Frame {frame} out of range (frame count {count})")]
    Range { frame: u32, count: u32 },
    /// A check value or cipher authentication failed.
    #[error("Integrity error: {0}")]
    Integrity(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Track file is not open")]
    NotOpen,
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyDerivation(msg) => Error::State(format!("key derivation failed: {msg}")),
            other => Error::Integrity(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = Error::Range { frame: 3, count: 3 };
        assert!(err.to_string().contains("Frame 3"));

        let err = Error::format("bad BER length");
        assert!(err.is_format());
        assert!(err.to_string().contains("bad BER length"));
    }

    #[test]
    fn crypto_failures_become_integrity_errors() {
        let err: Error = CryptoError::DecryptionFailed.into();
        assert!(err.is_integrity());
    }
}
