//! Hard errors raised while assembling an `Rpl`.
//!
//! These abort loading entirely; structural problems a loaded file may
//! have are reported as verification findings instead, never as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RplError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid ELF magic header")]
    InvalidMagic,
    #[error("{record} record truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        record: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("couldn't decompress section {section}: {reason}")]
    Decompress { section: usize, reason: String },
    #[error("deflated section {section} is too short for its size prefix")]
    DeflatedTooShort { section: usize },
}

/// Result type for RPL operations.
pub type RplResult<T> = Result<T, RplError>;
