//! RPL Common Library
//!
//! Shared components between the rpl tool binaries: the on-disk format
//! model, the section decoder, the assembled in-memory `Rpl`, and the
//! loader-equivalent verification passes.

pub mod elf;

// Re-export commonly used items
pub use elf::error::{RplError, RplResult};
pub use elf::model::{read_rpl, Rpl, Section};
pub use elf::verify::{verify, Finding, PassReport, Verification};
