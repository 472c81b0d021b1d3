//! RPL container format handling.
//!
//! This module provides the RPL (CafeOS ELF derivative) implementation:
//! - On-disk layout constants and record decoding
//! - Section payload decoding, including deflated sections
//! - The assembled, immutable `Rpl` model
//! - The six loader-equivalence verification passes

pub use constants::*;
pub use error::{RplError, RplResult};
pub use model::{read_rpl, Rpl, Section};
pub use structures::{
    FileHeader, Rela, RelaInfo, RplExport, RplExports, RplFileInfo, RplImports, SectionHeader,
    Symbol, SymbolInfo,
};
pub use verify::{verify, Verification};

// Modules
pub mod constants;
pub mod error;
pub mod model;
pub mod reader;
pub mod structures;
pub mod verify;
