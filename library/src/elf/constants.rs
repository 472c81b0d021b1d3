//! On-disk constants for the RPL container format.
//!
//! All values match what the CafeOS loader accepts; the vendor section
//! types and `SHF_DEFLATED` live in the OS-specific ranges of the
//! regular ELF numbering.

/// The 4-byte signature at the start of every file, `\x7fELF` read big-endian.
pub const HEADER_MAGIC: u32 = 0x7F45_4C46;

/// Size of the on-disk file header.
pub const FILE_HEADER_SIZE: u32 = 0x34;
/// Size of one on-disk section header.
pub const SECTION_HEADER_SIZE: u32 = 0x28;
/// Size of one on-disk symbol record.
pub const SYMBOL_SIZE: u32 = 0x10;
/// Size of one on-disk relocation record.
pub const RELA_SIZE: u32 = 0x0C;
/// Size of the fixed part of the file-info block.
pub const FILE_INFO_SIZE: usize = 0x60;
/// Default program-header entry size when the header stores zero.
pub const PROGRAM_HEADER_SIZE: u32 = 0x20;

/// Smallest file the loader will even look at.
pub const MIN_FILE_SIZE: u32 = 0x104;

// e_ident values
pub const ELF_CLASS_32: u8 = 1;
pub const ELF_DATA_2MSB: u8 = 2;
pub const EV_CURRENT: u8 = 1;
pub const EABI_CAFE: u16 = 0xCAFE;

// File types
pub const ET_NONE: u16 = 0;
pub const ET_REL: u16 = 1;
pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;
pub const ET_CORE: u16 = 4;
pub const ET_CAFE_RPL: u16 = 0xFE01;

// Machine
pub const EM_PPC: u16 = 20;

// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_SHLIB: u32 = 10;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_INIT_ARRAY: u32 = 14;
pub const SHT_FINI_ARRAY: u32 = 15;
pub const SHT_PREINIT_ARRAY: u32 = 16;
pub const SHT_GROUP: u32 = 17;
pub const SHT_SYMTAB_SHNDX: u32 = 18;
pub const SHT_LOPROC: u32 = 0x7000_0000;
pub const SHT_HIPROC: u32 = 0x7FFF_FFFF;
pub const SHT_LOUSER: u32 = 0x8000_0000;
pub const SHT_RPL_EXPORTS: u32 = 0x8000_0001;
pub const SHT_RPL_IMPORTS: u32 = 0x8000_0002;
pub const SHT_RPL_CRCS: u32 = 0x8000_0003;
pub const SHT_RPL_FILEINFO: u32 = 0x8000_0004;
pub const SHT_HIUSER: u32 = 0xFFFF_FFFF;

// Section flags
pub const SHF_WRITE: u32 = 0x1;
pub const SHF_ALLOC: u32 = 0x2;
pub const SHF_EXECINSTR: u32 = 0x4;
/// Section payload is stored as a 4-byte inflated size followed by a zlib stream.
pub const SHF_DEFLATED: u32 = 0x0800_0000;

// Special section indices
pub const SHN_UNDEF: u16 = 0;
pub const SHN_LORESERVE: u16 = 0xFF00;
pub const SHN_ABS: u16 = 0xFFF1;
pub const SHN_COMMON: u16 = 0xFFF2;
pub const SHN_XINDEX: u16 = 0xFFFF;

// Symbol bindings
pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STB_WEAK: u8 = 2;
pub const STB_GNU_UNIQUE: u8 = 10;

// Symbol types
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STT_SECTION: u8 = 3;
pub const STT_FILE: u8 = 4;
pub const STT_COMMON: u8 = 5;
pub const STT_TLS: u8 = 6;
pub const STT_LOOS: u8 = 10;
pub const STT_HIOS: u8 = 12;
pub const STT_GNU_IFUNC: u8 = 10;

// PowerPC relocation types
pub const R_PPC_NONE: u8 = 0;
pub const R_PPC_ADDR32: u8 = 1;
pub const R_PPC_ADDR16_LO: u8 = 4;
pub const R_PPC_ADDR16_HI: u8 = 5;
pub const R_PPC_ADDR16_HA: u8 = 6;
pub const R_PPC_REL24: u8 = 10;
pub const R_PPC_REL14: u8 = 11;
pub const R_PPC_DTPMOD32: u8 = 68;
pub const R_PPC_DTPREL32: u8 = 78;
pub const R_PPC_EMB_SDA21: u8 = 109;
pub const R_PPC_EMB_RELSDA: u8 = 116;
pub const R_PPC_DIAB_SDA21_LO: u8 = 180;
pub const R_PPC_DIAB_SDA21_HI: u8 = 181;
pub const R_PPC_DIAB_SDA21_HA: u8 = 182;
pub const R_PPC_DIAB_RELSDA_LO: u8 = 183;
pub const R_PPC_DIAB_RELSDA_HI: u8 = 184;
pub const R_PPC_DIAB_RELSDA_HA: u8 = 185;
pub const R_PPC_GHS_REL16_HA: u8 = 251;
pub const R_PPC_GHS_REL16_HI: u8 = 252;
pub const R_PPC_GHS_REL16_LO: u8 = 253;

/// Relocation types the hardware loader applies; anything else is
/// reported by the relocation-type verification pass.
pub const SUPPORTED_RELOCATION_TYPES: &[u8] = &[
    R_PPC_NONE,
    R_PPC_ADDR32,
    R_PPC_ADDR16_LO,
    R_PPC_ADDR16_HI,
    R_PPC_ADDR16_HA,
    R_PPC_REL24,
    R_PPC_REL14,
    R_PPC_DTPMOD32,
    R_PPC_DTPREL32,
    R_PPC_EMB_SDA21,
    R_PPC_EMB_RELSDA,
    R_PPC_DIAB_SDA21_LO,
    R_PPC_DIAB_SDA21_HI,
    R_PPC_DIAB_SDA21_HA,
    R_PPC_DIAB_RELSDA_LO,
    R_PPC_DIAB_RELSDA_HI,
    R_PPC_DIAB_RELSDA_HA,
    R_PPC_GHS_REL16_HA,
    R_PPC_GHS_REL16_HI,
    R_PPC_GHS_REL16_LO,
];
