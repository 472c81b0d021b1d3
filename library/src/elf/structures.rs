//! On-disk record layouts and their decoding.
//!
//! Every multi-byte field is stored big-endian. Decoding is explicit
//! and bounds-checked: each record validates the slice length before
//! touching any field, so a malformed table can never read out of
//! bounds. Checksums are always computed over the stored bytes, not
//! over re-encoded host values.

use super::constants::*;
use super::error::{RplError, RplResult};

#[inline]
fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[inline]
fn be32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn check_len(record: &'static str, data: &[u8], offset: usize, needed: usize) -> RplResult<()> {
    if data.len() < offset + needed {
        return Err(RplError::Truncated {
            record,
            offset,
            needed,
            len: data.len(),
        });
    }
    Ok(())
}

/// Read the NUL-terminated string starting at `offset`, if it lies
/// within `data`. Unterminated tails and out-of-range offsets yield
/// `None`; non-UTF8 bytes are replaced.
pub fn string_at(data: &[u8], offset: usize) -> Option<String> {
    if offset >= data.len() {
        return None;
    }
    let tail = &data[offset..];
    let end = tail.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// The file header.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub magic: u32,
    pub file_class: u8,
    pub encoding: u8,
    pub elf_version: u8,
    pub abi: u16,
    pub file_type: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u32,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    pub const SIZE: usize = FILE_HEADER_SIZE as usize;

    pub fn decode(data: &[u8]) -> RplResult<FileHeader> {
        check_len("file header", data, 0, Self::SIZE)?;
        Ok(FileHeader {
            magic: be32(data, 0),
            file_class: data[4],
            encoding: data[5],
            elf_version: data[6],
            abi: be16(data, 7),
            // 7 bytes of ident padding
            file_type: be16(data, 16),
            machine: be16(data, 18),
            version: be32(data, 20),
            entry: be32(data, 24),
            phoff: be32(data, 28),
            shoff: be32(data, 32),
            flags: be32(data, 36),
            ehsize: be16(data, 40),
            phentsize: be16(data, 42),
            phnum: be16(data, 44),
            shentsize: be16(data, 46),
            shnum: be16(data, 48),
            shstrndx: be16(data, 50),
        })
    }
}

/// A section header.
#[derive(Debug, Clone, Default)]
pub struct SectionHeader {
    pub name_offset: u32,
    pub section_type: u32,
    pub flags: u32,
    pub addr: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub addralign: u32,
    pub entsize: u32,
}

impl SectionHeader {
    pub const SIZE: usize = SECTION_HEADER_SIZE as usize;

    pub fn decode(data: &[u8]) -> RplResult<SectionHeader> {
        check_len("section header", data, 0, Self::SIZE)?;
        Ok(SectionHeader {
            name_offset: be32(data, 0),
            section_type: be32(data, 4),
            flags: be32(data, 8),
            addr: be32(data, 12),
            offset: be32(data, 16),
            size: be32(data, 20),
            link: be32(data, 24),
            info: be32(data, 28),
            addralign: be32(data, 32),
            entsize: be32(data, 36),
        })
    }

    pub fn is_deflated(&self) -> bool {
        self.flags & SHF_DEFLATED != 0
    }
}

/// Binding and type packed into the high/low nibbles of `Symbol::info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub binding: u8,
    pub sym_type: u8,
}

impl SymbolInfo {
    pub fn unpack(info: u8) -> SymbolInfo {
        SymbolInfo {
            binding: info >> 4,
            sym_type: info & 0xF,
        }
    }

    pub fn pack(self) -> u8 {
        (self.binding << 4) | (self.sym_type & 0xF)
    }
}

/// A symbol table entry.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name_offset: u32,
    pub value: u32,
    pub size: u32,
    pub info: u8,
    pub other: u8,
    pub shndx: u16,
}

impl Symbol {
    pub const SIZE: usize = SYMBOL_SIZE as usize;

    pub fn decode_at(data: &[u8], offset: usize) -> RplResult<Symbol> {
        check_len("symbol", data, offset, Self::SIZE)?;
        Ok(Symbol {
            name_offset: be32(data, offset),
            value: be32(data, offset + 4),
            size: be32(data, offset + 8),
            info: data[offset + 12],
            other: data[offset + 13],
            shndx: be16(data, offset + 14),
        })
    }

    pub fn info(&self) -> SymbolInfo {
        SymbolInfo::unpack(self.info)
    }
}

/// Symbol index and relocation type packed into `Rela::info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaInfo {
    pub symbol: u32,
    pub rel_type: u8,
}

impl RelaInfo {
    pub fn unpack(info: u32) -> RelaInfo {
        RelaInfo {
            symbol: info >> 8,
            rel_type: (info & 0xFF) as u8,
        }
    }

    pub fn pack(self) -> u32 {
        (self.symbol << 8) | u32::from(self.rel_type)
    }
}

/// A relocation entry with addend.
#[derive(Debug, Clone)]
pub struct Rela {
    pub offset: u32,
    pub info: u32,
    pub addend: i32,
}

impl Rela {
    pub const SIZE: usize = RELA_SIZE as usize;

    pub fn decode_at(data: &[u8], offset: usize) -> RplResult<Rela> {
        check_len("relocation", data, offset, Self::SIZE)?;
        Ok(Rela {
            offset: be32(data, offset),
            info: be32(data, offset + 4),
            addend: be32(data, offset + 8) as i32,
        })
    }

    pub fn info(&self) -> RelaInfo {
        RelaInfo::unpack(self.info)
    }
}

/// Decode a SHT_RPL_CRCS payload: one big-endian CRC-32 per section,
/// index-aligned with the section table. A trailing partial entry is
/// ignored.
pub fn decode_crc_table(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// The SHT_RPL_FILEINFO loader metadata block.
#[derive(Debug, Clone)]
pub struct RplFileInfo {
    pub version: u32,
    pub text_size: u32,
    pub text_align: u32,
    pub data_size: u32,
    pub data_align: u32,
    pub load_size: u32,
    pub load_align: u32,
    pub temp_size: u32,
    pub tramp_adjust: u32,
    pub sda_base: u32,
    pub sda2_base: u32,
    pub stack_size: u32,
    pub filename: u32,
    pub flags: u32,
    pub heap_size: u32,
    pub tag_offset: u32,
    pub min_version: u32,
    pub compression_level: i32,
    pub tramp_addition: u32,
    pub file_info_pad: u32,
    pub cafe_sdk_version: u32,
    pub cafe_sdk_revision: u32,
    pub tls_module_index: u16,
    pub tls_align_shift: u16,
    pub runtime_file_info_size: u32,
}

impl RplFileInfo {
    pub const SIZE: usize = FILE_INFO_SIZE;

    pub fn decode(data: &[u8]) -> RplResult<RplFileInfo> {
        check_len("file info", data, 0, Self::SIZE)?;
        Ok(RplFileInfo {
            version: be32(data, 0x00),
            text_size: be32(data, 0x04),
            text_align: be32(data, 0x08),
            data_size: be32(data, 0x0C),
            data_align: be32(data, 0x10),
            load_size: be32(data, 0x14),
            load_align: be32(data, 0x18),
            temp_size: be32(data, 0x1C),
            tramp_adjust: be32(data, 0x20),
            sda_base: be32(data, 0x24),
            sda2_base: be32(data, 0x28),
            stack_size: be32(data, 0x2C),
            filename: be32(data, 0x30),
            flags: be32(data, 0x34),
            heap_size: be32(data, 0x38),
            tag_offset: be32(data, 0x3C),
            min_version: be32(data, 0x40),
            compression_level: be32(data, 0x44) as i32,
            tramp_addition: be32(data, 0x48),
            file_info_pad: be32(data, 0x4C),
            cafe_sdk_version: be32(data, 0x50),
            cafe_sdk_revision: be32(data, 0x54),
            tls_module_index: be16(data, 0x58),
            tls_align_shift: be16(data, 0x5A),
            runtime_file_info_size: be32(data, 0x5C),
        })
    }

    /// The module filename, when the block carries one.
    pub fn filename_in(&self, data: &[u8]) -> Option<String> {
        if self.filename == 0 {
            return None;
        }
        string_at(data, self.filename as usize)
    }

    /// The tag blob: consecutive NUL-terminated key/value pairs,
    /// terminated by an empty key.
    pub fn tags_in(&self, data: &[u8]) -> Vec<(String, String)> {
        let mut tags = Vec::new();
        if self.tag_offset == 0 {
            return tags;
        }

        let mut offset = self.tag_offset as usize;
        while let Some(key) = string_at(data, offset) {
            if key.is_empty() {
                break;
            }
            offset += key.len() + 1;
            let Some(value) = string_at(data, offset) else {
                break;
            };
            offset += value.len() + 1;
            tags.push((key, value));
        }
        tags
    }
}

/// One export table entry. `name_offset` keeps its stored top bit,
/// which flags a TLS export.
#[derive(Debug, Clone, Copy)]
pub struct RplExport {
    pub value: u32,
    pub name_offset: u32,
}

impl RplExport {
    pub fn is_tls(&self) -> bool {
        self.name_offset & 0x8000_0000 != 0
    }

    pub fn name_in(&self, data: &[u8]) -> Option<String> {
        string_at(data, (self.name_offset & 0x7FFF_FFFF) as usize)
    }
}

/// A decoded SHT_RPL_EXPORTS payload. On disk: count, signature, then
/// `count` (value, name offset) pairs, followed by the name strings.
#[derive(Debug, Clone)]
pub struct RplExports {
    pub count: u32,
    pub signature: u32,
    pub entries: Vec<RplExport>,
}

impl RplExports {
    pub fn decode(data: &[u8]) -> RplResult<RplExports> {
        check_len("export table", data, 0, 8)?;
        let count = be32(data, 0);
        let signature = be32(data, 4);
        check_len("export table", data, 8, (count as usize).saturating_mul(8))?;

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let offset = 8 + i * 8;
            entries.push(RplExport {
                value: be32(data, offset),
                name_offset: be32(data, offset + 4),
            });
        }
        Ok(RplExports {
            count,
            signature,
            entries,
        })
    }
}

/// A decoded SHT_RPL_IMPORTS payload: count, signature, then the
/// imported library's name.
#[derive(Debug, Clone)]
pub struct RplImports {
    pub count: u32,
    pub signature: u32,
    pub name: String,
}

impl RplImports {
    pub fn decode(data: &[u8]) -> RplResult<RplImports> {
        check_len("import table", data, 0, 8)?;
        Ok(RplImports {
            count: be32(data, 0),
            signature: be32(data, 4),
            name: string_at(data, 8).unwrap_or_default(),
        })
    }
}
