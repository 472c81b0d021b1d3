//! The assembled in-memory RPL.
//!
//! Built once per input file: header, then every section header and
//! payload in index order, then name resolution through the section
//! string table. The result is immutable; the verification passes and
//! the dump/generate tools all take a shared reference.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::constants::*;
use super::error::{RplError, RplResult};
use super::reader::read_section_data;
use super::structures::{
    decode_crc_table, string_at, FileHeader, Rela, RplExports, RplFileInfo, RplImports,
    SectionHeader, Symbol,
};

/// A section: header, resolved name, decoded payload. The payload is
/// the inflated bytes for deflated sections and the raw stored bytes
/// otherwise.
#[derive(Debug)]
pub struct Section {
    pub header: SectionHeader,
    pub name: String,
    pub data: Vec<u8>,
}

impl Section {
    /// Symbol records in this section's payload, at the canonical
    /// record stride.
    pub fn symbols(&self) -> RplResult<Vec<Symbol>> {
        let count = self.data.len() / Symbol::SIZE;
        let mut symbols = Vec::with_capacity(count);
        for i in 0..count {
            symbols.push(Symbol::decode_at(&self.data, i * Symbol::SIZE)?);
        }
        Ok(symbols)
    }

    /// Relocation records in this section's payload, at the canonical
    /// record stride.
    pub fn relas(&self) -> RplResult<Vec<Rela>> {
        let count = self.data.len() / Rela::SIZE;
        let mut relas = Vec::with_capacity(count);
        for i in 0..count {
            relas.push(Rela::decode_at(&self.data, i * Rela::SIZE)?);
        }
        Ok(relas)
    }

    pub fn exports(&self) -> RplResult<RplExports> {
        RplExports::decode(&self.data)
    }

    pub fn imports(&self) -> RplResult<RplImports> {
        RplImports::decode(&self.data)
    }

    pub fn file_info(&self) -> RplResult<RplFileInfo> {
        RplFileInfo::decode(&self.data)
    }

    pub fn crc_table(&self) -> Vec<u32> {
        decode_crc_table(&self.data)
    }

    /// Resolve a string-table offset inside this section's payload.
    pub fn string(&self, offset: u32) -> Option<String> {
        string_at(&self.data, offset as usize)
    }
}

/// The assembled model: file header, index-stable section list
/// (index 0 is the null section), and the input's byte length.
#[derive(Debug)]
pub struct Rpl {
    pub header: FileHeader,
    pub sections: Vec<Section>,
    pub file_size: u32,
}

impl Rpl {
    /// Assemble the model from a seekable byte source.
    ///
    /// A bad signature, any I/O failure, or a section that fails to
    /// inflate aborts assembly; there is no partial model.
    pub fn read<R: Read + Seek>(reader: &mut R) -> RplResult<Rpl> {
        let file_size = reader.seek(SeekFrom::End(0))? as u32;
        reader.seek(SeekFrom::Start(0))?;

        let mut raw = [0u8; FileHeader::SIZE];
        reader.read_exact(&mut raw)?;
        let header = FileHeader::decode(&raw)?;
        if header.magic != HEADER_MAGIC {
            return Err(RplError::InvalidMagic);
        }

        let mut sections = Vec::with_capacity(header.shnum as usize);
        for i in 0..header.shnum as usize {
            let offset = u64::from(header.shoff) + u64::from(header.shentsize) * i as u64;
            reader.seek(SeekFrom::Start(offset))?;

            let mut raw = [0u8; SectionHeader::SIZE];
            reader.read_exact(&mut raw)?;
            let section_header = SectionHeader::decode(&raw)?;
            let data = read_section_data(reader, &section_header, i)?;

            sections.push(Section {
                header: section_header,
                name: String::new(),
                data,
            });
        }

        // Resolve names through the section string table. An
        // out-of-range shstrndx or name offset leaves the name empty;
        // the structural pass reports those, assembly does not fail.
        let shstrndx = header.shstrndx as usize;
        if shstrndx != 0 && shstrndx < sections.len() {
            let names: Vec<Option<String>> = sections
                .iter()
                .map(|s| string_at(&sections[shstrndx].data, s.header.name_offset as usize))
                .collect();
            for (section, name) in sections.iter_mut().zip(names) {
                section.name = name.unwrap_or_default();
            }
        }

        Ok(Rpl {
            header,
            sections,
            file_size,
        })
    }

    /// The SHT_RPL_CRCS section, when the file has one.
    pub fn crc_section(&self) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.header.section_type == SHT_RPL_CRCS)
    }
}

/// Assemble the model from a file on disk.
pub fn read_rpl<P: AsRef<Path>>(path: P) -> RplResult<Rpl> {
    let mut reader = BufReader::new(File::open(path)?);
    Rpl::read(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn push_section_header(table: &mut Vec<u8>, header: &SectionHeader) {
        table.extend_from_slice(&header.name_offset.to_be_bytes());
        table.extend_from_slice(&header.section_type.to_be_bytes());
        table.extend_from_slice(&header.flags.to_be_bytes());
        table.extend_from_slice(&header.addr.to_be_bytes());
        table.extend_from_slice(&header.offset.to_be_bytes());
        table.extend_from_slice(&header.size.to_be_bytes());
        table.extend_from_slice(&header.link.to_be_bytes());
        table.extend_from_slice(&header.info.to_be_bytes());
        table.extend_from_slice(&header.addralign.to_be_bytes());
        table.extend_from_slice(&header.entsize.to_be_bytes());
    }

    fn tiny_file() -> Vec<u8> {
        // Header, then three section headers (null, progbits, shstrtab),
        // then the two payloads.
        let shoff = FileHeader::SIZE as u32;
        let data_offset = shoff + 3 * SECTION_HEADER_SIZE;
        let strtab = b"\0.text\0.shstrtab\0";

        let mut file = vec![0u8; FileHeader::SIZE];
        file[0..4].copy_from_slice(&HEADER_MAGIC.to_be_bytes());
        file[4] = ELF_CLASS_32;
        file[5] = ELF_DATA_2MSB;
        file[6] = EV_CURRENT;
        file[20..24].copy_from_slice(&1u32.to_be_bytes());
        file[32..36].copy_from_slice(&shoff.to_be_bytes());
        file[46..48].copy_from_slice(&(SECTION_HEADER_SIZE as u16).to_be_bytes());
        file[48..50].copy_from_slice(&3u16.to_be_bytes());
        file[50..52].copy_from_slice(&2u16.to_be_bytes());

        push_section_header(&mut file, &SectionHeader::default());
        push_section_header(
            &mut file,
            &SectionHeader {
                name_offset: 1,
                section_type: SHT_PROGBITS,
                flags: SHF_ALLOC | SHF_EXECINSTR,
                offset: data_offset,
                size: 4,
                ..SectionHeader::default()
            },
        );
        push_section_header(
            &mut file,
            &SectionHeader {
                name_offset: 7,
                section_type: SHT_STRTAB,
                offset: data_offset + 4,
                size: strtab.len() as u32,
                ..SectionHeader::default()
            },
        );
        file.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
        file.extend_from_slice(strtab);
        file
    }

    #[test]
    fn assembles_sections_and_resolves_names() {
        let bytes = tiny_file();
        let size = bytes.len() as u32;
        let rpl = Rpl::read(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(rpl.file_size, size);
        assert_eq!(rpl.sections.len(), rpl.header.shnum as usize);
        assert_eq!(rpl.sections[0].name, "");
        assert_eq!(rpl.sections[1].name, ".text");
        assert_eq!(rpl.sections[1].data, [0x60, 0x00, 0x00, 0x00]);
        assert_eq!(rpl.sections[2].name, ".shstrtab");
    }

    #[test]
    fn read_rpl_loads_from_disk() {
        let path = std::env::temp_dir().join("rpl-common-model-tiny.rpx");
        std::fs::write(&path, tiny_file()).unwrap();
        let rpl = read_rpl(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rpl.sections.len(), 3);
        assert_eq!(rpl.sections[1].name, ".text");
    }

    #[test]
    fn bad_magic_aborts_assembly() {
        let mut bytes = tiny_file();
        bytes[0] = 0x7E;
        assert!(matches!(
            Rpl::read(&mut Cursor::new(bytes)),
            Err(RplError::InvalidMagic)
        ));
    }
}
