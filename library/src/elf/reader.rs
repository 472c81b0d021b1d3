//! Section payload decoding.
//!
//! Reads one section's bytes from the input, transparently inflating
//! deflated sections. Decompression problems are hard errors: a file
//! whose payloads cannot be reconstructed has nothing to verify.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;

use super::constants::SHT_NOBITS;
use super::error::{RplError, RplResult};
use super::structures::SectionHeader;

/// Decode the payload of `header`, the section at `index`.
///
/// SHT_NOBITS and zero-size sections own no file bytes and decode to an
/// empty buffer. A deflated section stores a 4-byte big-endian inflated
/// size followed by `size - 4` bytes of zlib stream; the returned
/// buffer is exactly the inflated size.
pub fn read_section_data<R: Read + Seek>(
    reader: &mut R,
    header: &SectionHeader,
    index: usize,
) -> RplResult<Vec<u8>> {
    if header.section_type == SHT_NOBITS || header.size == 0 {
        return Ok(Vec::new());
    }

    reader.seek(SeekFrom::Start(u64::from(header.offset)))?;

    if header.is_deflated() {
        if header.size < 4 {
            return Err(RplError::DeflatedTooShort { section: index });
        }

        let inflated_size = reader.read_u32::<BigEndian>()?;
        let mut compressed = vec![0u8; header.size as usize - 4];
        reader.read_exact(&mut compressed)?;

        // Consume the whole stream so the zlib checksum is verified; a
        // corrupt stream must fail, never hand back silent garbage.
        let mut data = Vec::with_capacity(inflated_size as usize);
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut data)
            .map_err(|e| RplError::Decompress {
                section: index,
                reason: e.to_string(),
            })?;
        if data.len() != inflated_size as usize {
            return Err(RplError::Decompress {
                section: index,
                reason: format!(
                    "inflated to {} bytes, header declared {}",
                    data.len(),
                    inflated_size
                ),
            });
        }
        Ok(data)
    } else {
        let mut data = vec![0u8; header.size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::constants::{SHF_DEFLATED, SHT_PROGBITS};
    use flate2::read::ZlibEncoder;
    use flate2::Compression;
    use std::io::Cursor;

    fn deflate(payload: &[u8]) -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        ZlibEncoder::new(payload, Compression::default())
            .read_to_end(&mut stream)
            .unwrap();
        stream
    }

    fn header(section_type: u32, flags: u32, offset: u32, size: u32) -> SectionHeader {
        SectionHeader {
            section_type,
            flags,
            offset,
            size,
            ..SectionHeader::default()
        }
    }

    #[test]
    fn nobits_and_empty_sections_read_nothing() {
        let mut cursor = Cursor::new(Vec::new());
        let nobits = header(SHT_NOBITS, 0, 0x1000, 0x400);
        assert!(read_section_data(&mut cursor, &nobits, 1)
            .unwrap()
            .is_empty());

        let empty = header(SHT_PROGBITS, 0, 0x1000, 0);
        assert!(read_section_data(&mut cursor, &empty, 2).unwrap().is_empty());
    }

    #[test]
    fn raw_sections_read_exactly_size_bytes() {
        let mut file = vec![0xAAu8; 8];
        file.extend_from_slice(b"payload!");
        file.extend_from_slice(&[0xBB; 8]);

        let raw = header(SHT_PROGBITS, 0, 8, 8);
        let data = read_section_data(&mut Cursor::new(file), &raw, 1).unwrap();
        assert_eq!(data, b"payload!");
    }

    #[test]
    fn deflated_sections_round_trip() {
        let payload: Vec<u8> = (0u32..2048).map(|i| (i * 7) as u8).collect();
        let stream = deflate(&payload);

        let deflated = header(SHT_PROGBITS, SHF_DEFLATED, 0, stream.len() as u32);
        let data = read_section_data(&mut Cursor::new(stream), &deflated, 1).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn corrupt_deflate_stream_is_a_hard_error() {
        let payload: Vec<u8> = (0u32..1024).map(|i| (i % 251) as u8).collect();
        let mut stream = deflate(&payload);
        let mid = 4 + (stream.len() - 4) / 2;
        stream[mid] ^= 0x01;

        let deflated = header(SHT_PROGBITS, SHF_DEFLATED, 0, stream.len() as u32);
        let err = read_section_data(&mut Cursor::new(stream), &deflated, 3).unwrap_err();
        assert!(matches!(err, RplError::Decompress { section: 3, .. }));
    }
}
