//! Loader-equivalence verification passes.
//!
//! Six independent passes over an assembled `Rpl`. Each returns
//! pass/fail plus accumulated findings; a failing pass never stops the
//! others, so one run reports every problem the hardware loader would
//! hit. The numeric codes are the loader's own error taxonomy and are
//! preserved verbatim.
//!
//! Four passes gate the overall verdict (structure, CRCs, file bounds,
//! alignment). The relocation-type and trailing-section passes are
//! advisory: the loader demonstrably tolerates what they flag, so
//! their findings are reported without affecting `accepted()`.

use std::collections::HashSet;
use std::fmt;

use super::constants::*;
use super::model::{Rpl, Section};
use super::structures::{Rela, Symbol};

/// One diagnostic from a verification pass: an optional fixed loader
/// error code plus free-form context.
#[derive(Debug, Clone)]
pub struct Finding {
    pub code: Option<u32>,
    pub context: String,
}

impl Finding {
    fn check_failed(code: u32) -> Finding {
        Finding {
            code: Some(code),
            context: String::new(),
        }
    }

    fn check_failed_with(code: u32, context: String) -> Finding {
        Finding {
            code: Some(code),
            context,
        }
    }

    fn message(context: impl Into<String>) -> Finding {
        Finding {
            code: None,
            context: context.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => {
                write!(f, "*** Failed ELF file checks (err=0x{:08X})", code)?;
                if !self.context.is_empty() {
                    write!(f, "\n{}", self.context)?;
                }
                Ok(())
            }
            None => write!(f, "{}", self.context),
        }
    }
}

/// Outcome of a single pass.
#[derive(Debug)]
pub struct PassReport {
    pub passed: bool,
    pub findings: Vec<Finding>,
}

/// All six pass reports for one file.
#[derive(Debug)]
pub struct Verification {
    pub file: PassReport,
    pub crcs: PassReport,
    pub bounds: PassReport,
    pub relocation_types: PassReport,
    pub alignment: PassReport,
    pub section_order: PassReport,
}

impl Verification {
    /// The loader's acceptance verdict: the conjunction of the gating
    /// passes. The advisory passes never flip this.
    pub fn accepted(&self) -> bool {
        self.file.passed && self.crcs.passed && self.bounds.passed && self.alignment.passed
    }

    /// Reports in the fixed pass order, paired with pass names.
    pub fn reports(&self) -> [(&'static str, &PassReport); 6] {
        [
            ("file", &self.file),
            ("crcs", &self.crcs),
            ("bounds", &self.bounds),
            ("relocation types", &self.relocation_types),
            ("alignment", &self.alignment),
            ("section order", &self.section_order),
        ]
    }
}

/// Run every pass over a fully assembled model.
pub fn verify(rpl: &Rpl) -> Verification {
    Verification {
        file: verify_file(rpl),
        crcs: verify_crcs(rpl),
        bounds: verify_file_bounds(rpl),
        relocation_types: verify_relocation_types(rpl),
        alignment: verify_section_alignment(rpl),
        section_order: verify_section_order(rpl),
    }
}

fn decode_relas(section: &Section) -> Vec<Rela> {
    // Entry count comes from the decoded payload, not the header size.
    let count = section.data.len() / Rela::SIZE;
    let mut relas = Vec::with_capacity(count);
    for i in 0..count {
        match Rela::decode_at(&section.data, i * Rela::SIZE) {
            Ok(rela) => relas.push(rela),
            Err(_) => break,
        }
    }
    relas
}

fn validate_relocs_add_table(rpl: &Rpl, section: &Section, findings: &mut Vec<Finding>) -> bool {
    let header = &section.header;
    if header.size == 0 {
        return true;
    }

    let entsize = if header.entsize != 0 {
        header.entsize
    } else {
        RELA_SIZE
    };
    if entsize < RELA_SIZE {
        findings.push(Finding::check_failed(0xBAD0002E));
        return false;
    }

    let num_relas = header.size / entsize;
    if num_relas == 0 {
        findings.push(Finding::check_failed(0xBAD0000A));
        return false;
    }

    if header.link == 0 || header.link >= u32::from(rpl.header.shnum) {
        findings.push(Finding::check_failed(0xBAD0000B));
        return false;
    }

    let symbol_section = &rpl.sections[header.link as usize];
    if symbol_section.header.section_type != SHT_SYMTAB {
        findings.push(Finding::check_failed(0xBAD0000C));
        return false;
    }

    let sym_entsize = if symbol_section.header.entsize != 0 {
        symbol_section.header.entsize
    } else {
        SYMBOL_SIZE
    };
    if sym_entsize < SYMBOL_SIZE {
        findings.push(Finding::check_failed(0xBAD0002F));
        return false;
    }

    if header.info >= u32::from(rpl.header.shnum) {
        findings.push(Finding::check_failed(0xBAD0000D));
        return false;
    }

    let target_section = &rpl.sections[header.info as usize];
    if target_section.header.section_type != SHT_NULL {
        let num_symbols = symbol_section.data.len() as u32 / sym_entsize;
        for i in 0..num_relas {
            let Ok(rela) = Rela::decode_at(&section.data, (i * entsize) as usize) else {
                break;
            };
            if rela.info != 0 && (rela.info >> 8) >= num_symbols {
                findings.push(Finding::check_failed(0xBAD0000F));
                return false;
            }
        }
    }

    true
}

fn validate_symbol_table(rpl: &Rpl, section: &Section, findings: &mut Vec<Finding>) -> bool {
    let header = &section.header;
    if header.size == 0 {
        return true;
    }
    let mut result = true;

    let mut sym_strtab: Option<&Section> = None;
    if header.link != 0 {
        if header.link >= u32::from(rpl.header.shnum) {
            findings.push(Finding::check_failed(0xBAD00001));
            return false;
        }

        let candidate = &rpl.sections[header.link as usize];
        if candidate.header.section_type != SHT_STRTAB {
            findings.push(Finding::check_failed(0xBAD00002));
            return false;
        }
        sym_strtab = Some(candidate);
    }

    let entsize = if header.entsize != 0 {
        header.entsize
    } else {
        SYMBOL_SIZE
    };
    if entsize < SYMBOL_SIZE {
        findings.push(Finding::check_failed(0xBAD0002D));
        return false;
    }

    let num_symbols = header.size / entsize;
    if num_symbols == 0 {
        findings.push(Finding::check_failed(0xBAD00003));
        result = false;
    }

    for i in 0..num_symbols {
        let Ok(symbol) = Symbol::decode_at(&section.data, (i * entsize) as usize) else {
            break;
        };

        if let Some(strtab) = sym_strtab {
            if symbol.name_offset as usize > strtab.data.len() {
                // Observed loader behavior: reported, but does not fail
                // the pass.
                findings.push(Finding::check_failed(0xBAD00004));
            }
        }

        let sym_type = symbol.info & 0xF;
        if symbol.shndx != 0
            && symbol.shndx < SHN_LORESERVE
            && sym_type != STT_SECTION
            && sym_type != STT_FILE
        {
            if symbol.shndx >= rpl.header.shnum {
                findings.push(Finding::check_failed(0xBAD00005));
                result = false;
            } else if sym_type == STT_OBJECT {
                let target = &rpl.sections[symbol.shndx as usize];
                let target_size = if !target.data.is_empty() {
                    target.data.len() as u32
                } else {
                    target.header.size
                };

                if target_size != 0 && target.header.flags & SHF_ALLOC != 0 {
                    if target.header.section_type == SHT_NULL {
                        findings.push(Finding::check_failed(0xBAD00006));
                        result = false;
                    }

                    let position = symbol.value.wrapping_sub(target.header.addr);
                    if position > target_size || position.wrapping_add(symbol.size) > target_size {
                        let name = sym_strtab
                            .and_then(|s| s.string(symbol.name_offset))
                            .unwrap_or_default();
                        // GCC sometimes generates the synthetic symbol
                        // _SDA_BASE_ outside of .data, but this seems
                        // to be harmless.
                        if name != "_SDA_BASE_" {
                            findings.push(Finding::check_failed_with(
                                0xBAD00007,
                                format!("***   section \"{}\", symbol \"{}\"", target.name, name),
                            ));
                            result = false;
                        }
                    }
                }
            } else if sym_type == STT_FUNC {
                let target = &rpl.sections[symbol.shndx as usize];
                let target_size = if !target.data.is_empty() {
                    target.data.len() as u32
                } else {
                    target.header.size
                };

                if target_size != 0 && target.header.flags & SHF_ALLOC != 0 {
                    if target.header.section_type == SHT_NULL {
                        findings.push(Finding::check_failed(0xBAD00008));
                        result = false;
                    }

                    let position = symbol.value.wrapping_sub(target.header.addr);
                    if position > target_size || position.wrapping_add(symbol.size) > target_size {
                        findings.push(Finding::check_failed(0xBAD00009));
                        result = false;
                    }
                }
            }
        }
    }

    result
}

/// Structural pass, equivalent to loader.elf ELFFILE_ValidateAndPrepare.
pub fn verify_file(rpl: &Rpl) -> PassReport {
    let header = &rpl.header;
    let mut findings = Vec::new();
    let mut result = true;

    if rpl.file_size < MIN_FILE_SIZE {
        findings.push(Finding::check_failed(0xBAD00018));
        return PassReport {
            passed: false,
            findings,
        };
    }

    if header.magic != HEADER_MAGIC {
        findings.push(Finding::check_failed(0xBAD00019));
        result = false;
    }

    if header.file_class != ELF_CLASS_32 {
        findings.push(Finding::check_failed(0xBAD0001A));
        result = false;
    }

    if header.elf_version > EV_CURRENT {
        findings.push(Finding::check_failed(0xBAD0001B));
        result = false;
    }

    if header.machine == 0 {
        findings.push(Finding::check_failed(0xBAD0001C));
        result = false;
    }

    if header.version != 1 {
        findings.push(Finding::check_failed(0xBAD0001D));
        result = false;
    }

    let mut ehsize = u32::from(header.ehsize);
    if ehsize != 0 {
        if (header.ehsize as usize) < FILE_HEADER_SIZE as usize {
            findings.push(Finding::check_failed(0xBAD0001E));
            result = false;
        }
    } else {
        ehsize = FILE_HEADER_SIZE;
    }

    let phoff = header.phoff;
    if phoff != 0 && (phoff < ehsize || phoff >= rpl.file_size) {
        findings.push(Finding::check_failed(0xBAD0001F));
        result = false;
    }

    let shoff = header.shoff;
    if shoff != 0 && (shoff < ehsize || shoff >= rpl.file_size) {
        findings.push(Finding::check_failed(0xBAD00020));
        result = false;
    }

    if header.shstrndx != 0 && header.shstrndx >= header.shnum {
        findings.push(Finding::check_failed(0xBAD00021));
        result = false;
    }

    let phentsize = if header.phentsize != 0 {
        u32::from(header.phentsize)
    } else {
        PROGRAM_HEADER_SIZE
    };
    if header.phoff != 0
        && header
            .phoff
            .wrapping_add(phentsize.wrapping_mul(u32::from(header.phnum)))
            > rpl.file_size
    {
        findings.push(Finding::check_failed(0xBAD00022));
        result = false;
    }

    let shentsize = if header.shentsize != 0 {
        u32::from(header.shentsize)
    } else {
        SECTION_HEADER_SIZE
    };
    if header.shoff != 0
        && header
            .shoff
            .wrapping_add(shentsize.wrapping_mul(u32::from(header.shnum)))
            > rpl.file_size
    {
        findings.push(Finding::check_failed(0xBAD00023));
        result = false;
    }

    for section in &rpl.sections {
        if section.header.size != 0 && section.header.section_type != SHT_NOBITS {
            if section.header.offset < ehsize {
                findings.push(Finding::check_failed(0xBAD00024));
                result = false;
            }

            let table_end = shoff.wrapping_add(u32::from(header.shnum).wrapping_mul(shentsize));
            if section.header.offset >= shoff && section.header.offset < table_end {
                findings.push(Finding::check_failed(0xBAD00027));
                result = false;
            }
        }
    }

    if header.shstrndx != 0 {
        if let Some(sh_strtab) = rpl.sections.get(header.shstrndx as usize) {
            if sh_strtab.header.section_type != SHT_STRTAB {
                findings.push(Finding::check_failed(0xBAD0002A));
                result = false;
            } else {
                for section in &rpl.sections {
                    if section.header.name_offset as usize >= sh_strtab.data.len() {
                        findings.push(Finding::check_failed(0xBAD0002B));
                        result = false;
                    }
                }
            }
        }
    }

    for section in &rpl.sections {
        if section.header.section_type == SHT_RELA {
            result = validate_relocs_add_table(rpl, section, &mut findings) && result;
        } else if section.header.section_type == SHT_SYMTAB {
            result = validate_symbol_table(rpl, section, &mut findings) && result;
        }
    }

    PassReport {
        passed: result,
        findings,
    }
}

/// Verify the values in SHT_RPL_CRCS against freshly computed CRCs over
/// every section's decoded bytes.
pub fn verify_crcs(rpl: &Rpl) -> PassReport {
    let mut findings = Vec::new();

    let Some(crc_section) = rpl.crc_section() else {
        // No CRC table at all: fail outright, nothing to compare.
        return PassReport {
            passed: false,
            findings,
        };
    };
    let table = crc_section.crc_table();

    let mut result = true;
    for (index, section) in rpl.sections.iter().enumerate() {
        let mut crc = 0u32;
        if section.header.section_type != SHT_RPL_CRCS && !section.data.is_empty() {
            crc = crc32fast::hash(&section.data);
        }

        let stored = table.get(index).copied().unwrap_or(0);
        if crc != stored {
            findings.push(Finding::message(format!(
                "Unexpected crc for section {}, read 0x{:08X} but calculated 0x{:08X}",
                index, stored, crc
            )));
            result = false;
        }
    }

    PassReport {
        passed: result,
        findings,
    }
}

/// File-layout pass, equivalent to loader.elf LiCheckFileBounds: the
/// data/read/text/temp regions must appear in that order in the file.
pub fn verify_file_bounds(rpl: &Rpl) -> PassReport {
    let mut findings = Vec::new();
    let mut result = true;

    let mut data_min = u32::MAX;
    let mut data_max = 0u32;
    let mut read_min = u32::MAX;
    let mut read_max = 0u32;
    let mut text_min = u32::MAX;
    let mut text_max = 0u32;
    let mut temp_min = u32::MAX;
    let mut temp_max = 0u32;

    for section in &rpl.sections {
        let header = &section.header;
        if header.size == 0
            || header.section_type == SHT_RPL_FILEINFO
            || header.section_type == SHT_RPL_CRCS
            || header.section_type == SHT_NOBITS
            || header.section_type == SHT_RPL_IMPORTS
        {
            continue;
        }

        let start = header.offset;
        let end = header.offset.wrapping_add(header.size);
        if header.flags & SHF_EXECINSTR != 0 && header.section_type != SHT_RPL_EXPORTS {
            text_min = text_min.min(start);
            text_max = text_max.max(end);
        } else if header.flags & SHF_ALLOC != 0 {
            if header.flags & SHF_WRITE != 0 {
                data_min = data_min.min(start);
                data_max = data_max.max(end);
            } else {
                read_min = read_min.min(start);
                read_max = read_max.max(end);
            }
        } else {
            temp_min = temp_min.min(start);
            temp_max = temp_max.max(end);
        }
    }

    // Empty regions collapse to the end of the preceding one; an empty
    // data region anchors at the end of the section header table.
    if data_min == u32::MAX {
        data_min = u32::from(rpl.header.shnum)
            .wrapping_mul(u32::from(rpl.header.shentsize))
            .wrapping_add(rpl.header.shoff);
        data_max = data_min;
    }

    if read_min == u32::MAX {
        read_min = data_max;
        read_max = data_max;
    }

    if text_min == u32::MAX {
        text_min = read_max;
        text_max = read_max;
    }

    if temp_min == u32::MAX {
        temp_min = text_max;
        temp_max = text_max;
    }

    if data_min < rpl.header.shoff {
        findings.push(Finding::message(format!(
            "*** SecHrs, FileInfo, or CRCs in bad spot in file. Return {}.",
            -470026
        )));
        result = false;
    }

    // Data
    if data_min > data_max {
        findings.push(Finding::message("*** DataMin > DataMax. break."));
        result = false;
    }

    if data_min > read_min {
        findings.push(Finding::message("*** DataMin > ReadMin. break."));
        result = false;
    }

    if data_max > read_min {
        findings.push(Finding::message("*** DataMax > ReadMin, break."));
        result = false;
    }

    // Read
    if read_min > read_max {
        findings.push(Finding::message("*** ReadMin > ReadMax. break."));
        result = false;
    }

    if read_min > text_min {
        findings.push(Finding::message("*** ReadMin > TextMin. break."));
        result = false;
    }

    if read_max > text_min {
        findings.push(Finding::message("*** ReadMax > TextMin. break."));
        result = false;
    }

    // Text
    if text_min > text_max {
        findings.push(Finding::message("*** TextMin > TextMax. break."));
        result = false;
    }

    if text_min > temp_min {
        findings.push(Finding::message("*** TextMin > TempMin. break."));
        result = false;
    }

    if text_max > temp_min {
        findings.push(Finding::message("*** TextMax > TempMin. break."));
        result = false;
    }

    // Temp
    if temp_min > temp_max {
        findings.push(Finding::message("*** TempMin > TempMax. break."));
        result = false;
    }

    if !result {
        findings.push(Finding::message(format!("dataMin = 0x{:08X}", data_min)));
        findings.push(Finding::message(format!("dataMax = 0x{:08X}", data_max)));
        findings.push(Finding::message(format!("readMin = 0x{:08X}", read_min)));
        findings.push(Finding::message(format!("readMax = 0x{:08X}", read_max)));
        findings.push(Finding::message(format!("textMin = 0x{:08X}", text_min)));
        findings.push(Finding::message(format!("textMax = 0x{:08X}", text_max)));
        findings.push(Finding::message(format!("tempMin = 0x{:08X}", temp_min)));
        findings.push(Finding::message(format!("tempMax = 0x{:08X}", temp_max)));
    }

    PassReport {
        passed: result,
        findings,
    }
}

/// Advisory pass: report relocation types the hardware loader does not
/// apply, once per distinct type.
pub fn verify_relocation_types(rpl: &Rpl) -> PassReport {
    let mut findings = Vec::new();
    let mut unsupported = HashSet::new();

    for section in &rpl.sections {
        if section.header.section_type != SHT_RELA {
            continue;
        }

        for rela in decode_relas(section) {
            let rel_type = (rela.info & 0xFF) as u8;
            if !SUPPORTED_RELOCATION_TYPES.contains(&rel_type) && unsupported.insert(rel_type) {
                findings.push(Finding::message(format!(
                    "Unsupported relocation type {}",
                    rel_type
                )));
            }
        }
    }

    PassReport {
        passed: unsupported.is_empty(),
        findings,
    }
}

/// Every section's virtual address must be a multiple of its declared
/// alignment; alignments of 0 and 1 trivially pass.
pub fn verify_section_alignment(rpl: &Rpl) -> PassReport {
    let mut findings = Vec::new();
    let mut result = true;

    for (index, section) in rpl.sections.iter().enumerate() {
        let align = section.header.addralign;
        let aligned = align < 2 || section.header.addr % align == 0;
        if !aligned {
            findings.push(Finding::message(format!(
                "Unaligned section {}, addr {}, addralign {}",
                index, section.header.addr, align
            )));
            result = false;
        }
    }

    PassReport {
        passed: result,
        findings,
    }
}

/// Advisory pass: by convention the penultimate section is the CRC
/// table and the last is the file info block, neither deflated.
/// Violations are reported but the pass always succeeds; the loader
/// itself never rejects for this.
pub fn verify_section_order(rpl: &Rpl) -> PassReport {
    let mut findings = Vec::new();

    if rpl.sections.len() >= 2 {
        let last = &rpl.sections[rpl.sections.len() - 1];
        let penultimate = &rpl.sections[rpl.sections.len() - 2];

        if last.header.section_type != SHT_RPL_FILEINFO || last.header.is_deflated() {
            findings.push(Finding::message(format!(
                "***shnum-1 section type = 0x{:08X}, flags=0x{:08X}",
                last.header.section_type, last.header.flags
            )));
        }

        if penultimate.header.section_type != SHT_RPL_CRCS || penultimate.header.is_deflated() {
            findings.push(Finding::message(format!(
                "***shnum-2 section type = 0x{:08X}, flags=0x{:08X}",
                penultimate.header.section_type, penultimate.header.flags
            )));
        }
    }

    PassReport {
        passed: true,
        findings,
    }
}
