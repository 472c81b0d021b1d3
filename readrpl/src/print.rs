//! Human-readable dumps of the decoded structures, one function per
//! section kind plus the file header and section summary.

use anyhow::{Context, Result};

use rpl_common::elf::constants::*;
use rpl_common::{Rpl, Section};

fn format_et(file_type: u16) -> String {
    match file_type {
        ET_NONE => "ET_NONE".to_string(),
        ET_REL => "ET_REL".to_string(),
        ET_EXEC => "ET_EXEC".to_string(),
        ET_DYN => "ET_DYN".to_string(),
        ET_CORE => "ET_CORE".to_string(),
        ET_CAFE_RPL => "ET_CAFE_RPL".to_string(),
        other => other.to_string(),
    }
}

fn format_em(machine: u16) -> String {
    match machine {
        EM_PPC => "EM_PPC".to_string(),
        other => other.to_string(),
    }
}

fn format_eabi(abi: u16) -> String {
    match abi {
        EABI_CAFE => "EABI_CAFE".to_string(),
        other => other.to_string(),
    }
}

fn format_shf(flags: u32) -> String {
    let mut result = String::new();
    if flags & SHF_WRITE != 0 {
        result.push('W');
    }
    if flags & SHF_ALLOC != 0 {
        result.push('A');
    }
    if flags & SHF_EXECINSTR != 0 {
        result.push('X');
    }
    if flags & SHF_DEFLATED != 0 {
        result.push('Z');
    }
    result
}

pub fn format_sht(section_type: u32) -> String {
    match section_type {
        SHT_NULL => "SHT_NULL".to_string(),
        SHT_PROGBITS => "SHT_PROGBITS".to_string(),
        SHT_SYMTAB => "SHT_SYMTAB".to_string(),
        SHT_STRTAB => "SHT_STRTAB".to_string(),
        SHT_RELA => "SHT_RELA".to_string(),
        SHT_HASH => "SHT_HASH".to_string(),
        SHT_DYNAMIC => "SHT_DYNAMIC".to_string(),
        SHT_NOTE => "SHT_NOTE".to_string(),
        SHT_NOBITS => "SHT_NOBITS".to_string(),
        SHT_REL => "SHT_REL".to_string(),
        SHT_SHLIB => "SHT_SHLIB".to_string(),
        SHT_DYNSYM => "SHT_DYNSYM".to_string(),
        SHT_INIT_ARRAY => "SHT_INIT_ARRAY".to_string(),
        SHT_FINI_ARRAY => "SHT_FINI_ARRAY".to_string(),
        SHT_PREINIT_ARRAY => "SHT_PREINIT_ARRAY".to_string(),
        SHT_GROUP => "SHT_GROUP".to_string(),
        SHT_SYMTAB_SHNDX => "SHT_SYMTAB_SHNDX".to_string(),
        SHT_LOPROC => "SHT_LOPROC".to_string(),
        SHT_HIPROC => "SHT_HIPROC".to_string(),
        SHT_LOUSER => "SHT_LOUSER".to_string(),
        SHT_RPL_EXPORTS => "SHT_RPL_EXPORTS".to_string(),
        SHT_RPL_IMPORTS => "SHT_RPL_IMPORTS".to_string(),
        SHT_RPL_CRCS => "SHT_RPL_CRCS".to_string(),
        SHT_RPL_FILEINFO => "SHT_RPL_FILEINFO".to_string(),
        SHT_HIUSER => "SHT_HIUSER".to_string(),
        other => other.to_string(),
    }
}

fn format_rel_type(rel_type: u8) -> String {
    match rel_type {
        R_PPC_NONE => "NONE".to_string(),
        R_PPC_ADDR32 => "ADDR32".to_string(),
        R_PPC_ADDR16_LO => "ADDR16_LO".to_string(),
        R_PPC_ADDR16_HI => "ADDR16_HI".to_string(),
        R_PPC_ADDR16_HA => "ADDR16_HA".to_string(),
        R_PPC_REL24 => "REL24".to_string(),
        R_PPC_REL14 => "REL14".to_string(),
        R_PPC_DTPMOD32 => "DTPMOD32".to_string(),
        R_PPC_DTPREL32 => "DTPREL32".to_string(),
        R_PPC_EMB_SDA21 => "EMB_SDA21".to_string(),
        R_PPC_EMB_RELSDA => "EMB_RELSDA".to_string(),
        R_PPC_DIAB_SDA21_LO => "DIAB_SDA21_LO".to_string(),
        R_PPC_DIAB_SDA21_HI => "DIAB_SDA21_HI".to_string(),
        R_PPC_DIAB_SDA21_HA => "DIAB_SDA21_HA".to_string(),
        R_PPC_DIAB_RELSDA_LO => "DIAB_RELSDA_LO".to_string(),
        R_PPC_DIAB_RELSDA_HI => "DIAB_RELSDA_HI".to_string(),
        R_PPC_DIAB_RELSDA_HA => "DIAB_RELSDA_HA".to_string(),
        R_PPC_GHS_REL16_HA => "GHS_REL16_HA".to_string(),
        R_PPC_GHS_REL16_HI => "GHS_REL16_HI".to_string(),
        R_PPC_GHS_REL16_LO => "GHS_REL16_LO".to_string(),
        other => other.to_string(),
    }
}

fn format_sym_type(sym_type: u8) -> String {
    match sym_type {
        STT_NOTYPE => "NOTYPE".to_string(),
        STT_OBJECT => "OBJECT".to_string(),
        STT_FUNC => "FUNC".to_string(),
        STT_SECTION => "SECTION".to_string(),
        STT_FILE => "FILE".to_string(),
        STT_COMMON => "COMMON".to_string(),
        STT_TLS => "TLS".to_string(),
        STT_GNU_IFUNC => "GNU_IFUNC".to_string(),
        STT_HIOS => "HIOS".to_string(),
        other => other.to_string(),
    }
}

fn format_sym_binding(binding: u8) -> String {
    match binding {
        STB_LOCAL => "LOCAL".to_string(),
        STB_GLOBAL => "GLOBAL".to_string(),
        STB_WEAK => "WEAK".to_string(),
        STB_GNU_UNIQUE => "UNIQUE".to_string(),
        other => other.to_string(),
    }
}

fn format_sym_shndx(shndx: u16) -> String {
    match shndx {
        SHN_UNDEF | SHN_XINDEX => "UND".to_string(),
        SHN_ABS => "ABS".to_string(),
        SHN_COMMON => "CMN".to_string(),
        other => other.to_string(),
    }
}

pub fn print_header(rpl: &Rpl) {
    let header = &rpl.header;
    println!("ElfHeader");
    println!("  {:<20} = 0x{:08X}", "magic", header.magic);
    println!("  {:<20} = {}", "fileClass", header.file_class);
    println!("  {:<20} = {}", "encoding", header.encoding);
    println!("  {:<20} = {}", "elfVersion", header.elf_version);
    println!(
        "  {:<20} = {} 0x{:04x}",
        "abi",
        format_eabi(header.abi),
        header.abi
    );
    println!(
        "  {:<20} = {} 0x{:04X}",
        "type",
        format_et(header.file_type),
        header.file_type
    );
    println!(
        "  {:<20} = {} {}",
        "machine",
        format_em(header.machine),
        header.machine
    );
    println!("  {:<20} = 0x{:X}", "version", header.version);
    println!("  {:<20} = 0x{:08X}", "entry", header.entry);
    println!("  {:<20} = 0x{:X}", "phoff", header.phoff);
    println!("  {:<20} = 0x{:X}", "shoff", header.shoff);
    println!("  {:<20} = 0x{:X}", "flags", header.flags);
    println!("  {:<20} = {}", "ehsize", header.ehsize);
    println!("  {:<20} = {}", "phentsize", header.phentsize);
    println!("  {:<20} = {}", "phnum", header.phnum);
    println!("  {:<20} = {}", "shentsize", header.shentsize);
    println!("  {:<20} = {}", "shnum", header.shnum);
    println!("  {:<20} = {}", "shstrndx", header.shstrndx);
}

pub fn print_section_summary(rpl: &Rpl) {
    println!("Sections:");
    println!(
        "  {:<4} {:<20} {:<16} {:<8} {:<6} {:<6} {:<2} {:<4} {:<2} {:<4} {:<5}",
        "[Nr]", "Name", "Type", "Addr", "Off", "Size", "ES", "Flag", "Lk", "Info", "Align"
    );

    for (i, section) in rpl.sections.iter().enumerate() {
        let header = &section.header;
        println!(
            "  [{:>2}] {:<20} {:<16} {:08X} {:06X} {:06X} {:02X} {:>4} {:>2} {:>4} {:>5}",
            i,
            section.name,
            format_sht(header.section_type),
            header.addr,
            header.offset,
            header.size,
            header.entsize,
            format_shf(header.flags),
            header.link,
            header.info,
            header.addralign
        );
    }
}

pub fn print_file_info(section: &Section) -> Result<()> {
    let info = section.file_info()?;
    println!("  {:<20} = 0x{:08X}", "version", info.version);
    println!("  {:<20} = 0x{:08X}", "textSize", info.text_size);
    println!("  {:<20} = 0x{:X}", "textAlign", info.text_align);
    println!("  {:<20} = 0x{:08X}", "dataSize", info.data_size);
    println!("  {:<20} = 0x{:X}", "dataAlign", info.data_align);
    println!("  {:<20} = 0x{:08X}", "loadSize", info.load_size);
    println!("  {:<20} = 0x{:X}", "loadAlign", info.load_align);
    println!("  {:<20} = 0x{:X}", "tempSize", info.temp_size);
    println!("  {:<20} = 0x{:X}", "trampAdjust", info.tramp_adjust);
    println!("  {:<20} = 0x{:X}", "trampAddition", info.tramp_addition);
    println!("  {:<20} = 0x{:08X}", "sdaBase", info.sda_base);
    println!("  {:<20} = 0x{:08X}", "sda2Base", info.sda2_base);
    println!("  {:<20} = 0x{:08X}", "stackSize", info.stack_size);
    println!("  {:<20} = 0x{:08X}", "heapSize", info.heap_size);

    match info.filename_in(&section.data) {
        Some(filename) => println!("  {:<20} = {}", "filename", filename),
        None => println!("  {:<20} = 0", "filename"),
    }

    println!("  {:<20} = 0x{:X}", "flags", info.flags);
    println!("  {:<20} = 0x{:08X}", "minSdkVersion", info.min_version);
    println!("  {:<20} = {}", "compressionLevel", info.compression_level);
    println!("  {:<20} = 0x{:X}", "fileInfoPad", info.file_info_pad);
    println!("  {:<20} = 0x{:X}", "sdkVersion", info.cafe_sdk_version);
    println!("  {:<20} = 0x{:X}", "sdkRevision", info.cafe_sdk_revision);
    println!("  {:<20} = 0x{:X}", "tlsModuleIndex", info.tls_module_index);
    println!("  {:<20} = 0x{:X}", "tlsAlignShift", info.tls_align_shift);
    println!(
        "  {:<20} = 0x{:X}",
        "runtimeFileInfoSize", info.runtime_file_info_size
    );

    let tags = info.tags_in(&section.data);
    if !tags.is_empty() {
        println!("  Tags:");
        for (key, value) in tags {
            println!("    \"{}\" = \"{}\"", key, value);
        }
    }
    Ok(())
}

pub fn print_rela(rpl: &Rpl, section: &Section) -> Result<()> {
    println!(
        "  {:<8} {:<8} {:<16} {:<8} {}",
        "Offset", "Info", "Type", "Value", "Name + Addend"
    );

    let sym_section = rpl
        .sections
        .get(section.header.link as usize)
        .context("relocation section links to a missing symbol table")?;
    let symbols = sym_section.symbols()?;
    let str_section = rpl
        .sections
        .get(sym_section.header.link as usize)
        .context("symbol table links to a missing string table")?;

    for rela in section.relas()? {
        let info = rela.info();
        let (value, name) = match symbols.get(info.symbol as usize) {
            Some(symbol) => (
                symbol.value,
                str_section.string(symbol.name_offset).unwrap_or_default(),
            ),
            None => (0, String::new()),
        };

        println!(
            "  {:08X} {:08X} {:<16} {:08X} {} + {:X}",
            rela.offset,
            rela.info,
            format_rel_type(info.rel_type),
            value,
            name,
            rela.addend
        );
    }
    Ok(())
}

pub fn print_sym_tab(rpl: &Rpl, section: &Section) -> Result<()> {
    let str_section = rpl
        .sections
        .get(section.header.link as usize)
        .context("symbol table links to a missing string table")?;

    println!(
        "  {:<4} {:<8} {:<6} {:<8} {:<8} {:<3} {}",
        "Num", "Value", "Size", "Type", "Bind", "Ndx", "Name"
    );

    for (i, symbol) in section.symbols()?.iter().enumerate() {
        let info = symbol.info();
        println!(
            "  {:>4} {:08X} {:>6} {:<8} {:<8} {:>3} {}",
            i,
            symbol.value,
            symbol.size,
            format_sym_type(info.sym_type),
            format_sym_binding(info.binding),
            format_sym_shndx(symbol.shndx),
            str_section.string(symbol.name_offset).unwrap_or_default()
        );
    }
    Ok(())
}

pub fn print_rpl_imports(rpl: &Rpl, index: usize, section: &Section) -> Result<()> {
    let import = section.imports()?;
    println!("  {:<20} = {}", "name", import.name);
    println!("  {:<20} = 0x{:08X}", "signature", import.signature);
    println!("  {:<20} = {}", "count", import.count);

    if import.count == 0 {
        return Ok(());
    }

    // The imported symbols are the ones whose section index points back
    // at this import section.
    for sym_section in &rpl.sections {
        if sym_section.header.section_type != SHT_SYMTAB {
            continue;
        }

        let str_section = rpl
            .sections
            .get(sym_section.header.link as usize)
            .context("symbol table links to a missing string table")?;

        for symbol in sym_section.symbols()? {
            let sym_type = symbol.info().sym_type;
            if symbol.shndx as usize == index && (sym_type == STT_FUNC || sym_type == STT_OBJECT) {
                println!(
                    "    {}",
                    str_section.string(symbol.name_offset).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

pub fn print_rpl_crcs(section: &Section) {
    for (i, crc) in section.crc_table().iter().enumerate() {
        println!("  [{:>2}] 0x{:08X} {}", i, crc, section.name);
    }
}

pub fn print_rpl_exports(section: &Section) -> Result<()> {
    let exports = section.exports()?;
    println!("  {:<20} = 0x{:08X}", "signature", exports.signature);
    println!("  {:<20} = {}", "count", exports.count);

    for export in &exports.entries {
        // TLS exports have the high bit set in the name offset.
        let name = export.name_in(&section.data).unwrap_or_default();
        println!("    0x{:08X} {}", export.value, name);
    }
    Ok(())
}
