//! rplimportgen: turn an exports `.def` file into PowerPC assembly that
//! assembles into SHT_RPL_IMPORTS stub sections, plus an optional
//! linker script that keeps those sections in load memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

// Wrapped imports get this prefix so a shim with the real name can call
// through to the module.
const RPLWRAP_PREFIX: &str = "__rplwrap_";

#[derive(Parser, Debug)]
#[command(
    name = "rplimportgen",
    version,
    about = "Generate an imports assembly file from an exports.def"
)]
struct Args {
    /// Path to input exports def file
    #[arg(value_name = "exports.def")]
    input: PathBuf,

    /// Path to output assembly file
    #[arg(value_name = "output.S")]
    output: PathBuf,

    /// Path to output linker script
    #[arg(value_name = "output.ld")]
    linker_script: Option<PathBuf>,
}

enum ReadMode {
    Invalid,
    Text,
    TextWrap,
    Data,
    DataWrap,
}

struct ImportDef {
    module_name: String,
    func_imports: Vec<String>,
    data_imports: Vec<String>,
}

fn parse_def(reader: impl BufRead) -> Result<ImportDef> {
    let mut def = ImportDef {
        module_name: String::new(),
        func_imports: Vec::new(),
        data_imports: Vec::new(),
    };
    let mut mode = ReadMode::Invalid;

    for line in reader.lines() {
        let line = line?;

        // Trim comments and whitespace
        let line = match line.find("//") {
            Some(pos) => &line[..pos],
            None => line.as_str(),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix(':') {
            match header {
                "TEXT" => mode = ReadMode::Text,
                "TEXT_WRAP" => mode = ReadMode::TextWrap,
                "DATA" => mode = ReadMode::Data,
                "DATA_WRAP" => mode = ReadMode::DataWrap,
                _ => {
                    if let Some(name) = header.strip_prefix("NAME") {
                        def.module_name = name.trim_start().to_string();
                    } else {
                        bail!("Unexpected section type: \"{}\"", header);
                    }
                }
            }
            continue;
        }

        match mode {
            ReadMode::Text => def.func_imports.push(line.to_string()),
            ReadMode::TextWrap => def
                .func_imports
                .push(format!("{}{}", RPLWRAP_PREFIX, line)),
            ReadMode::Data => def.data_imports.push(line.to_string()),
            ReadMode::DataWrap => def
                .data_imports
                .push(format!("{}{}", RPLWRAP_PREFIX, line)),
            ReadMode::Invalid => bail!("Unexpected section data."),
        }
    }

    Ok(def)
}

fn write_imports(
    out: &mut impl Write,
    module_name: &str,
    is_data: bool,
    imports: &[String],
) -> Result<()> {
    if is_data {
        writeln!(out, ".section .dimport_{}, \"a\", @0x80000002", module_name)?;
    } else {
        writeln!(out, ".section .fimport_{}, \"ax\", @0x80000002", module_name)?;
    }
    writeln!(out, ".align 4\n")?;

    // Usually the symbol count, but isn't checked on hardware.
    // Spoofed to allow ld to garbage-collect later.
    writeln!(out, ".long 1")?;
    // Supposed to be a crc32 of the imports. Again, not actually checked.
    writeln!(out, ".long 0x00000000\n")?;

    writeln!(out, ".asciz \"{}\"", module_name)?;
    writeln!(out)?;
    // Keep 8-byte alignment.
    writeln!(out, ".align 8\n")?;

    let symbol_type = if is_data { "@object" } else { "@function" };

    for name in imports {
        // Basically do -ffunction-sections
        if is_data {
            writeln!(
                out,
                ".section .dimport_{}.{}, \"a\", @0x80000002",
                module_name, name
            )?;
        } else {
            writeln!(
                out,
                ".section .fimport_{}.{}, \"ax\", @0x80000002",
                module_name, name
            )?;
        }
        writeln!(out, ".global {}", name)?;
        writeln!(out, ".type {}, {}", name, symbol_type)?;
        writeln!(out, "{}:", name)?;
        writeln!(out, ".long 0x0")?;
        writeln!(out, ".long 0x0\n")?;
    }

    Ok(())
}

fn write_linker_script(out: &mut impl Write, name: &str) -> Result<()> {
    writeln!(out, "SECTIONS")?;
    writeln!(out, "{{")?;
    writeln!(out, "   .fimport_{} ALIGN(16) : {{", name)?;
    writeln!(out, "      KEEP ( *(.fimport_{}) )", name)?;
    writeln!(out, "      *(.fimport_{}.*)", name)?;
    writeln!(out, "   }} > loadmem")?;
    writeln!(out, "   .dimport_{} ALIGN(16) : {{", name)?;
    writeln!(out, "      KEEP ( *(.dimport_{}) )", name)?;
    writeln!(out, "      *(.dimport_{}.*)", name)?;
    writeln!(out, "   }} > loadmem")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let reader = BufReader::new(File::open(&args.input).with_context(|| {
        format!("Could not open file \"{}\" for reading", args.input.display())
    })?);
    let def = parse_def(reader)?;

    let mut out = BufWriter::new(File::create(&args.output).with_context(|| {
        format!(
            "Could not open file \"{}\" for writing",
            args.output.display()
        )
    })?);

    if !def.func_imports.is_empty() {
        write_imports(&mut out, &def.module_name, false, &def.func_imports)?;
    }

    if !def.data_imports.is_empty() {
        write_imports(&mut out, &def.module_name, true, &def.data_imports)?;
    }
    out.flush()?;

    if let Some(path) = &args.linker_script {
        let mut out = BufWriter::new(File::create(path).with_context(|| {
            format!("Could not open file \"{}\" for writing", path.display())
        })?);
        write_linker_script(&mut out, &def.module_name)?;
        out.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_sections_prefix_names() {
        let def = "\
:NAME coreinit
:TEXT
OSReport
:TEXT_WRAP
OSDynLoad_Acquire
:DATA_WRAP
__gh_errno_ptr
";
        let parsed = parse_def(def.as_bytes()).unwrap();
        assert_eq!(parsed.module_name, "coreinit");
        assert_eq!(
            parsed.func_imports,
            vec!["OSReport", "__rplwrap_OSDynLoad_Acquire"]
        );
        assert_eq!(parsed.data_imports, vec!["__rplwrap___gh_errno_ptr"]);
    }

    #[test]
    fn import_stub_layout() {
        let imports = vec!["OSReport".to_string()];
        let mut out = Vec::new();
        write_imports(&mut out, "coreinit", false, &imports).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with(".section .fimport_coreinit, \"ax\", @0x80000002\n"));
        assert!(text.contains(".long 1\n.long 0x00000000\n"));
        assert!(text.contains(".asciz \"coreinit\""));
        assert!(text.contains(".section .fimport_coreinit.OSReport, \"ax\", @0x80000002"));
        assert!(text.contains(".global OSReport\n.type OSReport, @function\nOSReport:\n"));
    }

    #[test]
    fn linker_script_keeps_both_import_sections() {
        let mut out = Vec::new();
        write_linker_script(&mut out, "coreinit").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("KEEP ( *(.fimport_coreinit) )"));
        assert!(text.contains("*(.dimport_coreinit.*)"));
    }
}
