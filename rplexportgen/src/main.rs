//! rplexportgen: turn an exports `.def` file into PowerPC assembly that
//! assembles into the module's SHT_RPL_EXPORTS sections.
//!
//! The emitted section looks like:
//!
//! ```text
//! .extern __preinit_user
//!
//! .section .fexports, "", @0x80000001
//! .align 4
//!
//! .long 1
//! .long 0x13371337
//!
//! .long __preinit_user
//! .long 0x10
//!
//! .string "__preinit_user"
//! .byte 0
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "rplexportgen",
    version,
    about = "Generate an exports assembly file from an exports.def"
)]
struct Args {
    /// Path to input exports def file
    #[arg(value_name = "exports.def")]
    input: PathBuf,

    /// Path to output assembly file
    #[arg(value_name = "output.S")]
    output: PathBuf,
}

enum ReadMode {
    Invalid,
    Text,
    Data,
    Name,
}

fn parse_def(reader: impl BufRead) -> Result<(Vec<String>, Vec<String>)> {
    let mut func_exports = Vec::new();
    let mut data_exports = Vec::new();
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
            mode = match header {
                "TEXT" => ReadMode::Text,
                "DATA" => ReadMode::Data,
                _ if header.starts_with("NAME") => ReadMode::Name,
                _ => bail!("Unexpected section type: \"{}\"", header),
            };
            continue;
        }

        match mode {
            ReadMode::Text => func_exports.push(line.to_string()),
            ReadMode::Data => data_exports.push(line.to_string()),
            // The module name only matters to rplimportgen.
            ReadMode::Name => {}
            ReadMode::Invalid => bail!("Unexpected section data."),
        }
    }

    Ok((func_exports, data_exports))
}

fn write_exports(out: &mut impl Write, is_data: bool, exports: &[String]) -> Result<()> {
    // The signature covers every name including its NUL terminator.
    let mut hasher = crc32fast::Hasher::new();
    for name in exports {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    let signature = hasher.finalize();

    // Declare the symbols
    for name in exports {
        writeln!(out, ".extern {}", name)?;
    }
    writeln!(out)?;

    if is_data {
        writeln!(out, ".section .dexports, \"a\", @0x80000001")?;
    } else {
        writeln!(out, ".section .fexports, \"ax\", @0x80000001")?;
    }
    writeln!(out, ".align 4\n")?;

    writeln!(out, ".long {}", exports.len())?;
    writeln!(out, ".long 0x{:x}\n", signature)?;

    // One (value, name offset) pair per export; the strings follow the
    // entry table, so offsets start right after it.
    let mut name_offset = 8 + 8 * exports.len();
    for name in exports {
        writeln!(out, ".long {}", name)?;
        writeln!(out, ".long 0x{:x}", name_offset)?;
        name_offset += name.len() + 1;
    }
    writeln!(out)?;

    for name in exports {
        writeln!(out, ".string \"{}\"", name)?;
    }
    writeln!(out)?;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let reader = BufReader::new(File::open(&args.input).with_context(|| {
        format!(
            "Could not open file \"{}\" for reading.",
            args.input.display()
        )
    })?);
    let (mut func_exports, mut data_exports) = parse_def(reader)?;

    // Exports must be in alphabetical order because loader.elf uses
    // binary search.
    func_exports.sort();
    data_exports.sort();

    let mut out = BufWriter::new(File::create(&args.output).with_context(|| {
        format!(
            "Could not open file \"{}\" for writing.",
            args.output.display()
        )
    })?);

    if !func_exports.is_empty() {
        write_exports(&mut out, false, &func_exports)?;
    }

    if !data_exports.is_empty() {
        write_exports(&mut out, true, &data_exports)?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_sections_route_names() {
        let def = "\
:NAME coreinit

:TEXT
OSReport // comment
OSFatal

:DATA
__gh_errno_ptr
";
        let (func, data) = parse_def(def.as_bytes()).unwrap();
        assert_eq!(func, vec!["OSReport", "OSFatal"]);
        assert_eq!(data, vec!["__gh_errno_ptr"]);
    }

    #[test]
    fn names_before_any_section_are_rejected() {
        assert!(parse_def("OSReport\n".as_bytes()).is_err());
    }

    #[test]
    fn export_section_layout() {
        let exports = vec!["OSFatal".to_string(), "OSReport".to_string()];
        let mut out = Vec::new();
        write_exports(&mut out, false, &exports).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with(".extern OSFatal\n.extern OSReport\n"));
        assert!(text.contains(".section .fexports, \"ax\", @0x80000001"));
        assert!(text.contains(".long 2\n"));
        // 8-byte header plus two 8-byte entries.
        assert!(text.contains(".long OSFatal\n.long 0x18\n"));
        assert!(text.contains(".long OSReport\n.long 0x20\n"));
        assert!(text.contains(".string \"OSFatal\"\n.string \"OSReport\"\n"));

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(b"OSFatal\0OSReport\0");
        assert!(text.contains(&format!(".long 0x{:x}\n", hasher.finalize())));
    }
}
