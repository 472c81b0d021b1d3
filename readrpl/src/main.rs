//! readrpl: dump and verify RPL/RPX modules.
//!
//! Runs every verification pass over the input and prints the findings
//! to stderr, then dumps whichever structures were asked for on stdout.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use rpl_common::elf::constants::*;
use rpl_common::{verify, Rpl};

mod exports_def;
mod print;

const ERROR_BAD_ARGUMENTS: u8 = 1;
const ERROR_OPEN_INPUT: u8 = 2;
const ERROR_BAD_INPUT: u8 = 3;
const ERROR_OPEN_OUTPUT: u8 = 4;

// -h is taken by --file-header, so help and version sit on -H and -v.
#[derive(Parser, Debug)]
#[command(
    name = "readrpl",
    version,
    about = "Display information about RPL/RPX files",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// Show help
    #[arg(short = 'H', long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Show version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Equivalent to: -h -S -s -r -i -x -c -f
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Display the ELF file header
    #[arg(short = 'h', long = "file-header")]
    file_header: bool,

    /// Display the sections' header
    #[arg(short = 'S', long = "sections")]
    sections: bool,

    /// Display the symbol table
    #[arg(short = 's', long = "symbols")]
    symbols: bool,

    /// Display the relocations
    #[arg(short = 'r', long = "relocs")]
    relocs: bool,

    /// Display the RPL imports
    #[arg(short = 'i', long = "imports")]
    imports: bool,

    /// Display the RPL exports
    #[arg(short = 'x', long = "exports")]
    exports: bool,

    /// Display the RPL crc
    #[arg(short = 'c', long = "crc")]
    crc: bool,

    /// Display the RPL file info
    #[arg(short = 'f', long = "file-info")]
    file_info: bool,

    /// Generate an exports .def file for library linking
    #[arg(long = "exports-def", value_name = "FILE")]
    exports_def: Option<PathBuf>,

    /// Path to RPL file
    path: PathBuf,
}

struct DumpFlags {
    elf_header: bool,
    section_summary: bool,
    rela: bool,
    symtab: bool,
    rpl_exports: bool,
    rpl_imports: bool,
    rpl_crcs: bool,
    rpl_fileinfo: bool,
}

impl DumpFlags {
    fn from_args(args: &Args) -> DumpFlags {
        let mut flags = DumpFlags {
            elf_header: args.all || args.file_header,
            section_summary: args.all || args.sections,
            rela: args.all || args.relocs,
            symtab: args.all || args.symbols,
            rpl_exports: args.all || args.exports,
            rpl_imports: args.all || args.imports,
            rpl_crcs: args.all || args.crc,
            rpl_fileinfo: args.all || args.file_info,
        };

        // With only a path given, default to a summary.
        let any = flags.elf_header
            || flags.section_summary
            || flags.rela
            || flags.symtab
            || flags.rpl_exports
            || flags.rpl_imports
            || flags.rpl_crcs
            || flags.rpl_fileinfo
            || args.exports_def.is_some();
        if !any {
            flags.elf_header = true;
            flags.section_summary = true;
            flags.rpl_fileinfo = true;
        }
        flags
    }
}

// Only an open failure is exit code 2; once the file is open, anything
// that stops assembly is bad input.
fn load_rpl(path: &Path) -> Result<Rpl, (u8, String)> {
    let file = File::open(path).map_err(|err| {
        (
            ERROR_OPEN_INPUT,
            format!("Could not open \"{}\" for reading: {}", path.display(), err),
        )
    })?;
    Rpl::read(&mut BufReader::new(file)).map_err(|err| (ERROR_BAD_INPUT, err.to_string()))
}

fn file_basename(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dump(rpl: &Rpl, flags: &DumpFlags) -> anyhow::Result<()> {
    if flags.elf_header {
        print::print_header(rpl);
    }

    if flags.section_summary {
        print::print_section_summary(rpl);
    }

    for (index, section) in rpl.sections.iter().enumerate() {
        let banner = || {
            println!(
                "Section {}: {}, {}, {} bytes",
                index,
                print::format_sht(section.header.section_type),
                section.name,
                section.data.len()
            );
        };

        match section.header.section_type {
            SHT_RELA if flags.rela => {
                banner();
                print::print_rela(rpl, section)?;
            }
            SHT_SYMTAB if flags.symtab => {
                banner();
                print::print_sym_tab(rpl, section)?;
            }
            SHT_RPL_EXPORTS if flags.rpl_exports => {
                banner();
                print::print_rpl_exports(section)?;
            }
            SHT_RPL_IMPORTS if flags.rpl_imports => {
                banner();
                print::print_rpl_imports(rpl, index, section)?;
            }
            SHT_RPL_CRCS if flags.rpl_crcs => {
                banner();
                print::print_rpl_crcs(section);
            }
            SHT_RPL_FILEINFO if flags.rpl_fileinfo => {
                banner();
                print::print_file_info(section)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed {
                ExitCode::from(ERROR_BAD_ARGUMENTS)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let flags = DumpFlags::from_args(&args);

    let rpl = match load_rpl(&args.path) {
        Ok(rpl) => rpl,
        Err((code, message)) => {
            eprintln!("{}", message);
            return ExitCode::from(code);
        }
    };

    let verification = verify(&rpl);
    for (_, report) in verification.reports() {
        for finding in &report.findings {
            eprintln!("{}", finding);
        }
    }

    if let Err(err) = dump(&rpl, &flags) {
        eprintln!("{:#}", err);
        return ExitCode::from(ERROR_BAD_INPUT);
    }

    if let Some(output) = &args.exports_def {
        if let Err(err) = exports_def::generate(&rpl, &file_basename(&args.path), output) {
            eprintln!("{:#}", err);
            return ExitCode::from(ERROR_OPEN_OUTPUT);
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_an_open_error() {
        let (code, message) = load_rpl(Path::new("/nonexistent/no-such.rpl")).unwrap_err();
        assert_eq!(code, ERROR_OPEN_INPUT);
        assert!(message.contains("for reading"));
    }

    #[test]
    fn truncated_section_table_is_bad_input() {
        // Valid magic, but shnum promises sections past end of file.
        let mut bytes = vec![0u8; FILE_HEADER_SIZE as usize];
        bytes[0..4].copy_from_slice(&HEADER_MAGIC.to_be_bytes());
        bytes[32..36].copy_from_slice(&FILE_HEADER_SIZE.to_be_bytes());
        bytes[46..48].copy_from_slice(&(SECTION_HEADER_SIZE as u16).to_be_bytes());
        bytes[48..50].copy_from_slice(&3u16.to_be_bytes());

        let path = std::env::temp_dir().join("readrpl-truncated-table.rpl");
        std::fs::write(&path, &bytes).unwrap();
        let (code, _) = load_rpl(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(code, ERROR_BAD_INPUT);
    }
}
