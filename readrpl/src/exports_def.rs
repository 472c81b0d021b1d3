//! `.def` generation from a module's export sections, for linking
//! against the real library with a homebrew toolchain.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use rpl_common::elf::constants::{SHF_EXECINSTR, SHT_RPL_EXPORTS};
use rpl_common::Rpl;

// Runtime support symbols the toolchain provides itself; exporting them
// again would clash at link time, so they are emitted commented out.
const EXPORT_BLACKLIST: &[&str] = &[
    "__get_eh_globals",
    "__get_eh_init_block",
    "__get_eh_mem_manage",
    "__get_eh_store_globals",
    "__get_eh_store_globals_tdeh",
    "__gh_errno_ptr",
    "__gh_get_errno",
    "__gh_iob_init",
    "__gh_lock_init",
    "__gh_set_errno",
    "__ghsLock",
    "__ghsUnlock",
    "__ghs_at_exit",
    "__ghs_at_exit_cleanup",
    "__ghs_flock_create",
    "__ghs_flock_destroy",
    "__ghs_flock_file",
    "__ghs_flock_ptr",
    "__ghs_ftrylock_file",
    "__ghs_funlock_file",
    "__ghs_mtx_dst",
    "__ghs_mtx_init",
    "__ghs_mtx_lock",
    "__ghs_mtx_unlock",
    "__tls_get_addr",
    "memclr",
    "memcpy",
    "memmove",
    "memset",
    "__atexit_cleanup",
    "__cpp_exception_cleanup_ptr",
    "__cpp_exception_init_ptr",
    "__gh_FOPEN_MAX",
    "__ghs_cpp_locks",
    "__stdio_cleanup",
    "_iob",
    "_iob_lock",
    "environ",
    "errno",
];

pub fn generate(rpl: &Rpl, rpl_name: &str, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("Failed to open \"{}\" for writing", output.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, ":NAME {}", rpl_name)?;

    for section in &rpl.sections {
        if section.header.section_type != SHT_RPL_EXPORTS {
            continue;
        }

        let exports = section.exports()?;
        if section.header.flags & SHF_EXECINSTR != 0 {
            writeln!(out, "\n:TEXT")?;
        } else {
            writeln!(out, "\n:DATA")?;
        }

        for export in &exports.entries {
            if export.is_tls() {
                // Skip TLS exports for now.
                continue;
            }

            let name = export.name_in(&section.data).unwrap_or_default();
            if EXPORT_BLACKLIST.contains(&name.as_str()) {
                write!(out, "//")?;
            }
            writeln!(out, "{}", name)?;
        }
    }

    out.flush()?;
    Ok(())
}
