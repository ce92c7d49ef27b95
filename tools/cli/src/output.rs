//! Console formatting for listings and vault metadata.

use chrono::Local;
use std::io::{self, Write};

use strongroom_vault::{DirectoryEntry, VaultMetadata};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN: &str = "unknown";

/// Human readable size with one decimal above a kilobyte.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

/// Full table used by the `list` command.
pub fn print_table(out: &mut impl Write, title: &str, entries: &[DirectoryEntry]) -> io::Result<()> {
    writeln!(out, "\nContents of {}:\n", title)?;
    writeln!(out, "{:<40} {:>15} {:>20}", "NAME", "SIZE", "MODIFIED")?;
    writeln!(out, "{}", "-".repeat(77))?;

    for entry in entries {
        let (tag, size) = if entry.is_directory {
            ("[DIR] ", "-".to_string())
        } else {
            ("      ", format_size(entry.size_bytes))
        };
        let modified = entry
            .modified_at
            .with_timezone(&Local)
            .format(DATE_FORMAT)
            .to_string();
        writeln!(out, "{}{:<34} {:>15} {:>20}", tag, entry.name, size, modified)?;
    }

    writeln!(out)
}

/// Compact listing used inside the interactive shell.
pub fn print_compact(out: &mut impl Write, entries: &[DirectoryEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "(empty)");
    }

    for entry in entries {
        if entry.is_directory {
            writeln!(out, "[DIR] {}", entry.name)?;
        } else {
            writeln!(out, "      {} ({})", entry.name, format_size(entry.size_bytes))?;
        }
    }
    Ok(())
}

/// Output of the `info` command.
pub fn print_metadata(out: &mut impl Write, meta: &VaultMetadata) -> io::Result<()> {
    writeln!(out, "Vault: {}", meta.path.display())?;
    if !meta.valid {
        let reason = meta.invalid_reason.as_deref().unwrap_or(UNKNOWN);
        return writeln!(out, "Status: INVALID ({})", reason);
    }

    fn or_unknown<T: ToString>(value: &Option<T>) -> String {
        value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    writeln!(out, "Status: VALID")?;
    writeln!(out, "  Format: {}", or_unknown(&meta.format))?;
    writeln!(out, "  Cipher: {}", or_unknown(&meta.cipher_combo))?;
    writeln!(out, "  Vault ID: {}", or_unknown(&meta.vault_id))?;
    match meta.kdf_cost {
        Some(cost) => writeln!(out, "  KDF memory cost: {} KiB", cost),
        None => writeln!(out, "  KDF memory cost: {}", UNKNOWN),
    }
}
