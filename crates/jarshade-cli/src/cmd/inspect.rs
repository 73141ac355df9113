//! `jarshade inspect` - look inside a composed (or any) archive.

use anyhow::{Context, Result};
use comfy_table::{Table, presets};
use jarshade_core::archive::read_archive;
use jarshade_core::class::ClassFile;
use std::path::Path;

/// List an archive's entries, or parse its classes and show each declared
/// name with its outbound reference count.
pub fn inspect(archive: &Path, classes: bool) -> Result<()> {
    let entries = read_archive(archive)
        .with_context(|| format!("cannot read archive {}", archive.display()))?;

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);

    if classes {
        table.set_header(vec!["Class", "References"]);
        for entry in entries.iter().filter(|e| e.path.ends_with(".class")) {
            let class = ClassFile::parse(&entry.bytes)
                .with_context(|| format!("malformed class `{}`", entry.path))?;
            let name = class
                .declared_name()
                .with_context(|| format!("malformed class `{}`", entry.path))?
                .to_string();
            let mut refs = 0usize;
            class.referenced_classes(&mut |_| refs += 1)?;
            table.add_row(vec![name, refs.to_string()]);
        }
    } else {
        table.set_header(vec!["Entry", "Bytes"]);
        for entry in &entries {
            table.add_row(vec![entry.path.clone(), entry.bytes.len().to_string()]);
        }
    }

    println!("{table}");
    Ok(())
}
