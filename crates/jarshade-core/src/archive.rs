//! Source archive reading.
//!
//! Input jars are read once, up front, into plain `(path, bytes)` entries so
//! that no I/O happens inside the parallel transform stages. Archives are
//! never mutated in place.

use crate::error::BuildError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One entry read out of a source archive.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Entry path inside the archive.
    pub path: String,
    /// Raw entry bytes.
    pub bytes: Vec<u8>,
}

/// Read every file entry of a jar/zip, in the archive's own order.
///
/// Directory entries are skipped.
///
/// # Errors
///
/// [`BuildError::Archive`] for container-level failures, [`BuildError::Io`]
/// for OS-level ones.
pub fn read_archive(path: &Path) -> Result<Vec<SourceEntry>, BuildError> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| BuildError::Archive {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|source| BuildError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        entries.push(SourceEntry {
            path: entry.name().to_string(),
            bytes,
        });
    }
    Ok(entries)
}

/// SHA-256 of a file's bytes, lowercase hex. Used for declared input
/// verification.
///
/// # Errors
///
/// [`BuildError::Io`] if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String, BuildError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
