//! Archive composition.
//!
//! Merges surviving classes, resources, and a generated manifest into one
//! deterministic archive: entries in first-seen order behind the manifest,
//! fixed compression settings, DOS-epoch timestamps, and a temp-file-then-
//! rename write so an aborted build never leaves a partial artifact at the
//! final path.

use crate::error::BuildError;
use jarshade_schema::ArtifactDigest;
use jarshade_schema::profile::DuplicatePolicy;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Prefix under which line-oriented service registration files live; these
/// are the only files the `merge` policy actually merges.
const SERVICES_PREFIX: &str = "META-INF/services/";

/// Jar manifest fields, written in fixed order for reproducibility.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
    /// `Implementation-Title`.
    pub title: String,
    /// `Implementation-Version`.
    pub version: String,
    /// `Target-Platform`.
    pub target_platform: String,
}

impl ManifestInfo {
    fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("Manifest-Version: 1.0\r\n");
        out.push_str(&format!("Implementation-Title: {}\r\n", self.title));
        out.push_str(&format!("Implementation-Version: {}\r\n", self.version));
        out.push_str(&format!("Target-Platform: {}\r\n", self.target_platform));
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// An entry offered to the composer, tagged with its source for duplicate
/// diagnostics.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Archive entry path.
    pub path: String,
    /// Entry bytes.
    pub bytes: Vec<u8>,
    /// Human-readable source (dependency name or resource directory).
    pub source: String,
}

/// The composed output: ordered `(path, bytes)` with duplicates resolved.
#[derive(Debug)]
pub struct ComposedArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl ComposedArchive {
    /// Resolve duplicates and assemble the final entry list.
    ///
    /// `entries` must already be in dependency/first-seen order; the
    /// manifest always comes first. Paths listed in `exclude_paths` are
    /// dropped wholesale.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicatePath`] under the `error` policy, naming the
    /// path and both sources.
    pub fn compose(
        entries: impl IntoIterator<Item = PendingEntry>,
        manifest: &ManifestInfo,
        policy: DuplicatePolicy,
        exclude_paths: &[String],
    ) -> Result<Self, BuildError> {
        let mut ordered: Vec<(String, Vec<u8>)> =
            vec![("META-INF/MANIFEST.MF".to_string(), manifest.render())];
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        index.insert(ordered[0].0.clone(), 0);
        sources.insert(ordered[0].0.clone(), "generated manifest".to_string());

        for entry in entries {
            if exclude_paths.iter().any(|p| *p == entry.path) {
                tracing::debug!(path = %entry.path, "excluded by path filter");
                continue;
            }
            match index.get(&entry.path) {
                None => {
                    index.insert(entry.path.clone(), ordered.len());
                    sources.insert(entry.path.clone(), entry.source);
                    ordered.push((entry.path, entry.bytes));
                }
                Some(&slot) => match policy {
                    DuplicatePolicy::FirstWins => {
                        tracing::debug!(
                            path = %entry.path,
                            first = %sources[&entry.path],
                            dropped = %entry.source,
                            "duplicate path, first wins"
                        );
                    }
                    DuplicatePolicy::Merge if entry.path.starts_with(SERVICES_PREFIX) => {
                        let merged = merge_service_lines(&ordered[slot].1, &entry.bytes);
                        ordered[slot].1 = merged;
                    }
                    DuplicatePolicy::Merge => {
                        tracing::debug!(
                            path = %entry.path,
                            "duplicate path not mergeable, first wins"
                        );
                    }
                    DuplicatePolicy::Error => {
                        return Err(BuildError::DuplicatePath {
                            path: entry.path.clone(),
                            first_source: sources[&entry.path].clone(),
                            second_source: entry.source,
                        });
                    }
                },
            }
        }

        Ok(Self { entries: ordered })
    }

    /// Entry count, manifest included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the manifest is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    /// Encode the archive to bytes with deterministic layout: fixed
    /// compression method and level, DOS-epoch timestamps, entries in
    /// first-seen order.
    ///
    /// # Errors
    ///
    /// [`BuildError::Io`] on encoding failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6))
            .last_modified_time(zip::DateTime::default());

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (path, bytes) in &self.entries {
            writer
                .start_file(path, options)
                .map_err(std::io::Error::other)?;
            writer.write_all(bytes)?;
        }
        let cursor = writer.finish().map_err(std::io::Error::other)?;
        Ok(cursor.into_inner())
    }

    /// Write the archive to `path` atomically: encode, write to a named
    /// temp file next to the destination, fsync, rename. Returns the final
    /// size and digest.
    ///
    /// # Errors
    ///
    /// [`BuildError::Io`] on any filesystem failure.
    pub fn write_to(&self, path: &Path) -> Result<(u64, ArtifactDigest), BuildError> {
        let bytes = self.to_bytes()?;
        let digest = ArtifactDigest::of(&bytes);

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        Ok((bytes.len() as u64, digest))
    }
}

/// Union of non-blank lines, first-seen order, trailing newline.
fn merge_service_lines(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut lines: Vec<String> = Vec::new();
    for chunk in [first, second] {
        let text = String::from_utf8_lossy(chunk);
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() && !lines.iter().any(|l| l == line) {
                lines.push(line.to_string());
            }
        }
    }
    let mut out = lines.join("\n").into_bytes();
    out.push(b'\n');
    out
}
