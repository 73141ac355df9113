//! Per-target build pipeline.
//!
//! One [`TargetBuild`] owns everything a target needs and shares no mutable
//! state with any other target, so targets can run as parallel tasks. Within
//! a target the stages are strictly sequential; the per-unit class rewrites
//! are spread across a scoped thread pool with outputs reassembled in input
//! order, and all archive bytes are read before the parallel stage starts.

use crate::archive::read_archive;
use crate::class::{ClassFile, RewriteError};
use crate::compose::{ComposedArchive, ManifestInfo, PendingEntry};
use crate::error::{BuildError, Stage};
use crate::minimize::{self, RefNode};
use crate::relocate::Relocator;
use crate::remap::Remapper;
use crate::resolve::{self, ResolvedDependency};
use jarshade_schema::ArtifactDigest;
use jarshade_schema::mappings::RemapTable;
use jarshade_schema::name::{ClassName, NamePattern};
use jarshade_schema::profile::{ProjectMeta, RemapConfig, RewriteOrder, TargetProfile};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A target build that failed, with the originating stage attached.
#[derive(Debug, Error)]
#[error("target `{target}` failed while {stage}: {source}")]
pub struct TargetFailure {
    /// Target name.
    pub target: String,
    /// Stage that raised the error.
    pub stage: Stage,
    /// The underlying error.
    pub source: BuildError,
}

/// Result of a successful target build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Target name.
    pub target: String,
    /// Final artifact path.
    pub artifact: PathBuf,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// BLAKE3 digest of the artifact.
    pub digest: ArtifactDigest,
    /// Classes read from bundled archives.
    pub classes_loaded: usize,
    /// Classes surviving minimization.
    pub classes_kept: usize,
}

/// Load and parse the remap table a target declares.
///
/// # Errors
///
/// [`BuildError::Io`] when the file cannot be read,
/// [`BuildError::Mappings`] when it does not parse.
pub fn load_remap_table(config: &RemapConfig, project_dir: &Path) -> Result<RemapTable, BuildError> {
    let path = project_dir.join(&config.mappings);
    let text = std::fs::read_to_string(&path)?;
    RemapTable::parse(&text).map_err(|source| BuildError::Mappings { path, source })
}

/// One entry loaded from a bundled archive, in dependency order. Classes
/// are carried as an index into the unit vector so transformed bytes land
/// back in the right slot.
enum Slot {
    Unit(usize),
    Resource(PendingEntry),
}

/// Provenance of a class unit, kept alongside it for error context.
struct UnitMeta {
    archive: String,
    entry: String,
}

struct RawUnit {
    meta: UnitMeta,
    bytes: Vec<u8>,
}

type Unit = (UnitMeta, ClassFile);

/// Everything one target build needs. Immutable once constructed.
#[derive(Debug)]
pub struct TargetBuild {
    project: ProjectMeta,
    project_dir: PathBuf,
    target: TargetProfile,
}

impl TargetBuild {
    /// Bundle a target profile with its project context.
    pub fn new(project: ProjectMeta, project_dir: PathBuf, target: TargetProfile) -> Self {
        Self {
            project,
            project_dir,
            target,
        }
    }

    /// The target profile.
    pub fn target(&self) -> &TargetProfile {
        &self.target
    }

    /// The artifact path this build will write.
    pub fn artifact_path(&self) -> PathBuf {
        self.project_dir.join(&self.project.output_dir).join(
            self.target
                .archive_file_name(&self.project.name, &self.project.version),
        )
    }

    /// Resolve this target's dependency set without building.
    ///
    /// # Errors
    ///
    /// [`TargetFailure`] tagged with the resolving stage.
    pub fn resolve(&self) -> Result<Vec<ResolvedDependency>, TargetFailure> {
        resolve::resolve(&self.target, &self.project, &self.project_dir)
            .map_err(|e| self.fail(Stage::Resolving, e))
    }

    fn fail(&self, stage: Stage, source: BuildError) -> TargetFailure {
        TargetFailure {
            target: self.target.name.clone(),
            stage,
            source,
        }
    }

    fn unit_error(
        &self,
        stage: Stage,
        meta: &UnitMeta,
        source: crate::class::ClassError,
    ) -> TargetFailure {
        self.fail(
            stage,
            BuildError::MalformedBinaryUnit {
                archive: meta.archive.clone(),
                entry: meta.entry.clone(),
                source,
            },
        )
    }

    /// Run the full pipeline: resolve, load, relocate, remap (optional),
    /// minimize, compose, write.
    ///
    /// # Errors
    ///
    /// [`TargetFailure`] carrying the originating stage and error. The
    /// artifact path is only ever written on success (temp file and rename).
    pub fn run(&self) -> Result<BuildOutcome, TargetFailure> {
        let span = tracing::info_span!("target", name = %self.target.name);
        let _guard = span.enter();

        // Resolving: dependency set plus the remap table, both pure inputs.
        let deps = self.resolve()?;
        let remap_table = match &self.target.remap {
            Some(config) => Some(
                load_remap_table(config, &self.project_dir)
                    .map_err(|e| self.fail(Stage::Resolving, e))?,
            ),
            None => None,
        };
        tracing::debug!(dependencies = deps.len(), "resolved");

        // Loading: all bytes up front, no I/O in the parallel stages.
        let (slots, raw_units) = self
            .load(&deps)
            .map_err(|e| self.fail(Stage::Loading, e))?;
        let classes_loaded = raw_units.len();
        tracing::debug!(classes = classes_loaded, "loaded");

        // Relocating / Remapping, in the profile's order.
        let relocator = Relocator::new(&self.target.relocations);
        let order = self
            .target
            .remap
            .as_ref()
            .map_or(RewriteOrder::RelocateThenRemap, |c| c.order);
        let remapper = remap_table
            .as_ref()
            .map(|t| Remapper::new(t, remap_exclusions(&self.target)));

        let units = match order {
            RewriteOrder::RelocateThenRemap => {
                let units = parse_and(raw_units, |class, _| {
                    relocator.relocate(class).map_err(RewriteError::Class)
                })
                .map_err(|e| self.fail(Stage::Relocating, e))?;
                match &remapper {
                    Some(r) => rewrite(units, |class, meta| r.remap(class, &meta.entry))
                        .map_err(|e| self.fail(Stage::Remapping, e))?,
                    None => units,
                }
            }
            RewriteOrder::RemapThenRelocate => {
                let units = parse_and(raw_units, |class, entry| match &remapper {
                    Some(r) => r.remap(class, entry),
                    None => Ok(()),
                })
                .map_err(|e| self.fail(Stage::Remapping, e))?;
                rewrite(units, |class, _| {
                    relocator.relocate(class).map_err(RewriteError::Class)
                })
                .map_err(|e| self.fail(Stage::Relocating, e))?
            }
        };

        // Minimizing. An undeclared retention spec keeps everything; the
        // reachability contract applies once one exists.
        let kept: BTreeSet<ClassName> = if self.target.retention.is_empty() {
            tracing::debug!("no retention roots, keeping all classes");
            let mut all = BTreeSet::new();
            for (meta, class) in &units {
                let name = class
                    .declared_name()
                    .map_err(|e| self.unit_error(Stage::Minimizing, meta, e))?;
                all.insert(ClassName::new(name));
            }
            all
        } else {
            let mut nodes = Vec::with_capacity(units.len());
            for (meta, class) in &units {
                let name = class
                    .declared_name()
                    .map_err(|e| self.unit_error(Stage::Minimizing, meta, e))?;
                let mut refs = Vec::new();
                class
                    .referenced_classes(&mut |n| refs.push(ClassName::new(n)))
                    .map_err(|e| self.unit_error(Stage::Minimizing, meta, e))?;
                nodes.push(RefNode {
                    name: ClassName::new(name),
                    refs,
                });
            }
            minimize::reachable(&nodes, &self.target.retention)
        };
        let classes_kept = kept.len();
        tracing::debug!(kept = classes_kept, of = units.len(), "minimized");

        // Composing.
        let mut entries: Vec<PendingEntry> = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Unit(i) => {
                    let (meta, class) = &units[i];
                    let name = class
                        .declared_name()
                        .map(ClassName::new)
                        .map_err(|e| self.unit_error(Stage::Composing, meta, e))?;
                    if !kept.contains(&name) {
                        continue;
                    }
                    entries.push(PendingEntry {
                        path: name.entry_path(),
                        bytes: class.encode(),
                        source: meta.archive.clone(),
                    });
                }
                Slot::Resource(entry) => entries.push(entry),
            }
        }
        self.collect_resources(&mut entries)
            .map_err(|e| self.fail(Stage::Composing, e))?;

        let manifest = ManifestInfo {
            title: self.project.name.clone(),
            version: self.project.version.clone(),
            target_platform: self.target.family.to_string(),
        };
        let archive = ComposedArchive::compose(
            entries,
            &manifest,
            self.target.duplicate_policy,
            &self.target.exclude_paths,
        )
        .map_err(|e| self.fail(Stage::Composing, e))?;

        let artifact = self.artifact_path();
        let (size_bytes, digest) = archive
            .write_to(&artifact)
            .map_err(|e| self.fail(Stage::Composing, e))?;
        tracing::info!(artifact = %artifact.display(), size = size_bytes, %digest, "composed");

        Ok(BuildOutcome {
            target: self.target.name.clone(),
            artifact,
            size_bytes,
            digest,
            classes_loaded,
            classes_kept,
        })
    }

    /// Read every bundled archive into slots (dependency order preserved)
    /// and raw class units.
    fn load(&self, deps: &[ResolvedDependency]) -> Result<(Vec<Slot>, Vec<RawUnit>), BuildError> {
        let mut slots = Vec::new();
        let mut raw_units = Vec::new();
        for dep in deps.iter().filter(|d| d.bundled()) {
            for entry in read_archive(&dep.path)? {
                if self.target.exclude_paths.iter().any(|p| *p == entry.path) {
                    tracing::debug!(path = %entry.path, "excluded by path filter");
                    continue;
                }
                if let Some(stem) = entry.path.strip_suffix(".class") {
                    let name = ClassName::new(stem);
                    if NamePattern::any_match(&dep.exclude, &name) {
                        tracing::debug!(class = %name, dep = %dep.name, "excluded class");
                        continue;
                    }
                    slots.push(Slot::Unit(raw_units.len()));
                    raw_units.push(RawUnit {
                        meta: UnitMeta {
                            archive: dep.name.clone(),
                            entry: entry.path,
                        },
                        bytes: entry.bytes,
                    });
                } else {
                    slots.push(Slot::Resource(PendingEntry {
                        path: entry.path,
                        bytes: entry.bytes,
                        source: dep.name.clone(),
                    }));
                }
            }
        }
        Ok((slots, raw_units))
    }

    /// Append resource-directory files, relative paths, sorted for
    /// determinism.
    fn collect_resources(&self, entries: &mut Vec<PendingEntry>) -> Result<(), BuildError> {
        for dir in &self.target.resources {
            let root = self.project_dir.join(dir);
            let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .collect();
            files.sort();
            for file in files {
                let rel = file
                    .strip_prefix(&root)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .replace('\\', "/");
                entries.push(PendingEntry {
                    path: rel,
                    bytes: std::fs::read(&file)?,
                    source: dir.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

fn remap_exclusions(target: &TargetProfile) -> &[NamePattern] {
    target.remap.as_ref().map_or(&[], |c| c.exclude.as_slice())
}

fn rewrite_error(meta: &UnitMeta, e: RewriteError<BuildError>) -> BuildError {
    match e {
        RewriteError::Class(source) => BuildError::MalformedBinaryUnit {
            archive: meta.archive.clone(),
            entry: meta.entry.clone(),
            source,
        },
        RewriteError::Map(build) => build,
    }
}

/// Parse all units and apply the first rewrite, in parallel.
fn parse_and(
    raw: Vec<RawUnit>,
    op: impl Fn(&mut ClassFile, &str) -> Result<(), RewriteError<BuildError>> + Sync,
) -> Result<Vec<Unit>, BuildError> {
    par_map(raw, |unit| {
        let mut class =
            ClassFile::parse(&unit.bytes).map_err(|e| rewrite_error(&unit.meta, e.into()))?;
        op(&mut class, &unit.meta.entry).map_err(|e| rewrite_error(&unit.meta, e))?;
        Ok((unit.meta, class))
    })
}

/// Apply a second rewrite over already-parsed units, in parallel.
fn rewrite(
    units: Vec<Unit>,
    op: impl Fn(&mut ClassFile, &UnitMeta) -> Result<(), RewriteError<BuildError>> + Sync,
) -> Result<Vec<Unit>, BuildError> {
    par_map(units, |(meta, mut class)| {
        op(&mut class, &meta).map_err(|e| rewrite_error(&meta, e))?;
        Ok((meta, class))
    })
}

/// Order-preserving parallel map over a scoped thread pool. The first error
/// in input order wins within a chunk, and the earliest failing chunk wins
/// overall, so failures are deterministic for a given input.
fn par_map<T, U>(
    items: Vec<T>,
    f: impl Fn(T) -> Result<U, BuildError> + Sync,
) -> Result<Vec<U>, BuildError>
where
    T: Send,
    U: Send,
{
    let workers = num_cpus::get().clamp(1, 16);
    if items.len() <= 1 || workers == 1 {
        return items.into_iter().map(f).collect();
    }

    let chunk_size = items.len().div_ceil(workers);
    let mut chunks: Vec<Vec<T>> = Vec::with_capacity(workers);
    let mut items = items.into_iter();
    loop {
        let chunk: Vec<T> = items.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }

    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .into_iter()
                        .map(f)
                        .collect::<Result<Vec<U>, BuildError>>()
                })
            })
            .collect();

        let mut out = Vec::new();
        let mut first_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(batch)) => out.extend(batch),
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        match first_err {
            None => Ok(out),
            Some(e) => Err(e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn par_map_preserves_order() {
        let items: Vec<u32> = (0..100).collect();
        let out = par_map(items, |i| Ok(i * 2)).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().enumerate().all(|(i, v)| *v == (i as u32) * 2));
    }

    #[test]
    fn par_map_surfaces_a_deterministic_error() {
        let items: Vec<u32> = (0..100).collect();
        let first = par_map(items.clone(), fail_over_40).unwrap_err();
        let second = par_map(items, fail_over_40).unwrap_err();
        let (BuildError::DuplicatePath { path: a, .. }, BuildError::DuplicatePath { path: b, .. }) =
            (first, second)
        else {
            panic!("wrong error variant");
        };
        assert_eq!(a, b);
        assert!(a.parse::<u32>().unwrap() >= 40);
    }

    fn fail_over_40(i: u32) -> Result<u32, BuildError> {
        if i >= 40 {
            Err(BuildError::DuplicatePath {
                path: i.to_string(),
                first_source: String::new(),
                second_source: String::new(),
            })
        } else {
            Ok(i)
        }
    }
}
