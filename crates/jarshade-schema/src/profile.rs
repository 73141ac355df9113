//! Project configuration and per-target build profiles.
//!
//! One `jarshade.toml` declares the project (core jar, library directory,
//! output directory) and a closed set of target profiles. A profile is a
//! plain data record (dependency declarations, relocation rules, optional
//! remap configuration, retention spec, duplicate-path policy) consumed
//! uniformly by a single pipeline; there is no per-family branching anywhere
//! downstream of this file.

use crate::name::NamePattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path probed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for our schema.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but violates a structural invariant.
    #[error("invalid profile: {0}")]
    Invalid(String),
}

/// Project-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// Project name, used as the artifact name stem.
    pub name: String,
    /// Project version, used in artifact names and the generated manifest.
    pub version: String,
    /// The common core library jar; always first in dependency order.
    pub core: PathBuf,
    /// Directory against which dependency archive names resolve.
    #[serde(default = "default_libs_dir")]
    pub libs_dir: PathBuf,
    /// Directory receiving composed archives.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_libs_dir() -> PathBuf {
    PathBuf::from("libs")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

/// The closed set of supported mod-loader families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFamily {
    /// Fabric loader.
    Fabric,
    /// Quilt loader (Fabric-compatible).
    Quilt,
    /// Forge loader.
    Forge,
    /// NeoForge loader.
    NeoForge,
}

impl std::fmt::Display for TargetFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fabric => "Fabric",
            Self::Quilt => "Quilt",
            Self::Forge => "Forge",
            Self::NeoForge => "NeoForge",
        };
        write!(f, "{s}")
    }
}

/// Dependency scope: where an archive's classes end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyScope {
    /// Merged into the composed archive.
    Bundle,
    /// Present in the host environment at runtime; never bundled.
    Provided,
    /// Needed to compile, absent at runtime; never bundled.
    CompileOnly,
}

impl std::fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bundle => "bundle",
            Self::Provided => "provided",
            Self::CompileOnly => "compile-only",
        };
        write!(f, "{s}")
    }
}

/// One declared dependency archive.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencySpec {
    /// Archive file name, resolved against the project `libs_dir`.
    pub archive: String,
    /// Logical name; defaults to the archive file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Scope for this target.
    pub scope: DependencyScope,
    /// Optional expected SHA-256 of the archive bytes (lowercase hex).
    #[serde(default)]
    pub sha256: Option<String>,
    /// Classes to skip when reading the archive.
    #[serde(default)]
    pub exclude: Vec<NamePattern>,
    /// Marks an intentional scope override of an earlier declaration
    /// with the same logical name.
    #[serde(default, rename = "override")]
    pub scope_override: bool,
}

impl DependencySpec {
    /// The logical name used for deduplication and conflict reporting.
    pub fn logical_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        let stem = self.archive.strip_suffix(".jar").unwrap_or(&self.archive);
        stem.strip_suffix(".zip").unwrap_or(stem)
    }
}

/// One package-prefix relocation rule, in dotted form.
#[derive(Debug, Clone, Deserialize)]
pub struct RelocationRule {
    /// Package prefix to rename, e.g. `org.lz4`.
    pub from: String,
    /// Replacement prefix, e.g. `com.example.shaded.lz4`.
    pub to: String,
    /// Class names exempt from renaming entirely (declaration and
    /// references alike).
    #[serde(default)]
    pub exclude: Vec<NamePattern>,
}

impl RelocationRule {
    /// `from` in internal (slash) form.
    pub fn from_internal(&self) -> String {
        self.from.replace('.', "/")
    }

    /// `to` in internal (slash) form.
    pub fn to_internal(&self) -> String {
        self.to.replace('.', "/")
    }
}

/// Whether relocation or remapping runs first for a target using both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteOrder {
    /// Relocate packages first, then remap symbols (the default).
    #[default]
    RelocateThenRemap,
    /// Remap symbols first, then relocate packages.
    RemapThenRelocate,
}

/// Remap configuration for targets whose host ships obfuscated symbols.
#[derive(Debug, Clone, Deserialize)]
pub struct RemapConfig {
    /// Path to the mappings file (srg-flavored text, see `mappings`).
    pub mappings: PathBuf,
    /// Namespaces left under their original names (bundled library code).
    /// The JDK namespaces are always excluded implicitly.
    #[serde(default)]
    pub exclude: Vec<NamePattern>,
    /// Order of relocation vs. remapping.
    #[serde(default)]
    pub order: RewriteOrder,
}

/// What the minimizer must keep.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetentionSpec {
    /// Reachability roots.
    #[serde(default)]
    pub entry_points: Vec<NamePattern>,
    /// Kept unconditionally, reachable or not (reflection, dynamic loading).
    #[serde(default)]
    pub keep: Vec<NamePattern>,
}

impl RetentionSpec {
    /// True when neither entry points nor keep-list entries are declared.
    pub fn is_empty(&self) -> bool {
        self.entry_points.is_empty() && self.keep.is_empty()
    }
}

/// Policy for a path declared by more than one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the first occurrence in dependency order, drop the rest.
    #[default]
    FirstWins,
    /// Union line-oriented service registration files; first-wins otherwise.
    Merge,
    /// Fail the target build, naming the path and both sources.
    Error,
}

/// One target profile: everything the pipeline needs for one mod loader.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetProfile {
    /// Unique target name, e.g. `fabric` or `forge-1.18`.
    pub name: String,
    /// Mod-loader family.
    pub family: TargetFamily,
    /// Platform adapter jar; second in dependency order after the core.
    pub adapter: PathBuf,
    /// Game version baked into the artifact name, if declared.
    #[serde(default)]
    pub game_version: Option<String>,
    /// Duplicate-path policy for composition.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Resource directories copied into the archive, in order.
    #[serde(default)]
    pub resources: Vec<PathBuf>,
    /// Archive entry paths dropped wholesale.
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// Declared dependency archives, in order.
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencySpec>,
    /// Relocation rules.
    #[serde(default, rename = "relocation")]
    pub relocations: Vec<RelocationRule>,
    /// Remap configuration; absent for targets with named host symbols.
    #[serde(default)]
    pub remap: Option<RemapConfig>,
    /// Minimizer retention spec.
    #[serde(default)]
    pub retention: RetentionSpec,
}

impl TargetProfile {
    /// Deterministic artifact file name for this target.
    ///
    /// `{project}-{Family}-{version}.jar`, with `mc{game_version}` spliced
    /// in when the profile declares a game version.
    pub fn archive_file_name(&self, project: &str, version: &str) -> String {
        match &self.game_version {
            Some(mc) => format!("{project}-{}-mc{mc}-{version}.jar", self.family),
            None => format!("{project}-{}-{version}.jar", self.family),
        }
    }
}

/// The whole parsed `jarshade.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project-level settings.
    pub project: ProjectMeta,
    /// Target profiles, one per composed archive.
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetProfile>,
}

impl ProjectConfig {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// [`ProfileError`] if the file cannot be read, is not valid TOML, or
    /// violates a structural invariant (see [`Self::validate`]).
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation.
    ///
    /// Checks, per the composer's invariants: at least one target, unique
    /// target names, unique computed archive names, non-overlapping
    /// relocation `from` prefixes per target, and no relocation `to` prefix
    /// under any `from` prefix (which would defeat idempotence).
    ///
    /// # Errors
    ///
    /// [`ProfileError::Invalid`] naming the first violation found.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.targets.is_empty() {
            return Err(ProfileError::Invalid("no targets declared".to_string()));
        }

        let mut names = HashSet::new();
        let mut artifacts = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(ProfileError::Invalid(format!(
                    "duplicate target name `{}`",
                    target.name
                )));
            }
            let artifact = target.archive_file_name(&self.project.name, &self.project.version);
            if !artifacts.insert(artifact.clone()) {
                return Err(ProfileError::Invalid(format!(
                    "targets collide on artifact name `{artifact}`"
                )));
            }
            validate_relocations(&target.name, &target.relocations)?;
        }
        Ok(())
    }

    /// The target profile with the given name, if declared.
    pub fn target(&self, name: &str) -> Option<&TargetProfile> {
        self.targets.iter().find(|t| t.name == name)
    }
}

fn validate_relocations(target: &str, rules: &[RelocationRule]) -> Result<(), ProfileError> {
    for (i, a) in rules.iter().enumerate() {
        for (j, b) in rules.iter().enumerate() {
            if i != j && prefix_overlaps(&a.from, &b.from) {
                return Err(ProfileError::Invalid(format!(
                    "target `{target}`: relocation rules `{}` and `{}` overlap in source prefix",
                    a.from, b.from
                )));
            }
            if prefix_overlaps(&b.from, &a.to) {
                return Err(ProfileError::Invalid(format!(
                    "target `{target}`: relocation target `{}` falls under source prefix `{}` \
                     (a second pass would rewrite it again)",
                    a.to, b.from
                )));
            }
        }
    }
    Ok(())
}

/// Whether `name` equals `prefix` or sits beneath it on a dot boundary.
fn prefix_overlaps(prefix: &str, name: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[project]
name = "example"
version = "2.5.0"
core = "build/core.jar"

[[target]]
name = "fabric"
family = "fabric"
adapter = "build/fabric-adapter.jar"
game_version = "1.19.2"
duplicate_policy = "merge"

[[target.dependency]]
archive = "lz4-core-1.8.0.jar"
scope = "bundle"
exclude = ["org.lz4.internal.*"]

[[target.dependency]]
archive = "host-api.jar"
scope = "provided"

[[target.relocation]]
from = "org.lz4"
to = "com.example.shaded.lz4"

[target.retention]
entry_points = ["com.example.fabric.*"]
keep = ["org.mozilla.javascript.*"]

[[target]]
name = "forge"
family = "forge"
adapter = "build/forge-adapter.jar"

[target.remap]
mappings = "mappings/named-to-obf.srg"
exclude = ["com.example.*"]
"#;

    fn parse(text: &str) -> ProjectConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn parses_full_config() {
        let config = parse(CONFIG);
        config.validate().unwrap();

        assert_eq!(config.targets.len(), 2);
        let fabric = config.target("fabric").unwrap();
        assert_eq!(fabric.family, TargetFamily::Fabric);
        assert_eq!(fabric.duplicate_policy, DuplicatePolicy::Merge);
        assert_eq!(fabric.dependencies.len(), 2);
        assert_eq!(fabric.dependencies[0].logical_name(), "lz4-core-1.8.0");
        assert_eq!(fabric.dependencies[1].scope, DependencyScope::Provided);
        assert!(fabric.remap.is_none());

        let forge = config.target("forge").unwrap();
        let remap = forge.remap.as_ref().unwrap();
        assert_eq!(remap.order, RewriteOrder::RelocateThenRemap);
        assert!(forge.retention.is_empty());
    }

    #[test]
    fn artifact_names() {
        let config = parse(CONFIG);
        let fabric = config.target("fabric").unwrap();
        assert_eq!(
            fabric.archive_file_name("example", "2.5.0"),
            "example-Fabric-mc1.19.2-2.5.0.jar"
        );
        let forge = config.target("forge").unwrap();
        assert_eq!(
            forge.archive_file_name("example", "2.5.0"),
            "example-Forge-2.5.0.jar"
        );
    }

    #[test]
    fn rejects_duplicate_target_names() {
        let mut config = parse(CONFIG);
        config.targets[1].name = "fabric".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overlapping_relocation_sources() {
        let mut config = parse(CONFIG);
        config.targets[0].relocations.push(RelocationRule {
            from: "org.lz4.util".to_string(),
            to: "elsewhere.util".to_string(),
            exclude: vec![],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn rejects_relocation_target_under_source() {
        let mut config = parse(CONFIG);
        config.targets[0].relocations = vec![RelocationRule {
            from: "org.lz4".to_string(),
            to: "org.lz4.shaded".to_string(),
            exclude: vec![],
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("second pass"));
    }

    #[test]
    fn non_overlapping_prefixes_pass() {
        // `org.lz4` vs `org.lz4ext` share a textual prefix but not a
        // package-segment prefix.
        let mut config = parse(CONFIG);
        config.targets[0].relocations.push(RelocationRule {
            from: "org.lz4ext".to_string(),
            to: "com.example.shaded.lz4ext".to_string(),
            exclude: vec![],
        });
        config.validate().unwrap();
    }
}
