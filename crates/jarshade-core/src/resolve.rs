//! Dependency set resolution.
//!
//! Pure function of the target configuration: the same target resolves to a
//! byte-identical ordered sequence every time, which is what makes composed
//! archives reproducible. Order is declaration order with the core jar
//! first and the platform adapter second; order only matters downstream for
//! duplicate-path resolution.

use crate::archive::sha256_file;
use crate::error::BuildError;
use jarshade_schema::name::NamePattern;
use jarshade_schema::profile::{DependencyScope, ProjectMeta, TargetProfile};
use std::path::{Path, PathBuf};

/// A dependency with its archive located and verified.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    /// Logical name, for conflict reporting and deduplication.
    pub name: String,
    /// Absolute (or project-relative) archive path, confirmed to exist.
    pub path: PathBuf,
    /// Scope for this target.
    pub scope: DependencyScope,
    /// Classes to skip when reading the archive.
    pub exclude: Vec<NamePattern>,
}

impl ResolvedDependency {
    /// Whether this dependency's classes are merged into the output.
    pub fn bundled(&self) -> bool {
        self.scope == DependencyScope::Bundle
    }
}

/// Resolve the ordered dependency set for one target.
///
/// The core jar and the adapter jar resolve against `project_dir`; declared
/// dependencies resolve against `project_dir/libs_dir`. Every archive must
/// exist regardless of scope, and archives with a declared SHA-256 must
/// match it.
///
/// Duplicates by logical name: same scope keeps the first declaration;
/// conflicting scopes raise [`BuildError::ConflictingScope`] unless the
/// later declaration sets `override = true`, which replaces the earlier
/// entry in place (keeping its position in the order).
///
/// # Errors
///
/// [`BuildError::UnresolvedDependency`] or [`BuildError::ConflictingScope`].
pub fn resolve(
    target: &TargetProfile,
    project: &ProjectMeta,
    project_dir: &Path,
) -> Result<Vec<ResolvedDependency>, BuildError> {
    let mut resolved: Vec<ResolvedDependency> = Vec::with_capacity(target.dependencies.len() + 2);

    let core_path = project_dir.join(&project.core);
    resolved.push(locate(
        &target.name,
        &stem_of(&project.core),
        core_path,
        DependencyScope::Bundle,
        &[],
        None,
    )?);

    let adapter_path = project_dir.join(&target.adapter);
    resolved.push(locate(
        &target.name,
        &stem_of(&target.adapter),
        adapter_path,
        DependencyScope::Bundle,
        &[],
        None,
    )?);

    let libs_dir = project_dir.join(&project.libs_dir);
    for spec in &target.dependencies {
        let dep = locate(
            &target.name,
            spec.logical_name(),
            libs_dir.join(&spec.archive),
            spec.scope,
            &spec.exclude,
            spec.sha256.as_deref(),
        )?;

        match resolved.iter().position(|d| d.name == dep.name) {
            None => resolved.push(dep),
            Some(i) if resolved[i].scope == dep.scope => {
                tracing::debug!(
                    target_name = %target.name,
                    dependency = %dep.name,
                    "dropping duplicate declaration"
                );
            }
            Some(i) if spec.scope_override => {
                tracing::debug!(
                    target_name = %target.name,
                    dependency = %dep.name,
                    from = %resolved[i].scope,
                    to = %dep.scope,
                    "scope override"
                );
                resolved[i] = dep;
            }
            Some(i) => {
                return Err(BuildError::ConflictingScope {
                    target: target.name.clone(),
                    name: dep.name,
                    first: resolved[i].scope.to_string(),
                    second: dep.scope.to_string(),
                });
            }
        }
    }

    Ok(resolved)
}

fn locate(
    target: &str,
    name: &str,
    path: PathBuf,
    scope: DependencyScope,
    exclude: &[NamePattern],
    sha256: Option<&str>,
) -> Result<ResolvedDependency, BuildError> {
    if !path.is_file() {
        return Err(BuildError::UnresolvedDependency {
            target: target.to_string(),
            name: name.to_string(),
            path,
            reason: "archive not found".to_string(),
        });
    }
    if let Some(expected) = sha256 {
        let actual = sha256_file(&path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(BuildError::UnresolvedDependency {
                target: target.to_string(),
                name: name.to_string(),
                path,
                reason: format!("sha256 mismatch: declared {expected}, file is {actual}"),
            });
        }
    }
    Ok(ResolvedDependency {
        name: name.to_string(),
        path,
        scope,
        exclude: exclude.to_vec(),
    })
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarshade_schema::profile::{DependencySpec, DuplicatePolicy, RetentionSpec, TargetFamily};

    fn touch(dir: &Path, name: &str) {
        // A zip local header is enough for resolution, which only checks
        // existence (and hashes on request).
        std::fs::write(dir.join(name), b"PK\x05\x06stub").unwrap();
    }

    fn spec(archive: &str, scope: DependencyScope) -> DependencySpec {
        DependencySpec {
            archive: archive.to_string(),
            name: None,
            scope,
            sha256: None,
            exclude: vec![],
            scope_override: false,
        }
    }

    fn project(dir: &Path) -> ProjectMeta {
        touch(dir, "core.jar");
        ProjectMeta {
            name: "example".to_string(),
            version: "1.0.0".to_string(),
            core: PathBuf::from("core.jar"),
            libs_dir: PathBuf::from("libs"),
            output_dir: PathBuf::from("dist"),
        }
    }

    fn target(deps: Vec<DependencySpec>) -> TargetProfile {
        TargetProfile {
            name: "fabric".to_string(),
            family: TargetFamily::Fabric,
            adapter: PathBuf::from("adapter.jar"),
            game_version: None,
            duplicate_policy: DuplicatePolicy::FirstWins,
            resources: vec![],
            exclude_paths: vec![],
            dependencies: deps,
            relocations: vec![],
            remap: None,
            retention: RetentionSpec::default(),
        }
    }

    #[test]
    fn resolves_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        touch(&dir.path().join("libs"), "lz4-1.8.0.jar");
        touch(&dir.path().join("libs"), "host-api.jar");

        let t = target(vec![
            spec("lz4-1.8.0.jar", DependencyScope::Bundle),
            spec("host-api.jar", DependencyScope::Provided),
        ]);
        let deps = resolve(&t, &meta, dir.path()).unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["core", "adapter", "lz4-1.8.0", "host-api"]);
        assert!(deps[0].bundled());
        assert!(!deps[3].bundled());

        // Determinism: resolving again gives the identical sequence.
        let again = resolve(&t, &meta, dir.path()).unwrap();
        let again_names: Vec<&str> = again.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, again_names);
    }

    #[test]
    fn missing_archive_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();

        let t = target(vec![spec("absent.jar", DependencyScope::Bundle)]);
        let err = resolve(&t, &meta, dir.path()).unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedDependency { name, .. } if name == "absent"));
    }

    #[test]
    fn conflicting_scope_without_override_fails() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        touch(&dir.path().join("libs"), "lib.jar");

        let t = target(vec![
            spec("lib.jar", DependencyScope::Bundle),
            spec("lib.jar", DependencyScope::Provided),
        ]);
        let err = resolve(&t, &meta, dir.path()).unwrap_err();
        assert!(matches!(err, BuildError::ConflictingScope { name, .. } if name == "lib"));
    }

    #[test]
    fn override_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        touch(&dir.path().join("libs"), "lib.jar");
        touch(&dir.path().join("libs"), "other.jar");

        let mut second = spec("lib.jar", DependencyScope::Provided);
        second.scope_override = true;
        let t = target(vec![
            spec("lib.jar", DependencyScope::Bundle),
            spec("other.jar", DependencyScope::Bundle),
            second,
        ]);
        let deps = resolve(&t, &meta, dir.path()).unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["core", "adapter", "lib", "other"]);
        assert_eq!(deps[2].scope, DependencyScope::Provided);
    }

    #[test]
    fn duplicate_same_scope_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        touch(&dir.path().join("libs"), "lib.jar");

        let t = target(vec![
            spec("lib.jar", DependencyScope::Bundle),
            spec("lib.jar", DependencyScope::Bundle),
        ]);
        let deps = resolve(&t, &meta, dir.path()).unwrap();
        assert_eq!(deps.len(), 3);
    }

    #[test]
    fn sha256_mismatch_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let meta = project(dir.path());
        touch(dir.path(), "adapter.jar");
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        touch(&dir.path().join("libs"), "lib.jar");

        let mut dep = spec("lib.jar", DependencyScope::Bundle);
        dep.sha256 = Some("0".repeat(64));
        let t = target(vec![dep]);
        let err = resolve(&t, &meta, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnresolvedDependency { reason, .. } if reason.contains("sha256 mismatch")
        ));
    }
}
