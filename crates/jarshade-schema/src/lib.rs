//! Shared data model for the jarshade artifact composer.
//!
//! Everything in here is plain data: naming types, descriptor/signature
//! rewriting, the remap table text format, and the per-target build profiles
//! loaded from `jarshade.toml`. The engine that consumes these lives in
//! `jarshade-core`.

pub mod descriptor;
pub mod digest;
pub mod mappings;
pub mod name;
pub mod profile;
pub mod signature;

// Re-exports
pub use digest::ArtifactDigest;
pub use mappings::{MappingParseError, MemberKey, RemapTable};
pub use name::{ClassName, NamePattern};
pub use profile::{
    DependencyScope, DependencySpec, DuplicatePolicy, ProfileError, ProjectConfig, RelocationRule,
    RemapConfig, RetentionSpec, RewriteOrder, TargetFamily, TargetProfile,
};

/// Magic bytes at the start of every JVM class file (`0xCAFEBABE`).
pub const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Default name of the project configuration file.
pub const CONFIG_FILE: &str = "jarshade.toml";
