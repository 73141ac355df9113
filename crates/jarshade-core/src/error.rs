//! Build error taxonomy.
//!
//! Every variant is fatal to the target build that raised it. These report
//! configuration or input defects, never transient conditions, so nothing is
//! retried. Targets are independent: one target's error leaves sibling
//! builds untouched.

use crate::class::ClassError;
use jarshade_schema::mappings::MappingParseError;
use jarshade_schema::profile::ProfileError;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage names, for error reporting and progress logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving the dependency set.
    Resolving,
    /// Reading archive bytes and parsing class files.
    Loading,
    /// Rewriting package prefixes.
    Relocating,
    /// Rewriting symbols to the host namespace.
    Remapping,
    /// Reachability analysis.
    Minimizing,
    /// Writing the composed archive.
    Composing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Resolving => "resolving",
            Self::Loading => "loading",
            Self::Relocating => "relocating",
            Self::Remapping => "remapping",
            Self::Minimizing => "minimizing",
            Self::Composing => "composing",
        };
        write!(f, "{s}")
    }
}

/// What kind of reference an unmapped symbol was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A class reference.
    Class,
    /// A field reference.
    Field,
    /// A method reference.
    Method,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
        };
        write!(f, "{s}")
    }
}

/// Fatal build errors, one variant per failure class.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A declared archive could not be located or failed verification.
    #[error("unresolved dependency `{name}` for target `{target}`: {reason} ({path})")]
    UnresolvedDependency {
        /// Target being built.
        target: String,
        /// Logical dependency name.
        name: String,
        /// Path that was probed.
        path: PathBuf,
        /// Why resolution failed.
        reason: String,
    },

    /// The same logical library was declared under conflicting scopes.
    #[error(
        "conflicting scopes for `{name}` in target `{target}`: declared both `{first}` and \
         `{second}` without an override"
    )]
    ConflictingScope {
        /// Target being built.
        target: String,
        /// Logical dependency name.
        name: String,
        /// Scope of the earlier declaration.
        first: String,
        /// Scope of the later declaration.
        second: String,
    },

    /// A class payload could not be parsed.
    #[error("malformed class `{entry}` in {archive}: {source}")]
    MalformedBinaryUnit {
        /// Archive the entry came from.
        archive: String,
        /// Entry path within the archive.
        entry: String,
        /// Parse failure detail.
        source: ClassError,
    },

    /// A reference inside the remap domain has no mapping entry.
    #[error("unmapped {kind} reference in `{unit}`: {owner}.{name} {descriptor}")]
    UnmappedSymbol {
        /// Class containing the reference.
        unit: String,
        /// Class, field, or method.
        kind: RefKind,
        /// Owner type of the reference (the referenced class itself for
        /// class references).
        owner: String,
        /// Member name; empty for class references.
        name: String,
        /// Member descriptor; empty for class references.
        descriptor: String,
    },

    /// Two sources declare the same archive path under the `error` policy.
    #[error("duplicate path `{path}`: declared by {first_source} and {second_source}")]
    DuplicatePath {
        /// The colliding entry path.
        path: String,
        /// Source that declared it first.
        first_source: String,
        /// Source that declared it again.
        second_source: String,
    },

    /// Configuration failed to load or validate.
    #[error(transparent)]
    InvalidProfile(#[from] ProfileError),

    /// A mappings file failed to parse.
    #[error("mappings {path}: {source}")]
    Mappings {
        /// Mappings file path.
        path: PathBuf,
        /// Parse failure detail.
        source: MappingParseError,
    },

    /// An archive container could not be read.
    #[error("archive {path}: {source}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// Container-level failure.
        source: zip::result::ZipError,
    },

    /// OS-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
