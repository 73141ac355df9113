//! Class naming types.
//!
//! Class files store names in the internal slash-separated form
//! (`org/lz4/LZ4Factory`), while configuration files use the dotted source
//! form (`org.lz4.LZ4Factory`). `ClassName` pins the internal form so the two
//! cannot be mixed up, and `NamePattern` is the single matcher used by
//! relocation exclusions, remap exclusions, and retention specs alike.

use serde::{Deserialize, Deserializer, Serialize};

/// Newtype for a class name in internal (slash-separated) form.
///
/// Provides compile-time distinction from dotted configuration-file names and
/// from arbitrary strings such as archive entry paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// Create a `ClassName` from a string already in internal form.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Create a `ClassName` from the dotted source form used in configuration.
    pub fn from_dotted(s: &str) -> Self {
        Self(s.replace('.', "/"))
    }

    /// Return the internal (slash-separated) form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the dotted source form.
    pub fn to_dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    /// The archive entry path for this class (`pkg/Foo` -> `pkg/Foo.class`).
    pub fn entry_path(&self) -> String {
        format!("{}.class", self.0)
    }

    /// Whether this name sits under `prefix` on a package-segment boundary.
    ///
    /// `org/lz4` matches `org/lz4/LZ4` and `org/lz4` itself but never
    /// `org/lz4ext/X`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        match self.0.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

impl std::fmt::Display for ClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A pattern over dotted class names.
///
/// Three forms exist: an exact name (`org.lz4.LZ4Factory`), a namespace
/// wildcard (`org.lz4.*`, the package and everything beneath it), and the
/// bare `*` matching everything. Wildcards match on segment boundaries only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NamePattern {
    /// Matches every class name.
    Any,
    /// Matches one exact dotted name.
    Exact(String),
    /// Matches the named namespace and everything beneath it.
    Namespace(String),
}

impl NamePattern {
    /// Parse a pattern from its configuration-file spelling.
    pub fn parse(s: &str) -> Self {
        if s == "*" {
            Self::Any
        } else if let Some(prefix) = s.strip_suffix(".*") {
            Self::Namespace(prefix.to_string())
        } else {
            Self::Exact(s.to_string())
        }
    }

    /// Whether `name` (internal form) matches this pattern.
    pub fn matches(&self, name: &ClassName) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => name.to_dotted() == *exact,
            Self::Namespace(ns) => name.has_prefix(&ns.replace('.', "/")),
        }
    }

    /// Whether `name` matches any pattern in `patterns`.
    pub fn any_match(patterns: &[Self], name: &ClassName) -> bool {
        patterns.iter().any(|p| p.matches(name))
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(s) => write!(f, "{s}"),
            Self::Namespace(ns) => write!(f, "{ns}.*"),
        }
    }
}

impl<'de> Deserialize<'de> for NamePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_segment_boundaries_only() {
        let name = ClassName::new("org/lz4/LZ4Factory");
        assert!(name.has_prefix("org/lz4"));
        assert!(name.has_prefix("org"));
        assert!(!name.has_prefix("org/lz"));
        assert!(!ClassName::new("org/lz4ext/X").has_prefix("org/lz4"));
    }

    #[test]
    fn pattern_forms() {
        let ns = NamePattern::parse("org.lz4.*");
        assert!(ns.matches(&ClassName::new("org/lz4/LZ4Factory")));
        assert!(ns.matches(&ClassName::new("org/lz4/internal/Deep")));
        assert!(!ns.matches(&ClassName::new("org/lz4ext/X")));

        let exact = NamePattern::parse("org.lz4.LZ4Factory");
        assert!(exact.matches(&ClassName::new("org/lz4/LZ4Factory")));
        assert!(!exact.matches(&ClassName::new("org/lz4/Other")));

        assert!(NamePattern::parse("*").matches(&ClassName::new("a/B")));
    }

    #[test]
    fn dotted_round_trip() {
        let name = ClassName::from_dotted("com.example.Foo$Inner");
        assert_eq!(name.as_str(), "com/example/Foo$Inner");
        assert_eq!(name.to_dotted(), "com.example.Foo$Inner");
        assert_eq!(name.entry_path(), "com/example/Foo$Inner.class");
    }
}
