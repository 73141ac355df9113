//! Package-prefix relocation.
//!
//! Renames bundled library packages so they cannot collide with copies the
//! host environment already carries. Longest-prefix-match disambiguates
//! when one rule's source sits above another's; prefixes match only on
//! package-segment boundaries. Exclusion is name-based: an excluded class
//! is renamed nowhere, neither at its declaration nor at any call site, but
//! everything it references that *is* relocated still gets rewritten,
//! because the mapper runs per name rather than per unit.
//!
//! Idempotence falls out of configuration validation: no rule's target
//! prefix may sit under any rule's source prefix, so a relocated name can
//! never match a rule again.

use crate::class::{ClassError, ClassFile, RewriteError};
use jarshade_schema::name::{ClassName, NamePattern};
use jarshade_schema::profile::RelocationRule;
use std::convert::Infallible;

struct CompiledRule {
    from: String,
    to: String,
    exclude: Vec<NamePattern>,
}

/// A compiled relocation rule set, shareable across worker threads.
#[derive(Default)]
pub struct Relocator {
    // Sorted by descending source length so the first hit is the longest.
    rules: Vec<CompiledRule>,
}

impl std::fmt::Debug for Relocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relocator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Relocator {
    /// Compile a rule set. The rules are assumed validated (non-overlapping
    /// sources, no target under a source); see `ProjectConfig::validate`.
    pub fn new(rules: &[RelocationRule]) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .iter()
            .map(|r| CompiledRule {
                from: r.from_internal(),
                to: r.to_internal(),
                exclude: r.exclude.clone(),
            })
            .collect();
        compiled.sort_by(|a, b| b.from.len().cmp(&a.from.len()).then(a.from.cmp(&b.from)));
        Self { rules: compiled }
    }

    /// True when there are no rules and relocation is a no-op.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The relocated form of `name` (internal), or `None` to keep it.
    pub fn map_name(&self, name: &str) -> Option<String> {
        let class = ClassName::new(name);
        for rule in &self.rules {
            if !class.has_prefix(&rule.from) {
                continue;
            }
            if NamePattern::any_match(&rule.exclude, &class) {
                return None;
            }
            let rest = &name[rule.from.len()..];
            return Some(format!("{}{rest}", rule.to));
        }
        None
    }

    /// Rewrite every type occurrence in `class` under the rule set.
    ///
    /// # Errors
    ///
    /// [`ClassError`] when the class structure gives out mid-rewrite.
    pub fn relocate(&self, class: &mut ClassFile) -> Result<(), ClassError> {
        if self.is_empty() {
            return Ok(());
        }
        let mut map = |name: &str| -> Result<Option<String>, Infallible> {
            Ok(self.map_name(name))
        };
        class.rewrite_types(&mut map).map_err(|e| match e {
            RewriteError::Class(c) => c,
            RewriteError::Map(i) => match i {},
        })
    }
}
