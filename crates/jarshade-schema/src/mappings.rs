//! Remap tables: public-namespace symbols to host-obfuscated symbols.
//!
//! Loaded from a line-oriented, srg-flavored text format with field
//! descriptors:
//!
//! ```text
//! CL: com/example/host/Level host/a
//! FD: com/example/host/Level/tickCount I host/a/b
//! MD: com/example/host/Level/tick ()V host/a/c
//! ```
//!
//! `#` comments and blank lines are ignored. Member keys are in the public
//! namespace; the mapped side names the host owner and new member name, and
//! the host owner must agree with the class map.

use crate::name::ClassName;
use std::collections::HashMap;
use thiserror::Error;

/// A member reference key in the public namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Declaring class, internal form.
    pub owner: ClassName,
    /// Member simple name.
    pub name: String,
    /// Field or method descriptor as it appears in class files at remap time.
    pub descriptor: String,
}

impl MemberKey {
    /// Construct a key.
    pub fn new(
        owner: impl Into<ClassName>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} {}", self.owner, self.name, self.descriptor)
    }
}

/// Error from parsing a mappings file.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct MappingParseError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with it.
    pub message: String,
}

impl MappingParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// The full mapping from a public namespace to a host-obfuscated namespace.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    classes: HashMap<ClassName, ClassName>,
    fields: HashMap<MemberKey, String>,
    methods: HashMap<MemberKey, String>,
}

impl RemapTable {
    /// Parse the srg-flavored text format.
    ///
    /// Two passes: class lines first, so member lines can be checked against
    /// the class map regardless of their position in the file.
    ///
    /// # Errors
    ///
    /// [`MappingParseError`] on any malformed line, duplicate entry with a
    /// conflicting target, or a member target owner that disagrees with the
    /// class map.
    pub fn parse(text: &str) -> Result<Self, MappingParseError> {
        let mut table = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("CL:") {
                table.parse_class(line_no, rest)?;
            }
        }

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("CL:") {
                continue;
            }
            if let Some(rest) = line.strip_prefix("FD:") {
                table.parse_member(line_no, rest, true)?;
            } else if let Some(rest) = line.strip_prefix("MD:") {
                table.parse_member(line_no, rest, false)?;
            } else {
                return Err(MappingParseError::new(
                    line_no,
                    format!("unrecognized record `{line}`"),
                ));
            }
        }

        Ok(table)
    }

    fn parse_class(&mut self, line_no: usize, rest: &str) -> Result<(), MappingParseError> {
        let mut parts = rest.split_whitespace();
        let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(MappingParseError::new(
                line_no,
                "CL record wants exactly `CL: <public> <host>`",
            ));
        };
        let from = ClassName::new(from);
        let to = ClassName::new(to);
        if let Some(prev) = self.classes.get(&from) {
            if *prev != to {
                return Err(MappingParseError::new(
                    line_no,
                    format!("class `{from}` already mapped to `{prev}`"),
                ));
            }
        }
        self.classes.insert(from, to);
        Ok(())
    }

    fn parse_member(
        &mut self,
        line_no: usize,
        rest: &str,
        is_field: bool,
    ) -> Result<(), MappingParseError> {
        let kind = if is_field { "FD" } else { "MD" };
        let mut parts = rest.split_whitespace();
        let (Some(from), Some(desc), Some(to), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(MappingParseError::new(
                line_no,
                format!("{kind} record wants `{kind}: <public owner/name> <descriptor> <host owner/name>`"),
            ));
        };
        let Some((owner, name)) = from.rsplit_once('/') else {
            return Err(MappingParseError::new(
                line_no,
                format!("`{from}` has no owner/name separator"),
            ));
        };
        let Some((to_owner, to_name)) = to.rsplit_once('/') else {
            return Err(MappingParseError::new(
                line_no,
                format!("`{to}` has no owner/name separator"),
            ));
        };

        let owner = ClassName::new(owner);
        match self.classes.get(&owner) {
            Some(mapped) if mapped.as_str() != to_owner => {
                return Err(MappingParseError::new(
                    line_no,
                    format!(
                        "member target owner `{to_owner}` disagrees with class map (`{owner}` -> `{mapped}`)"
                    ),
                ));
            }
            None => {
                return Err(MappingParseError::new(
                    line_no,
                    format!("member of unmapped class `{owner}`"),
                ));
            }
            Some(_) => {}
        }

        let key = MemberKey {
            owner,
            name: name.to_string(),
            descriptor: desc.to_string(),
        };
        let map = if is_field {
            &mut self.fields
        } else {
            &mut self.methods
        };
        if let Some(prev) = map.get(&key) {
            if prev != to_name {
                return Err(MappingParseError::new(
                    line_no,
                    format!("member `{key}` already mapped to `{prev}`"),
                ));
            }
        }
        map.insert(key, to_name.to_string());
        Ok(())
    }

    /// Host name for a public class name, if mapped.
    pub fn class(&self, name: &ClassName) -> Option<&ClassName> {
        self.classes.get(name)
    }

    /// Host simple name for a public field reference, if mapped.
    pub fn field(&self, key: &MemberKey) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Host simple name for a public method reference, if mapped.
    pub fn method(&self, key: &MemberKey) -> Option<&str> {
        self.methods.get(key).map(String::as_str)
    }

    /// Number of class mappings.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of member mappings (fields plus methods).
    pub fn member_count(&self) -> usize {
        self.fields.len() + self.methods.len()
    }

    /// True when the table carries no mappings at all.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }
}
