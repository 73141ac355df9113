//! JVM class file codec and type-occurrence rewriting.
//!
//! A [`ClassFile`] is the parsed form of one binary unit: constant pool,
//! access flags, declared/super/interface types, field and method
//! declarations, and attributes. Attribute payloads stay opaque except for
//! `Signature`, whose two-byte pool index must be repointed when generic
//! signatures are rewritten. Bytecode is never decoded: every reference it
//! makes goes through the constant pool, and the pool is where all rewriting
//! happens.

pub mod pool;

pub use pool::{Const, ConstantPool};

use jarshade_schema::CLASS_MAGIC;
use jarshade_schema::descriptor;
use jarshade_schema::signature::{self, SignatureError};
use thiserror::Error;

/// Class file parse or rewrite failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    /// Missing `0xCAFEBABE`.
    #[error("not a class file (bad magic)")]
    BadMagic,
    /// Ran out of bytes mid-structure.
    #[error("truncated class file")]
    Truncated,
    /// Unrecognized constant pool tag.
    #[error("unknown constant pool tag {0}")]
    UnknownTag(u8),
    /// Pool index out of range or pointing at the wrong entry kind.
    #[error("invalid constant pool index {0}")]
    BadIndex(u16),
    /// A pool string the engine needed did not decode.
    #[error("constant pool entry {0} is not valid UTF-8")]
    NotUtf8(u16),
    /// No indices left for appended entries.
    #[error("constant pool exhausted")]
    PoolOverflow,
    /// A `Signature` attribute did not follow the signature grammar.
    #[error("malformed signature at byte {0}")]
    Signature(usize),
    /// Bytes left over after the class structure ended.
    #[error("trailing bytes after class structure")]
    TrailingBytes,
}

/// Error from [`ClassFile::rewrite_types`]: structural, or the mapper's own.
#[derive(Debug)]
pub enum RewriteError<E> {
    /// The class structure gave out mid-rewrite.
    Class(ClassError),
    /// The name mapper aborted.
    Map(E),
}

impl<E> From<ClassError> for RewriteError<E> {
    fn from(e: ClassError) -> Self {
        Self::Class(e)
    }
}

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassError> {
        let b = *self.data.get(self.pos).ok_or(ClassError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ClassError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ClassError> {
        let slice = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassError> {
        let end = self.pos.checked_add(len).ok_or(ClassError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(ClassError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// An attribute with opaque payload.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Pool index of the attribute name.
    pub name: u16,
    /// Raw payload; addresses the pool by index where it does at all.
    pub info: Vec<u8>,
}

/// A field or method declaration.
#[derive(Debug, Clone)]
pub struct Member {
    /// Access flags.
    pub access_flags: u16,
    /// Pool index of the member name.
    pub name: u16,
    /// Pool index of the member descriptor.
    pub descriptor: u16,
    /// Member attributes.
    pub attributes: Vec<Attribute>,
}

/// Which pool entry kind a member reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRefKind {
    /// `Fieldref`.
    Field,
    /// `Methodref`.
    Method,
    /// `InterfaceMethodref`.
    InterfaceMethod,
}

/// One owner-qualified member reference out of the constant pool.
#[derive(Debug, Clone)]
pub struct MemberRef {
    /// Pool index of the referencing entry.
    pub index: u16,
    /// Field or method reference.
    pub kind: MemberRefKind,
    /// Owner class, internal form (may be an array descriptor).
    pub owner: String,
    /// Member simple name.
    pub name: String,
    /// Member descriptor.
    pub descriptor: String,
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version.
    pub minor: u16,
    /// Major version.
    pub major: u16,
    /// Constant pool.
    pub pool: ConstantPool,
    /// Class access flags.
    pub access_flags: u16,
    /// Pool index of this class's `Class` entry.
    pub this_class: u16,
    /// Pool index of the superclass `Class` entry; 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Pool indices of implemented interfaces.
    pub interfaces: Vec<u16>,
    /// Field declarations.
    pub fields: Vec<Member>,
    /// Method declarations.
    pub methods: Vec<Member>,
    /// Class-level attributes.
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parse a class file.
    ///
    /// # Errors
    ///
    /// [`ClassError`] describing the first structural problem encountered.
    pub fn parse(data: &[u8]) -> Result<Self, ClassError> {
        let mut r = Reader::new(data);
        if r.bytes(4)? != CLASS_MAGIC {
            return Err(ClassError::BadMagic);
        }
        let minor = r.u16()?;
        let major = r.u16()?;
        let pool = ConstantPool::parse(&mut r)?;
        let access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(r.u16()?);
        }

        let fields = Self::parse_members(&mut r)?;
        let methods = Self::parse_members(&mut r)?;
        let attributes = Self::parse_attributes(&mut r)?;

        if !r.is_empty() {
            return Err(ClassError::TrailingBytes);
        }

        Ok(Self {
            minor,
            major,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_members(r: &mut Reader<'_>) -> Result<Vec<Member>, ClassError> {
        let count = r.u16()?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            members.push(Member {
                access_flags: r.u16()?,
                name: r.u16()?,
                descriptor: r.u16()?,
                attributes: Self::parse_attributes(r)?,
            });
        }
        Ok(members)
    }

    fn parse_attributes(r: &mut Reader<'_>) -> Result<Vec<Attribute>, ClassError> {
        let count = r.u16()?;
        let mut attrs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.u16()?;
            let len = r.u32()? as usize;
            attrs.push(Attribute {
                name,
                info: r.bytes(len)?.to_vec(),
            });
        }
        Ok(attrs)
    }

    /// Encode back to bytes. Byte-identical to the input for an untouched
    /// class.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(&CLASS_MAGIC);
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        self.pool.encode(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for idx in &self.interfaces {
            out.extend_from_slice(&idx.to_be_bytes());
        }
        Self::encode_members(&self.fields, &mut out);
        Self::encode_members(&self.methods, &mut out);
        Self::encode_attributes(&self.attributes, &mut out);
        out
    }

    fn encode_members(members: &[Member], out: &mut Vec<u8>) {
        out.extend_from_slice(&(members.len() as u16).to_be_bytes());
        for m in members {
            out.extend_from_slice(&m.access_flags.to_be_bytes());
            out.extend_from_slice(&m.name.to_be_bytes());
            out.extend_from_slice(&m.descriptor.to_be_bytes());
            Self::encode_attributes(&m.attributes, out);
        }
    }

    fn encode_attributes(attrs: &[Attribute], out: &mut Vec<u8>) {
        out.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        for a in attrs {
            out.extend_from_slice(&a.name.to_be_bytes());
            out.extend_from_slice(&(a.info.len() as u32).to_be_bytes());
            out.extend_from_slice(&a.info);
        }
    }

    /// The declared class name, internal form.
    ///
    /// # Errors
    ///
    /// [`ClassError::BadIndex`] when `this_class` does not resolve.
    pub fn declared_name(&self) -> Result<&str, ClassError> {
        self.pool.class_name(self.this_class)
    }

    /// Every class name this unit references: `Class` entries, descriptor
    /// types (declarations, `NameAndType`, `MethodType`), and generic
    /// signature types.
    ///
    /// # Errors
    ///
    /// [`ClassError`] if a referenced pool string does not resolve.
    pub fn referenced_classes(&self, sink: &mut impl FnMut(&str)) -> Result<(), ClassError> {
        for (_, entry) in self.pool.iter() {
            match entry {
                Const::Class { name } => {
                    let s = self.pool.utf8(*name)?;
                    if s.starts_with('[') {
                        descriptor::referenced_classes(s, sink);
                    } else {
                        sink(s);
                    }
                }
                Const::NameAndType { descriptor, .. } | Const::MethodType { descriptor } => {
                    descriptor::referenced_classes(self.pool.utf8(*descriptor)?, sink);
                }
                _ => {}
            }
        }
        for member in self.fields.iter().chain(&self.methods) {
            descriptor::referenced_classes(self.pool.utf8(member.descriptor)?, sink);
        }
        self.visit_signatures(&mut |sig| {
            // Collecting only; a signature that fails to parse contributes
            // nothing here and is caught by the rewrite path if it matters.
            let mut collect = |name: &str| -> Result<Option<String>, ClassError> {
                sink(name);
                Ok(None)
            };
            let _ = signature::rewrite_signature(sig, &mut collect);
        })?;
        Ok(())
    }

    fn visit_signatures(&self, visit: &mut impl FnMut(&str)) -> Result<(), ClassError> {
        let attrs = self
            .attributes
            .iter()
            .chain(self.fields.iter().flat_map(|m| &m.attributes))
            .chain(self.methods.iter().flat_map(|m| &m.attributes));
        for attr in attrs {
            if self.pool.utf8(attr.name)? == "Signature" && attr.info.len() == 2 {
                let idx = u16::from_be_bytes([attr.info[0], attr.info[1]]);
                visit(self.pool.utf8(idx)?);
            }
        }
        Ok(())
    }

    /// All owner-qualified member references in the pool.
    ///
    /// # Errors
    ///
    /// [`ClassError`] if a reference's pool chain does not resolve.
    pub fn member_refs(&self) -> Result<Vec<MemberRef>, ClassError> {
        let mut refs = Vec::new();
        for (index, entry) in self.pool.iter() {
            let (kind, class, nat) = match *entry {
                Const::Fieldref {
                    class,
                    name_and_type,
                } => (MemberRefKind::Field, class, name_and_type),
                Const::Methodref {
                    class,
                    name_and_type,
                } => (MemberRefKind::Method, class, name_and_type),
                Const::InterfaceMethodref {
                    class,
                    name_and_type,
                } => (MemberRefKind::InterfaceMethod, class, name_and_type),
                _ => continue,
            };
            let owner = self.pool.class_name(class)?.to_string();
            let Const::NameAndType { name, descriptor } = *self.pool.get(nat)? else {
                return Err(ClassError::BadIndex(nat));
            };
            refs.push(MemberRef {
                index,
                kind,
                owner,
                name: self.pool.utf8(name)?.to_string(),
                descriptor: self.pool.utf8(descriptor)?.to_string(),
            });
        }
        Ok(refs)
    }

    /// Rewrite every type-name occurrence through `map`.
    ///
    /// Covers `Class` entry names (including array element types), all
    /// descriptors (`NameAndType`, `MethodType`, field/method declarations),
    /// and `Signature` attribute strings. Member names are never touched
    /// here; the symbol remapper layers those on separately. All changes are
    /// append-and-repoint, so shared pool strings and opaque attribute
    /// payloads stay intact.
    ///
    /// # Errors
    ///
    /// [`RewriteError::Class`] on structural failure (including malformed
    /// signatures), [`RewriteError::Map`] when `map` aborts.
    pub fn rewrite_types<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), RewriteError<E>> {
        // Class entries.
        let class_indices: Vec<u16> = self
            .pool
            .iter()
            .filter_map(|(i, e)| matches!(e, Const::Class { .. }).then_some(i))
            .collect();
        for idx in class_indices {
            let Const::Class { name } = *self.pool.get(idx)? else {
                continue;
            };
            let current = self.pool.utf8(name)?.to_string();
            let replacement = if current.starts_with('[') {
                descriptor::rewrite_descriptor(&current, map).map_err(RewriteError::Map)?
            } else {
                map(&current).map_err(RewriteError::Map)?
            };
            if let Some(new) = replacement {
                let new_utf8 = self.pool.push_utf8(&new)?;
                *self.pool.get_mut(idx)? = Const::Class { name: new_utf8 };
            }
        }

        // NameAndType and MethodType descriptors.
        let desc_entries: Vec<u16> = self
            .pool
            .iter()
            .filter_map(|(i, e)| {
                matches!(e, Const::NameAndType { .. } | Const::MethodType { .. }).then_some(i)
            })
            .collect();
        for idx in desc_entries {
            let desc_idx = match *self.pool.get(idx)? {
                Const::NameAndType { descriptor, .. } | Const::MethodType { descriptor } => {
                    descriptor
                }
                _ => continue,
            };
            let current = self.pool.utf8(desc_idx)?.to_string();
            if let Some(new) =
                descriptor::rewrite_descriptor(&current, map).map_err(RewriteError::Map)?
            {
                let new_utf8 = self.pool.push_utf8(&new)?;
                match self.pool.get_mut(idx)? {
                    Const::NameAndType { descriptor, .. }
                    | Const::MethodType { descriptor } => *descriptor = new_utf8,
                    _ => {}
                }
            }
        }

        // Declaration descriptors.
        for i in 0..self.fields.len() {
            let desc_idx = self.fields[i].descriptor;
            let current = self.pool.utf8(desc_idx)?.to_string();
            if let Some(new) =
                descriptor::rewrite_descriptor(&current, map).map_err(RewriteError::Map)?
            {
                self.fields[i].descriptor = self.pool.push_utf8(&new)?;
            }
        }
        for i in 0..self.methods.len() {
            let desc_idx = self.methods[i].descriptor;
            let current = self.pool.utf8(desc_idx)?.to_string();
            if let Some(new) =
                descriptor::rewrite_descriptor(&current, map).map_err(RewriteError::Map)?
            {
                self.methods[i].descriptor = self.pool.push_utf8(&new)?;
            }
        }

        // Signature attributes.
        self.rewrite_signatures(map)?;

        Ok(())
    }

    fn rewrite_signatures<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), RewriteError<E>> {
        // (member list tag, member index, attribute index); class-level uses
        // tag 0 with member index unused.
        let mut sites: Vec<(u8, usize, usize)> = Vec::new();
        for (ai, attr) in self.attributes.iter().enumerate() {
            if self.pool.utf8(attr.name)? == "Signature" && attr.info.len() == 2 {
                sites.push((0, 0, ai));
            }
        }
        for (mi, member) in self.fields.iter().enumerate() {
            for (ai, attr) in member.attributes.iter().enumerate() {
                if self.pool.utf8(attr.name)? == "Signature" && attr.info.len() == 2 {
                    sites.push((1, mi, ai));
                }
            }
        }
        for (mi, member) in self.methods.iter().enumerate() {
            for (ai, attr) in member.attributes.iter().enumerate() {
                if self.pool.utf8(attr.name)? == "Signature" && attr.info.len() == 2 {
                    sites.push((2, mi, ai));
                }
            }
        }

        for (tag, mi, ai) in sites {
            let info = match tag {
                0 => &self.attributes[ai].info,
                1 => &self.fields[mi].attributes[ai].info,
                _ => &self.methods[mi].attributes[ai].info,
            };
            let sig_idx = u16::from_be_bytes([info[0], info[1]]);
            let current = self.pool.utf8(sig_idx)?.to_string();
            let rewritten = signature::rewrite_signature(&current, map).map_err(|e| match e {
                SignatureError::Malformed { pos } => {
                    RewriteError::Class(ClassError::Signature(pos))
                }
                SignatureError::Map(e) => RewriteError::Map(e),
            })?;
            if let Some(new) = rewritten {
                let new_utf8 = self.pool.push_utf8(&new)?;
                let info = match tag {
                    0 => &mut self.attributes[ai].info,
                    1 => &mut self.fields[mi].attributes[ai].info,
                    _ => &mut self.methods[mi].attributes[ai].info,
                };
                info.copy_from_slice(&new_utf8.to_be_bytes());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    /// Build a minimal but structurally complete class for codec tests.
    fn sample_class() -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_name = pool.push_utf8("org/lz4/Widget").unwrap();
        let this_class = pool.push(Const::Class { name: this_name }).unwrap();
        let super_name = pool.push_utf8("java/lang/Object").unwrap();
        let super_class = pool.push(Const::Class { name: super_name }).unwrap();

        let field_name = pool.push_utf8("buffer").unwrap();
        let field_desc = pool.push_utf8("[Lorg/lz4/Chunk;").unwrap();

        let callee_name = pool.push_utf8("org/lz4/Chunk").unwrap();
        let callee = pool.push(Const::Class { name: callee_name }).unwrap();
        let m_name = pool.push_utf8("size").unwrap();
        let m_desc = pool.push_utf8("()I").unwrap();
        let nat = pool
            .push(Const::NameAndType {
                name: m_name,
                descriptor: m_desc,
            })
            .unwrap();
        pool.push(Const::Methodref {
            class: callee,
            name_and_type: nat,
        })
        .unwrap();

        let sig_attr_name = pool.push_utf8("Signature").unwrap();
        let sig_str = pool
            .push_utf8("Ljava/util/List<Lorg/lz4/Chunk;>;")
            .unwrap();

        ClassFile {
            minor: 0,
            major: 61,
            pool,
            access_flags: 0x0021,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![Member {
                access_flags: 0x0002,
                name: field_name,
                descriptor: field_desc,
                attributes: vec![Attribute {
                    name: sig_attr_name,
                    info: sig_str.to_be_bytes().to_vec(),
                }],
            }],
            methods: vec![],
            attributes: vec![],
        }
    }

    fn shade(name: &str) -> Result<Option<String>, Infallible> {
        Ok(name
            .strip_prefix("org/lz4/")
            .map(|rest| format!("shaded/lz4/{rest}")))
    }

    #[test]
    fn round_trips_untouched_class() {
        let bytes = sample_class().encode();
        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed.encode(), bytes);
        assert_eq!(parsed.declared_name().unwrap(), "org/lz4/Widget");
    }

    #[test]
    fn rejects_bad_magic() {
        assert_eq!(
            ClassFile::parse(&[0u8; 16]).unwrap_err(),
            ClassError::BadMagic
        );
    }

    #[test]
    fn rejects_truncation() {
        let bytes = sample_class().encode();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 3]).unwrap_err(),
            ClassError::Truncated | ClassError::BadIndex(_)
        ));
    }

    #[test]
    fn collects_referenced_classes() {
        let class = sample_class();
        let mut seen = Vec::new();
        class
            .referenced_classes(&mut |n| seen.push(n.to_string()))
            .unwrap();
        for expected in [
            "org/lz4/Widget",
            "java/lang/Object",
            "org/lz4/Chunk",
            "java/util/List",
        ] {
            assert!(seen.iter().any(|s| s == expected), "missing {expected}");
        }
    }

    #[test]
    fn rewrite_types_touches_every_site() {
        let mut class = sample_class();
        class.rewrite_types(&mut shade).unwrap();
        let bytes = class.encode();
        let reparsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(reparsed.declared_name().unwrap(), "shaded/lz4/Widget");

        let field_desc = reparsed.pool.utf8(reparsed.fields[0].descriptor).unwrap();
        assert_eq!(field_desc, "[Lshaded/lz4/Chunk;");

        let refs = reparsed.member_refs().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].owner, "shaded/lz4/Chunk");
        assert_eq!(refs[0].name, "size");

        let mut sigs = Vec::new();
        reparsed
            .visit_signatures(&mut |s| sigs.push(s.to_string()))
            .unwrap();
        assert_eq!(sigs, vec!["Ljava/util/List<Lshaded/lz4/Chunk;>;"]);
    }

    #[test]
    fn rewrite_is_append_and_repoint() {
        let mut class = sample_class();
        let slots_before = class.pool.slot_count();
        class.rewrite_types(&mut shade).unwrap();
        // Original strings are still in the pool; only indices moved.
        assert!(class.pool.slot_count() > slots_before);
        let mut found_original = false;
        for (_, entry) in class.pool.iter() {
            if let Const::Utf8(bytes) = entry {
                if bytes.as_slice() == b"org/lz4/Widget" {
                    found_original = true;
                }
            }
        }
        assert!(found_original);
    }
}
