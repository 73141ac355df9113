//! Constant pool codec.
//!
//! The pool is parsed into tagged entries and encoded back verbatim, so an
//! untouched class round-trips byte-identically. All rewrites elsewhere in
//! the engine are append-and-repoint: a new `Utf8` (or `NameAndType`) entry
//! is appended and the referring entry's index is updated, never mutating a
//! string in place. Indices embedded in opaque attribute payloads and
//! bytecode therefore stay valid without ever being looked at.

use super::{ClassError, Reader};

/// One constant pool entry.
///
/// `Utf8` keeps raw (modified UTF-8) bytes so string constants with exotic
/// encodings survive the round trip; entries the engine actually reads are
/// decoded on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    /// Raw modified-UTF-8 bytes.
    Utf8(Vec<u8>),
    /// 32-bit integer constant.
    Integer(i32),
    /// Float constant, raw bits (NaN payloads preserved).
    Float(u32),
    /// 64-bit integer constant; occupies two pool slots.
    Long(i64),
    /// Double constant, raw bits; occupies two pool slots.
    Double(u64),
    /// Class reference; `name` indexes a `Utf8`.
    Class {
        /// Index of the class name.
        name: u16,
    },
    /// String constant; `utf8` indexes a `Utf8`.
    Str {
        /// Index of the string payload.
        utf8: u16,
    },
    /// Field reference.
    Fieldref {
        /// Index of the owner `Class`.
        class: u16,
        /// Index of the `NameAndType`.
        name_and_type: u16,
    },
    /// Method reference.
    Methodref {
        /// Index of the owner `Class`.
        class: u16,
        /// Index of the `NameAndType`.
        name_and_type: u16,
    },
    /// Interface method reference.
    InterfaceMethodref {
        /// Index of the owner `Class`.
        class: u16,
        /// Index of the `NameAndType`.
        name_and_type: u16,
    },
    /// Name-and-descriptor pair.
    NameAndType {
        /// Index of the member name.
        name: u16,
        /// Index of the descriptor.
        descriptor: u16,
    },
    /// Method handle.
    MethodHandle {
        /// Reference kind (1-9).
        kind: u8,
        /// Index of the referenced member.
        reference: u16,
    },
    /// Method type; `descriptor` indexes a `Utf8`.
    MethodType {
        /// Index of the method descriptor.
        descriptor: u16,
    },
    /// Dynamically-computed constant.
    Dynamic {
        /// Bootstrap method attribute index.
        bootstrap: u16,
        /// Index of the `NameAndType`.
        name_and_type: u16,
    },
    /// Dynamically-computed call site.
    InvokeDynamic {
        /// Bootstrap method attribute index.
        bootstrap: u16,
        /// Index of the `NameAndType`.
        name_and_type: u16,
    },
    /// Module declaration name.
    Module {
        /// Index of the module name.
        name: u16,
    },
    /// Package declaration name.
    Package {
        /// Index of the package name.
        name: u16,
    },
}

impl Const {
    fn wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

/// A parsed constant pool, 1-indexed like the class file itself.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    // Slot 0 and the slot after each Long/Double are None.
    entries: Vec<Option<Const>>,
}

impl ConstantPool {
    /// An empty pool (slot 0 reserved).
    pub fn new() -> Self {
        Self {
            entries: vec![None],
        }
    }

    /// Parse `count - 1` entries from `r`.
    pub(super) fn parse(r: &mut Reader<'_>) -> Result<Self, ClassError> {
        let count = r.u16()?;
        let mut entries: Vec<Option<Const>> = Vec::with_capacity(count as usize);
        entries.push(None);
        while entries.len() < count as usize {
            let tag = r.u8()?;
            let entry = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    Const::Utf8(r.bytes(len)?.to_vec())
                }
                3 => Const::Integer(r.u32()? as i32),
                4 => Const::Float(r.u32()?),
                5 => Const::Long(r.u64()? as i64),
                6 => Const::Double(r.u64()?),
                7 => Const::Class { name: r.u16()? },
                8 => Const::Str { utf8: r.u16()? },
                9 => Const::Fieldref {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                10 => Const::Methodref {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                11 => Const::InterfaceMethodref {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                12 => Const::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                15 => Const::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                16 => Const::MethodType {
                    descriptor: r.u16()?,
                },
                17 => Const::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                18 => Const::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                19 => Const::Module { name: r.u16()? },
                20 => Const::Package { name: r.u16()? },
                other => return Err(ClassError::UnknownTag(other)),
            };
            let wide = entry.wide();
            entries.push(Some(entry));
            if wide {
                entries.push(None);
            }
        }
        if entries.len() != count as usize {
            // A Long/Double in the final slot overran the declared count.
            return Err(ClassError::Truncated);
        }
        Ok(Self { entries })
    }

    /// Encode all entries.
    pub(super) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in self.entries.iter().flatten() {
            match entry {
                Const::Utf8(bytes) => {
                    out.push(1);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                Const::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Const::Float(bits) => {
                    out.push(4);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Const::Double(bits) => {
                    out.push(6);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Class { name } => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Const::Str { utf8 } => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                Const::Fieldref {
                    class,
                    name_and_type,
                } => {
                    out.push(9);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Const::Methodref {
                    class,
                    name_and_type,
                } => {
                    out.push(10);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Const::InterfaceMethodref {
                    class,
                    name_and_type,
                } => {
                    out.push(11);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Const::NameAndType { name, descriptor } => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Const::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    out.extend_from_slice(&reference.to_be_bytes());
                }
                Const::MethodType { descriptor } => {
                    out.push(16);
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Const::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(17);
                    out.extend_from_slice(&bootstrap.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Const::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(18);
                    out.extend_from_slice(&bootstrap.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Const::Module { name } => {
                    out.push(19);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Const::Package { name } => {
                    out.push(20);
                    out.extend_from_slice(&name.to_be_bytes());
                }
            }
        }
    }

    /// Number of slots, including reserved ones (the class-file
    /// `constant_pool_count`).
    pub fn slot_count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// All live entries with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Const)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|c| (i as u16, c)))
    }

    /// Entry at `idx`.
    ///
    /// # Errors
    ///
    /// [`ClassError::BadIndex`] for slot 0, out-of-range, or reserved slots.
    pub fn get(&self, idx: u16) -> Result<&Const, ClassError> {
        self.entries
            .get(idx as usize)
            .and_then(Option::as_ref)
            .ok_or(ClassError::BadIndex(idx))
    }

    /// Mutable entry at `idx`, for repointing.
    ///
    /// # Errors
    ///
    /// [`ClassError::BadIndex`] as for [`Self::get`].
    pub fn get_mut(&mut self, idx: u16) -> Result<&mut Const, ClassError> {
        self.entries
            .get_mut(idx as usize)
            .and_then(Option::as_mut)
            .ok_or(ClassError::BadIndex(idx))
    }

    /// Decode the `Utf8` entry at `idx`.
    ///
    /// # Errors
    ///
    /// [`ClassError::BadIndex`] if `idx` is not a `Utf8` entry,
    /// [`ClassError::NotUtf8`] if its bytes do not decode (modified UTF-8
    /// oddities only ever appear in string constants, which are never read).
    pub fn utf8(&self, idx: u16) -> Result<&str, ClassError> {
        match self.get(idx)? {
            Const::Utf8(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| ClassError::NotUtf8(idx))
            }
            _ => Err(ClassError::BadIndex(idx)),
        }
    }

    /// Decode the name of the `Class` entry at `idx`.
    ///
    /// # Errors
    ///
    /// [`ClassError::BadIndex`] if `idx` is not a `Class` entry.
    pub fn class_name(&self, idx: u16) -> Result<&str, ClassError> {
        match self.get(idx)? {
            Const::Class { name } => self.utf8(*name),
            _ => Err(ClassError::BadIndex(idx)),
        }
    }

    /// Append an entry and return its index.
    ///
    /// # Errors
    ///
    /// [`ClassError::PoolOverflow`] when the pool is out of indices.
    pub fn push(&mut self, entry: Const) -> Result<u16, ClassError> {
        let extra = if entry.wide() { 2 } else { 1 };
        if self.entries.len() + extra > usize::from(u16::MAX) {
            return Err(ClassError::PoolOverflow);
        }
        let idx = self.entries.len() as u16;
        let wide = entry.wide();
        self.entries.push(Some(entry));
        if wide {
            self.entries.push(None);
        }
        Ok(idx)
    }

    /// Append a `Utf8` entry for `s` and return its index.
    ///
    /// # Errors
    ///
    /// [`ClassError::PoolOverflow`] when the pool is out of indices.
    pub fn push_utf8(&mut self, s: &str) -> Result<u16, ClassError> {
        self.push(Const::Utf8(s.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back() {
        let mut pool = ConstantPool::new();
        let name = pool.push_utf8("pkg/Foo").unwrap();
        let class = pool.push(Const::Class { name }).unwrap();
        assert_eq!(pool.utf8(name).unwrap(), "pkg/Foo");
        assert_eq!(pool.class_name(class).unwrap(), "pkg/Foo");
        assert_eq!(pool.slot_count(), 3);
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.push(Const::Long(7)).unwrap();
        let next = pool.push_utf8("after").unwrap();
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert!(pool.get(2).is_err());
    }

    #[test]
    fn slot_zero_is_reserved() {
        let pool = ConstantPool::new();
        assert!(pool.get(0).is_err());
    }
}
