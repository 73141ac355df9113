//! Symbol remapping to a host-obfuscated namespace.
//!
//! For target families whose host runtime ships obfuscated internals, every
//! class and member reference inside the remap domain is rewritten from the
//! public mapping namespace to the host's names. The domain is "not
//! excluded": configuration exclusions keep bundled code and bundled
//! libraries under their own names, and the JDK namespaces are excluded
//! implicitly. A miss inside the domain fails the build with
//! `UnmappedSymbol` rather than emitting a unit that breaks at load time.
//!
//! Ordering relative to relocation is a per-target setting; the table's
//! member keys are looked up against descriptors exactly as they appear in
//! the class at remap time.

use crate::class::{ClassFile, Const, MemberRef, MemberRefKind, RewriteError};
use crate::error::{BuildError, RefKind};
use jarshade_schema::mappings::{MemberKey, RemapTable};
use jarshade_schema::name::{ClassName, NamePattern};

/// JDK namespaces, never remapped.
const JDK_PREFIXES: [&str; 4] = ["java", "javax", "jdk", "sun"];

/// A remap table plus its exclusion set, shareable across worker threads.
pub struct Remapper<'a> {
    table: &'a RemapTable,
    exclude: &'a [NamePattern],
}

impl std::fmt::Debug for Remapper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remapper")
            .field("classes", &self.table.class_count())
            .field("members", &self.table.member_count())
            .finish()
    }
}

impl<'a> Remapper<'a> {
    /// Pair a parsed table with the target's exclusion patterns.
    pub fn new(table: &'a RemapTable, exclude: &'a [NamePattern]) -> Self {
        Self { table, exclude }
    }

    /// Whether `name` (internal form) must resolve through the table.
    fn in_domain(&self, name: &str) -> bool {
        if name.starts_with('[') {
            return false;
        }
        let class = ClassName::new(name);
        if JDK_PREFIXES.iter().any(|p| class.has_prefix(p)) {
            return false;
        }
        !NamePattern::any_match(self.exclude, &class)
    }

    fn map_class(&self, unit: &str, name: &str) -> Result<Option<String>, BuildError> {
        if !self.in_domain(name) {
            return Ok(None);
        }
        match self.table.class(&ClassName::new(name)) {
            Some(mapped) => Ok(Some(mapped.as_str().to_string())),
            None => Err(BuildError::UnmappedSymbol {
                unit: unit.to_string(),
                kind: RefKind::Class,
                owner: name.to_string(),
                name: String::new(),
                descriptor: String::new(),
            }),
        }
    }

    fn member_name(&self, unit: &str, r: &MemberRef) -> Result<Option<&'a str>, BuildError> {
        let key = MemberKey::new(r.owner.as_str(), r.name.as_str(), r.descriptor.as_str());
        let (kind, hit) = match r.kind {
            MemberRefKind::Field => (RefKind::Field, self.table.field(&key)),
            MemberRefKind::Method | MemberRefKind::InterfaceMethod => {
                (RefKind::Method, self.table.method(&key))
            }
        };
        match hit {
            Some(new) => Ok(Some(new)),
            None => Err(BuildError::UnmappedSymbol {
                unit: unit.to_string(),
                kind,
                owner: r.owner.clone(),
                name: r.name.clone(),
                descriptor: r.descriptor.clone(),
            }),
        }
    }

    /// Rewrite `class` into the host namespace.
    ///
    /// Member references with an in-domain owner are renamed through the
    /// member maps; member declarations are renamed only when the declaring
    /// class itself is mapped, and unmapped declarations in a mapped class
    /// keep their names. `InvokeDynamic` member names stay untouched
    /// (bootstrap-driven naming), though their descriptors are still
    /// type-remapped. Finally every type occurrence goes through the class
    /// map.
    ///
    /// # Errors
    ///
    /// [`BuildError::UnmappedSymbol`] on any in-domain miss;
    /// [`BuildError::MalformedBinaryUnit`]-grade structural failures are
    /// reported as [`crate::class::ClassError`] via the `Err` path of the
    /// caller (`archive`/`entry` context is attached there).
    pub fn remap(&self, class: &mut ClassFile, unit: &str) -> Result<(), RewriteError<BuildError>> {
        let declared = class.declared_name()?.to_string();

        // Member references first, while owner names are still public.
        for r in class.member_refs()? {
            let renamed = if self.in_domain(&r.owner) {
                self.member_name(unit, &r).map_err(RewriteError::Map)?
            } else {
                None
            };
            if let Some(new_name) = renamed {
                if new_name != r.name {
                    let &Const::NameAndType { descriptor, .. } = nat_of(class, r.index)? else {
                        return Err(crate::class::ClassError::BadIndex(r.index).into());
                    };
                    let name_utf8 = class.pool.push_utf8(new_name)?;
                    let fresh = class.pool.push(Const::NameAndType {
                        name: name_utf8,
                        descriptor,
                    })?;
                    repoint_nat(class, r.index, fresh)?;
                }
            }
        }

        // Declarations: renamed only when this class itself is mapped.
        if self.in_domain(&declared) && self.table.class(&ClassName::new(&declared)).is_some() {
            for i in 0..class.fields.len() {
                let name = class.pool.utf8(class.fields[i].name)?.to_string();
                let desc = class.pool.utf8(class.fields[i].descriptor)?.to_string();
                let key = MemberKey::new(declared.as_str(), name, desc);
                if let Some(new) = self.table.field(&key) {
                    class.fields[i].name = class.pool.push_utf8(new)?;
                }
            }
            for i in 0..class.methods.len() {
                let name = class.pool.utf8(class.methods[i].name)?.to_string();
                let desc = class.pool.utf8(class.methods[i].descriptor)?.to_string();
                let key = MemberKey::new(declared.as_str(), name, desc);
                if let Some(new) = self.table.method(&key) {
                    class.methods[i].name = class.pool.push_utf8(new)?;
                }
            }
        }

        // Types everywhere: class entries, descriptors, signatures.
        let mut map =
            |name: &str| -> Result<Option<String>, BuildError> { self.map_class(unit, name) };
        class.rewrite_types(&mut map)
    }
}

fn nat_of(class: &ClassFile, ref_idx: u16) -> Result<&Const, crate::class::ClassError> {
    let nat_idx = match *class.pool.get(ref_idx)? {
        Const::Fieldref { name_and_type, .. }
        | Const::Methodref { name_and_type, .. }
        | Const::InterfaceMethodref { name_and_type, .. } => name_and_type,
        _ => return Err(crate::class::ClassError::BadIndex(ref_idx)),
    };
    class.pool.get(nat_idx)
}

fn repoint_nat(
    class: &mut ClassFile,
    ref_idx: u16,
    fresh: u16,
) -> Result<(), crate::class::ClassError> {
    match class.pool.get_mut(ref_idx)? {
        Const::Fieldref { name_and_type, .. }
        | Const::Methodref { name_and_type, .. }
        | Const::InterfaceMethodref { name_and_type, .. } => {
            *name_and_type = fresh;
            Ok(())
        }
        _ => Err(crate::class::ClassError::BadIndex(ref_idx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ConstantPool, Member};

    fn table() -> RemapTable {
        RemapTable::parse(
            "\
CL: game/Level host/a
FD: game/Level/tickCount I host/a/b
MD: game/Level/tick ()V host/a/c
",
        )
        .unwrap()
    }

    /// `mymod/Main extends game/Level`, calls `game/Level.tick()V`, reads
    /// `game/Level.tickCount I`.
    fn caller_class() -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_name = pool.push_utf8("mymod/Main").unwrap();
        let this_class = pool.push(Const::Class { name: this_name }).unwrap();
        let super_name = pool.push_utf8("game/Level").unwrap();
        let super_class = pool.push(Const::Class { name: super_name }).unwrap();

        let tick_name = pool.push_utf8("tick").unwrap();
        let tick_desc = pool.push_utf8("()V").unwrap();
        let tick_nat = pool
            .push(Const::NameAndType {
                name: tick_name,
                descriptor: tick_desc,
            })
            .unwrap();
        pool.push(Const::Methodref {
            class: super_class,
            name_and_type: tick_nat,
        })
        .unwrap();

        let count_name = pool.push_utf8("tickCount").unwrap();
        let count_desc = pool.push_utf8("I").unwrap();
        let count_nat = pool
            .push(Const::NameAndType {
                name: count_name,
                descriptor: count_desc,
            })
            .unwrap();
        pool.push(Const::Fieldref {
            class: super_class,
            name_and_type: count_nat,
        })
        .unwrap();

        ClassFile {
            minor: 0,
            major: 61,
            pool,
            access_flags: 0x0021,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        }
    }

    fn exclusions() -> Vec<NamePattern> {
        vec![NamePattern::parse("mymod.*")]
    }

    #[test]
    fn remaps_references_and_owner() {
        let table = table();
        let exclude = exclusions();
        let remapper = Remapper::new(&table, &exclude);
        let mut class = caller_class();
        remapper.remap(&mut class, "mymod/Main").unwrap();

        // Own name excluded from the domain, kept.
        assert_eq!(class.declared_name().unwrap(), "mymod/Main");
        // Superclass remapped through the class map.
        assert_eq!(class.pool.class_name(class.super_class).unwrap(), "host/a");

        let refs = class.member_refs().unwrap();
        let method = refs
            .iter()
            .find(|r| r.kind == MemberRefKind::Method)
            .unwrap();
        assert_eq!(method.owner, "host/a");
        assert_eq!(method.name, "c");
        assert_eq!(method.descriptor, "()V");

        let field = refs
            .iter()
            .find(|r| r.kind == MemberRefKind::Field)
            .unwrap();
        assert_eq!(field.owner, "host/a");
        assert_eq!(field.name, "b");
    }

    #[test]
    fn total_table_means_success_and_one_removal_breaks_it() {
        // Remove the method entry: the reference to it must now fail.
        let smaller = RemapTable::parse(
            "\
CL: game/Level host/a
FD: game/Level/tickCount I host/a/b
",
        )
        .unwrap();
        let exclude = exclusions();
        let remapper = Remapper::new(&smaller, &exclude);
        let mut class = caller_class();
        let err = remapper.remap(&mut class, "mymod/Main").unwrap_err();
        let RewriteError::Map(BuildError::UnmappedSymbol {
            kind, owner, name, ..
        }) = err
        else {
            panic!("expected UnmappedSymbol, got {err:?}");
        };
        assert_eq!(kind, RefKind::Method);
        assert_eq!(owner, "game/Level");
        assert_eq!(name, "tick");
    }

    #[test]
    fn unmapped_class_reference_in_domain_fails() {
        let table = table();
        let exclude: Vec<NamePattern> = vec![];
        let remapper = Remapper::new(&table, &exclude);
        // `mymod.*` is no longer excluded, so `mymod/Main` itself is in the
        // domain and has no class mapping.
        let mut class = caller_class();
        let err = remapper.remap(&mut class, "mymod/Main").unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Map(BuildError::UnmappedSymbol {
                kind: RefKind::Class,
                ..
            })
        ));
    }

    #[test]
    fn jdk_names_are_implicitly_out_of_domain() {
        let table = table();
        let exclude = exclusions();
        let remapper = Remapper::new(&table, &exclude);
        assert!(!remapper.in_domain("java/lang/Object"));
        assert!(!remapper.in_domain("javax/annotation/Nullable"));
        assert!(!remapper.in_domain("[Lgame/Level;"));
        assert!(remapper.in_domain("game/Level"));
    }

    #[test]
    fn declarations_renamed_only_in_mapped_classes() {
        let table = table();
        let exclude: Vec<NamePattern> = vec![];
        let remapper = Remapper::new(&table, &exclude);

        // game/Level itself, declaring tick()V and an unmapped helper.
        let mut pool = ConstantPool::new();
        let this_name = pool.push_utf8("game/Level").unwrap();
        let this_class = pool.push(Const::Class { name: this_name }).unwrap();
        let super_name = pool.push_utf8("java/lang/Object").unwrap();
        let super_class = pool.push(Const::Class { name: super_name }).unwrap();
        let tick = pool.push_utf8("tick").unwrap();
        let void_desc = pool.push_utf8("()V").unwrap();
        let helper = pool.push_utf8("helper").unwrap();
        let mut class = ClassFile {
            minor: 0,
            major: 61,
            pool,
            access_flags: 0x0021,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![
                Member {
                    access_flags: 0x0001,
                    name: tick,
                    descriptor: void_desc,
                    attributes: vec![],
                },
                Member {
                    access_flags: 0x0002,
                    name: helper,
                    descriptor: void_desc,
                    attributes: vec![],
                },
            ],
            attributes: vec![],
        };

        remapper.remap(&mut class, "game/Level").unwrap();
        assert_eq!(class.declared_name().unwrap(), "host/a");
        assert_eq!(class.pool.utf8(class.methods[0].name).unwrap(), "c");
        // Unmapped declaration keeps its name; no error.
        assert_eq!(class.pool.utf8(class.methods[1].name).unwrap(), "helper");
    }
}
