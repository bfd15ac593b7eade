use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::access::AccessFlags;
use crate::descriptor::{MethodDescriptor, Signature, TypeDescriptor};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("empty {0} name")]
    EmptyName(&'static str),

    #[error("illegal character in {kind} name '{name}'")]
    IllegalName { kind: &'static str, name: String },

    #[error("invalid descriptor '{0}'")]
    InvalidDescriptor(String),

    #[error("invalid entry '{0}' (expected Class, Class.field:desc, Class.method(desc) or Class.method(desc)@index)")]
    InvalidSpec(String),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClassEntry {
    parent: Option<Arc<ClassEntry>>,
    name: Arc<str>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldEntry {
    owner: ClassEntry,
    name: Arc<str>,
    desc: TypeDescriptor,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodEntry {
    owner: ClassEntry,
    name: Arc<str>,
    desc: MethodDescriptor,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LocalVariableEntry {
    method: MethodEntry,
    index: u32,
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entry {
    Class(ClassEntry),
    Field(FieldEntry),
    Method(MethodEntry),
    LocalVariable(LocalVariableEntry),
}

fn validate_class_name(name: &str) -> Result<(), EntryError> {
    if name.is_empty() {
        return Err(EntryError::EmptyName("class"));
    }
    if name.contains(['.', ';', '[']) || name.split('/').any(str::is_empty) {
        return Err(EntryError::IllegalName {
            kind: "class",
            name: name.to_string(),
        });
    }
    Ok(())
}

fn validate_member_name(kind: &'static str, name: &str) -> Result<(), EntryError> {
    if name.is_empty() {
        return Err(EntryError::EmptyName(kind));
    }
    let special = kind == "method" && (name == "<init>" || name == "<clinit>");
    // `$` in an inner name would hide a nesting level from the entry's lineage
    let nested = kind == "inner class" && name.contains('$');
    if nested || (!special && name.contains(['.', ';', '[', '/', '<', '>'])) {
        return Err(EntryError::IllegalName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl ClassEntry {
    pub fn new(full_name: &str) -> Result<Self, EntryError> {
        validate_class_name(full_name)?;
        Ok(Self::from_validated(full_name))
    }

    fn from_validated(full_name: &str) -> Self {
        if let Some(pos) = full_name.rfind('$') {
            let (outer, inner) = (&full_name[..pos], &full_name[pos + 1..]);
            if !outer.is_empty() && !inner.is_empty() && !inner.contains('/') && !outer.ends_with('/') {
                return Self {
                    parent: Some(Arc::new(Self::from_validated(outer))),
                    name: Arc::from(inner),
                };
            }
        }
        Self {
            parent: None,
            name: Arc::from(full_name),
        }
    }

    pub fn inner(parent: &ClassEntry, name: &str) -> Result<Self, EntryError> {
        validate_member_name("inner class", name)?;
        Ok(Self {
            parent: Some(Arc::new(parent.clone())),
            name: Arc::from(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}${}", parent.full_name(), self.name),
            None => self.name.to_string(),
        }
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn parent(&self) -> Option<&ClassEntry> {
        self.parent.as_deref()
    }

    pub fn is_inner(&self) -> bool {
        self.parent.is_some()
    }

    pub fn outermost(&self) -> &ClassEntry {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn lineage(&self) -> Vec<&ClassEntry> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            parent: self.parent.clone(),
            name: Arc::from(name),
        }
    }

    pub fn with_parent(&self, parent: Option<ClassEntry>) -> Self {
        Self {
            parent: parent.map(Arc::new),
            name: self.name.clone(),
        }
    }
}

impl FieldEntry {
    pub fn new(owner: ClassEntry, name: &str, desc: &str) -> Result<Self, EntryError> {
        validate_member_name("field", name)?;
        Ok(Self {
            owner,
            name: Arc::from(name),
            desc: TypeDescriptor::parse(desc)?,
        })
    }

    pub fn owner(&self) -> &ClassEntry {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &TypeDescriptor {
        &self.desc
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ..self.clone()
        }
    }

    pub fn with_owner(&self, owner: ClassEntry) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    pub fn with_desc(&self, desc: TypeDescriptor) -> Self {
        Self {
            desc,
            ..self.clone()
        }
    }
}

impl MethodEntry {
    pub fn new(owner: ClassEntry, name: &str, desc: &str) -> Result<Self, EntryError> {
        validate_member_name("method", name)?;
        Ok(Self {
            owner,
            name: Arc::from(name),
            desc: MethodDescriptor::parse(desc)?,
        })
    }

    pub fn owner(&self) -> &ClassEntry {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &MethodDescriptor {
        &self.desc
    }

    pub fn is_constructor(&self) -> bool {
        &*self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        &*self.name == "<clinit>"
    }

    pub fn same_signature(&self, other: &MethodEntry) -> bool {
        self.name == other.name && self.desc == other.desc
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ..self.clone()
        }
    }

    pub fn with_owner(&self, owner: ClassEntry) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    pub fn with_desc(&self, desc: MethodDescriptor) -> Self {
        Self {
            desc,
            ..self.clone()
        }
    }
}

impl LocalVariableEntry {
    pub fn new(method: MethodEntry, index: u32) -> Self {
        Self { method, index }
    }

    pub fn method(&self) -> &MethodEntry {
        &self.method
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn with_method(&self, method: MethodEntry) -> Self {
        Self {
            method,
            index: self.index,
        }
    }
}

impl Entry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entry::Class(_) => "class",
            Entry::Field(_) => "field",
            Entry::Method(_) => "method",
            Entry::LocalVariable(_) => "argument",
        }
    }

    pub fn containing_class(&self) -> Option<&ClassEntry> {
        match self {
            Entry::Class(class) => class.parent(),
            Entry::Field(field) => Some(field.owner()),
            Entry::Method(method) => Some(method.owner()),
            Entry::LocalVariable(var) => Some(var.method().owner()),
        }
    }

    pub fn top_level_class(&self) -> &ClassEntry {
        match self {
            Entry::Class(class) => class.outermost(),
            Entry::Field(field) => field.owner().outermost(),
            Entry::Method(method) => method.owner().outermost(),
            Entry::LocalVariable(var) => var.method().owner().outermost(),
        }
    }

    pub fn as_class(&self) -> Option<&ClassEntry> {
        match self {
            Entry::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodEntry> {
        match self {
            Entry::Method(method) => Some(method),
            _ => None,
        }
    }
}

impl From<ClassEntry> for Entry {
    fn from(entry: ClassEntry) -> Self {
        Entry::Class(entry)
    }
}

impl From<FieldEntry> for Entry {
    fn from(entry: FieldEntry) -> Self {
        Entry::Field(entry)
    }
}

impl From<MethodEntry> for Entry {
    fn from(entry: MethodEntry) -> Self {
        Entry::Method(entry)
    }
}

impl From<LocalVariableEntry> for Entry {
    fn from(entry: LocalVariableEntry) -> Self {
        Entry::LocalVariable(entry)
    }
}

impl Ord for ClassEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_name().cmp(&other.full_name())
    }
}

impl PartialOrd for ClassEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.owner
            .cmp(&other.owner)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.desc.cmp(&other.desc))
    }
}

impl PartialOrd for FieldEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MethodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.owner
            .cmp(&other.owner)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.desc.cmp(&other.desc))
    }
}

impl PartialOrd for MethodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LocalVariableEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.method
            .cmp(&other.method)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for LocalVariableEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ClassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl fmt::Display for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.desc)
    }
}

impl fmt::Display for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.desc)
    }
}

impl fmt::Display for LocalVariableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.method, self.index)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Class(e) => e.fmt(f),
            Entry::Field(e) => e.fmt(f),
            Entry::Method(e) => e.fmt(f),
            Entry::LocalVariable(e) => e.fmt(f),
        }
    }
}

macro_rules! debug_as_display {
    ($($ty:ty),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        })*
    };
}

debug_as_display!(ClassEntry, FieldEntry, MethodEntry, LocalVariableEntry, Entry);

impl FromStr for Entry {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EntryError::InvalidSpec(s.to_string());
        let Some((owner, member)) = s.split_once('.') else {
            return Ok(Entry::Class(ClassEntry::new(s)?));
        };
        let owner = ClassEntry::new(owner)?;
        if let Some(paren) = member.find('(') {
            let (name, rest) = member.split_at(paren);
            let (desc, index) = match rest.rsplit_once('@') {
                Some((desc, index)) => (desc, Some(index.parse::<u32>().map_err(|_| invalid())?)),
                None => (rest, None),
            };
            let method = MethodEntry::new(owner, name, desc)?;
            return Ok(match index {
                Some(index) => Entry::LocalVariable(LocalVariableEntry::new(method, index)),
                None => Entry::Method(method),
            });
        }
        let (name, desc) = member.split_once(':').ok_or_else(invalid)?;
        Ok(Entry::Field(FieldEntry::new(owner, name, desc)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefEntry {
    pub entry: ClassEntry,
    pub access: AccessFlags,
    pub signature: Signature,
    pub super_class: Option<ClassEntry>,
    pub interfaces: Vec<ClassEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefEntry {
    pub entry: FieldEntry,
    pub access: AccessFlags,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefEntry {
    pub entry: MethodEntry,
    pub access: AccessFlags,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefEntry {
    Class(ClassDefEntry),
    Field(FieldDefEntry),
    Method(MethodDefEntry),
}

impl ClassDefEntry {
    pub fn parse(
        access: u16,
        name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[String],
    ) -> Result<Self, EntryError> {
        Ok(Self {
            entry: ClassEntry::new(name)?,
            access: AccessFlags::from_raw(access),
            signature: Signature::parse(signature)?,
            super_class: super_name.map(ClassEntry::new).transpose()?,
            interfaces: interfaces
                .iter()
                .map(|name| ClassEntry::new(name))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            entry: self.entry.with_name(name),
            ..self.clone()
        }
    }

    pub fn with_parent(&self, parent: Option<ClassEntry>) -> Self {
        Self {
            entry: self.entry.with_parent(parent),
            ..self.clone()
        }
    }
}

impl FieldDefEntry {
    pub fn parse(
        owner: &ClassEntry,
        access: u16,
        name: &str,
        desc: &str,
        signature: Option<&str>,
    ) -> Result<Self, EntryError> {
        Ok(Self {
            entry: FieldEntry::new(owner.clone(), name, desc)?,
            access: AccessFlags::from_raw(access),
            signature: Signature::parse(signature)?,
        })
    }
}

impl MethodDefEntry {
    pub fn parse(
        owner: &ClassEntry,
        access: u16,
        name: &str,
        desc: &str,
        signature: Option<&str>,
    ) -> Result<Self, EntryError> {
        Ok(Self {
            entry: MethodEntry::new(owner.clone(), name, desc)?,
            access: AccessFlags::from_raw(access),
            signature: Signature::parse(signature)?,
        })
    }

    pub fn argument_slots(&self) -> Vec<u32> {
        self.entry.desc().argument_slot_starts(self.access.is_static())
    }
}

impl DefEntry {
    pub fn entry(&self) -> Entry {
        match self {
            DefEntry::Class(def) => Entry::Class(def.entry.clone()),
            DefEntry::Field(def) => Entry::Field(def.entry.clone()),
            DefEntry::Method(def) => Entry::Method(def.entry.clone()),
        }
    }

    pub fn access(&self) -> AccessFlags {
        match self {
            DefEntry::Class(def) => def.access,
            DefEntry::Field(def) => def.access,
            DefEntry::Method(def) => def.access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_class_names_split_on_dollar() {
        let inner = ClassEntry::new("a/b/C$D$E").unwrap();
        assert_eq!(inner.name(), "E");
        assert_eq!(inner.full_name(), "a/b/C$D$E");
        assert_eq!(inner.parent().map(ClassEntry::full_name).as_deref(), Some("a/b/C$D"));
        assert_eq!(inner.outermost().full_name(), "a/b/C");
        assert_eq!(inner.lineage().len(), 3);

        let odd = ClassEntry::new("a/x$y/Top").unwrap();
        assert!(!odd.is_inner());
        assert_eq!(odd.simple_name(), "Top");
    }

    #[test]
    fn inner_names_cannot_skip_a_level() {
        let outer = ClassEntry::new("a").unwrap();
        assert!(matches!(
            ClassEntry::inner(&outer, "b$c"),
            Err(EntryError::IllegalName { kind: "inner class", .. })
        ));
        let middle = ClassEntry::inner(&outer, "b").unwrap();
        let deep = ClassEntry::inner(&middle, "c").unwrap();
        assert_eq!(deep, ClassEntry::new("a$b$c").unwrap());
    }

    #[test]
    fn with_name_keeps_parent() {
        let inner = ClassEntry::new("a$b").unwrap();
        let renamed = inner.with_name("Inner");
        assert_eq!(renamed.full_name(), "a$Inner");
        assert_eq!(inner.full_name(), "a$b");
    }

    #[test]
    fn invalid_inputs_are_rejected_eagerly() {
        assert_eq!(ClassEntry::new(""), Err(EntryError::EmptyName("class")));
        assert!(ClassEntry::new("a.b").is_err());
        assert!(ClassEntry::new("a//b").is_err());
        let owner = ClassEntry::new("a").unwrap();
        assert!(FieldEntry::new(owner.clone(), "f", "Q").is_err());
        assert!(MethodEntry::new(owner.clone(), "<init>", "()V").is_ok());
        assert!(MethodEntry::new(owner, "<weird>", "()V").is_err());
    }

    #[test]
    fn entry_spec_round_trips_through_display() {
        for spec in ["a/B", "a/B$c", "a/B.f:[I", "a/B.m(ILa/C;)V", "a/B.<init>(J)V@3"] {
            let entry: Entry = spec.parse().unwrap();
            assert_eq!(entry.to_string(), spec);
        }
        assert!("a/B.f".parse::<Entry>().is_err());
        assert!("a/B.m()V@x".parse::<Entry>().is_err());
    }

    #[test]
    fn local_variable_identity_is_method_and_index() {
        let method: MethodEntry = match "a.m(I)V".parse::<Entry>().unwrap() {
            Entry::Method(m) => m,
            other => panic!("unexpected {other}"),
        };
        let a = LocalVariableEntry::new(method.clone(), 1);
        let b = LocalVariableEntry::new(method, 1);
        assert_eq!(a, b);
        assert_eq!(Entry::from(a).top_level_class().full_name(), "a");
    }
}
