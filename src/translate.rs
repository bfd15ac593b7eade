use crate::descriptor::{MethodDescriptor, Signature, TypeDescriptor};
use crate::entry::{
    ClassDefEntry, ClassEntry, DefEntry, Entry, FieldDefEntry, FieldEntry, LocalVariableEntry,
    MethodDefEntry, MethodEntry,
};
use crate::index::EntryReference;
use crate::mapping::MappingTree;

pub trait Translatable {
    fn translate(&self, translator: &Translator<'_>) -> Self;
}

#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    mappings: &'a MappingTree,
}

impl<'a> Translator<'a> {
    pub fn new(mappings: &'a MappingTree) -> Self {
        Self { mappings }
    }

    pub fn translate<T: Translatable>(&self, value: &T) -> T {
        value.translate(self)
    }

    fn deobf_name(&self, entry: Entry) -> Option<&'a str> {
        self.mappings.deobf_name(&entry)
    }

    pub fn class_name(&self, obf: &str) -> Option<String> {
        let class = ClassEntry::new(obf).ok()?;
        Some(self.translate(&class).full_name())
    }

    pub fn argument_name(&self, var: &LocalVariableEntry) -> Option<&'a str> {
        self.deobf_name(Entry::LocalVariable(var.clone()))
    }
}

impl Translatable for ClassEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let parent = self.parent().map(|parent| parent.translate(translator));
        let name = translator
            .deobf_name(Entry::Class(self.clone()))
            .unwrap_or(self.name());
        self.with_parent(parent).with_name(name)
    }
}

impl Translatable for TypeDescriptor {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        self.remap(&mut |name: &str| translator.class_name(name))
    }
}

impl Translatable for MethodDescriptor {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        self.remap(&mut |name: &str| translator.class_name(name))
    }
}

impl Translatable for Signature {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        self.remap(&mut |name: &str| translator.class_name(name))
    }
}

impl Translatable for FieldEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let name = translator
            .deobf_name(Entry::Field(self.clone()))
            .unwrap_or(self.name());
        self.with_name(name)
            .with_owner(self.owner().translate(translator))
            .with_desc(self.desc().translate(translator))
    }
}

impl Translatable for MethodEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let name = translator
            .deobf_name(Entry::Method(self.clone()))
            .unwrap_or(self.name());
        self.with_name(name)
            .with_owner(self.owner().translate(translator))
            .with_desc(self.desc().translate(translator))
    }
}

impl Translatable for LocalVariableEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        self.with_method(self.method().translate(translator))
    }
}

impl Translatable for Entry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        match self {
            Entry::Class(e) => Entry::Class(e.translate(translator)),
            Entry::Field(e) => Entry::Field(e.translate(translator)),
            Entry::Method(e) => Entry::Method(e.translate(translator)),
            Entry::LocalVariable(e) => Entry::LocalVariable(e.translate(translator)),
        }
    }
}

impl Translatable for ClassDefEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let modifier = translator.mappings.modifier(&Entry::Class(self.entry.clone()));
        ClassDefEntry {
            entry: self.entry.translate(translator),
            access: modifier.transform(self.access),
            signature: self.signature.translate(translator),
            super_class: self.super_class.as_ref().map(|c| c.translate(translator)),
            interfaces: self
                .interfaces
                .iter()
                .map(|c| c.translate(translator))
                .collect(),
        }
    }
}

impl Translatable for FieldDefEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let modifier = translator.mappings.modifier(&Entry::Field(self.entry.clone()));
        FieldDefEntry {
            entry: self.entry.translate(translator),
            access: modifier.transform(self.access),
            signature: self.signature.translate(translator),
        }
    }
}

impl Translatable for MethodDefEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        let modifier = translator.mappings.modifier(&Entry::Method(self.entry.clone()));
        MethodDefEntry {
            entry: self.entry.translate(translator),
            access: modifier.transform(self.access),
            signature: self.signature.translate(translator),
        }
    }
}

impl Translatable for DefEntry {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        match self {
            DefEntry::Class(d) => DefEntry::Class(d.translate(translator)),
            DefEntry::Field(d) => DefEntry::Field(d.translate(translator)),
            DefEntry::Method(d) => DefEntry::Method(d.translate(translator)),
        }
    }
}

impl Translatable for EntryReference {
    fn translate(&self, translator: &Translator<'_>) -> Self {
        EntryReference {
            entry: self.entry.translate(translator),
            context: self.context.translate(translator),
            kind: self.kind,
        }
    }
}
