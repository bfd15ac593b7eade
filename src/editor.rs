use log::debug;
use thiserror::Error;

use crate::access::AccessModifier;
use crate::entry::{ClassEntry, Entry, EntryError, FieldEntry, LocalVariableEntry, MethodEntry};
use crate::index::JarIndex;
use crate::mapping::{MappingNode, MappingTree};
use crate::translate::{Translatable, Translator};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("{0} is not defined in the archive")]
    UnknownEntry(String),

    #[error("{0} cannot be renamed")]
    NotRenamable(String),

    #[error("invalid name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: EntryError,
    },

    #[error("cannot name {entry} '{name}': already used by {existing}")]
    Conflict {
        entry: String,
        name: String,
        existing: String,
    },
}

pub struct MappingEditor<'a> {
    index: &'a JarIndex,
    mappings: &'a mut MappingTree,
}

impl<'a> MappingEditor<'a> {
    pub fn new(index: &'a JarIndex, mappings: &'a mut MappingTree) -> Self {
        Self { index, mappings }
    }

    pub fn rename(&mut self, entry: &Entry, name: Option<&str>) -> Result<Vec<Entry>, EditError> {
        if !self.index.contains(entry) {
            return Err(EditError::UnknownEntry(entry.to_string()));
        }
        let targets = self.targets(entry)?;
        if let Some(name) = name {
            validate_name(entry, name)?;
            for target in &targets {
                self.check_conflict(target, name)?;
            }
        }

        let mut changed = Vec::new();
        for target in targets {
            if self.mappings.set_deobf_name(&target, name) {
                debug!("renamed {target} to {}", name.unwrap_or("<obf>"));
                changed.push(target);
            }
        }
        Ok(changed)
    }

    pub fn set_modifier(&mut self, entry: &Entry, modifier: AccessModifier) -> Result<bool, EditError> {
        if matches!(entry, Entry::LocalVariable(_)) {
            return Err(EditError::NotRenamable(entry.to_string()));
        }
        if !self.index.contains(entry) {
            return Err(EditError::UnknownEntry(entry.to_string()));
        }
        Ok(self.mappings.set_modifier(entry, modifier))
    }

    pub fn remove(&mut self, entry: &Entry) -> Vec<(Entry, MappingNode)> {
        let targets = match entry {
            Entry::Method(method) if !method.is_constructor() => {
                let related = self.index.related_methods(method);
                if related.is_empty() {
                    vec![entry.clone()]
                } else {
                    related.into_iter().map(Entry::Method).collect()
                }
            }
            _ => vec![entry.clone()],
        };
        targets
            .into_iter()
            .filter_map(|target| {
                let node = self.mappings.remove(&target)?;
                Some((target, node))
            })
            .collect()
    }

    fn targets(&self, entry: &Entry) -> Result<Vec<Entry>, EditError> {
        match entry {
            Entry::Method(method) => {
                if method.is_constructor() || method.is_static_initializer() {
                    return Err(EditError::NotRenamable(entry.to_string()));
                }
                Ok(self
                    .index
                    .related_methods(method)
                    .into_iter()
                    .map(Entry::Method)
                    .collect())
            }
            _ => Ok(vec![entry.clone()]),
        }
    }

    fn check_conflict(&self, target: &Entry, name: &str) -> Result<(), EditError> {
        let translator = Translator::new(&*self.mappings);
        let conflict = |existing: String| EditError::Conflict {
            entry: target.to_string(),
            name: name.to_string(),
            existing,
        };

        match target {
            Entry::Class(class) => {
                let wanted = match class.parent() {
                    Some(parent) => format!("{}${}", parent.translate(&translator).full_name(), name),
                    None => name.to_string(),
                };
                let clash = self
                    .index
                    .classes()
                    .map(|def| &def.entry)
                    .filter(|other| *other != class)
                    .find(|other| other.translate(&translator).full_name() == wanted);
                if let Some(other) = clash {
                    return Err(conflict(other.to_string()));
                }
            }
            Entry::Field(field) => {
                let clash = self
                    .index
                    .fields_of(field.owner())
                    .into_iter()
                    .map(|def| &def.entry)
                    .filter(|other| *other != field && other.desc() == field.desc())
                    .find(|other| other.translate(&translator).name() == name);
                if let Some(other) = clash {
                    return Err(conflict(other.to_string()));
                }
            }
            Entry::Method(method) => {
                let clash = self
                    .index
                    .methods_of(method.owner())
                    .into_iter()
                    .map(|def| &def.entry)
                    .filter(|other| *other != method && other.desc() == method.desc())
                    .find(|other| other.translate(&translator).name() == name);
                if let Some(other) = clash {
                    return Err(conflict(other.to_string()));
                }
            }
            Entry::LocalVariable(var) => {
                let slots = self
                    .index
                    .method_def(var.method())
                    .map(|def| def.argument_slots())
                    .unwrap_or_default();
                for slot in slots.into_iter().filter(|slot| *slot != var.index()) {
                    let sibling = LocalVariableEntry::new(var.method().clone(), slot);
                    if translator.argument_name(&sibling) == Some(name) {
                        return Err(conflict(sibling.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_name(entry: &Entry, name: &str) -> Result<(), EditError> {
    let invalid = |source: EntryError| EditError::InvalidName {
        name: name.to_string(),
        source,
    };
    if name.chars().any(char::is_whitespace) {
        return Err(invalid(EntryError::IllegalName {
            kind: entry.kind_name(),
            name: name.to_string(),
        }));
    }
    let checked = match entry {
        Entry::Class(class) => match class.parent() {
            Some(parent) => ClassEntry::inner(parent, name).map(|_| ()),
            None => ClassEntry::new(name).map(|_| ()),
        },
        Entry::Field(field) => {
            FieldEntry::new(field.owner().clone(), name, field.desc().as_str()).map(|_| ())
        }
        Entry::Method(method) => {
            if name.starts_with('<') {
                return Err(invalid(EntryError::IllegalName {
                    kind: "method",
                    name: name.to_string(),
                }));
            }
            MethodEntry::new(method.owner().clone(), name, method.desc().as_str()).map(|_| ())
        }
        Entry::LocalVariable(var) => {
            FieldEntry::new(var.method().owner().clone(), name, "I").map(|_| ())
        }
    };
    checked.map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessFlags;
    use crate::classfile::{ClassDefinition, FieldDefinition, MethodDefinition};

    fn entry(spec: &str) -> Entry {
        spec.parse().unwrap()
    }

    fn class(name: &str, super_name: &str) -> ClassDefinition {
        ClassDefinition {
            name: name.to_string(),
            access: AccessFlags::PUBLIC.bits(),
            signature: None,
            super_name: Some(super_name.to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    fn method(name: &str, desc: &str) -> MethodDefinition {
        MethodDefinition {
            name: name.to_string(),
            descriptor: desc.to_string(),
            access: AccessFlags::PUBLIC.bits(),
            signature: None,
            references: Vec::new(),
        }
    }

    fn index() -> JarIndex {
        let mut base = class("a", "java/lang/Object");
        base.methods.push(method("m", "()V"));
        base.methods.push(method("n", "()V"));
        base.methods.push(method("<init>", "()V"));
        base.methods.push(method("k", "(II)V"));
        base.fields.push(FieldDefinition {
            name: "f".to_string(),
            descriptor: "I".to_string(),
            access: 0,
            signature: None,
        });
        base.fields.push(FieldDefinition {
            name: "g".to_string(),
            descriptor: "I".to_string(),
            access: 0,
            signature: None,
        });
        let mut sub = class("b", "a");
        sub.methods.push(method("m", "()V"));
        JarIndex::build(vec![base, sub, class("c", "java/lang/Object")])
    }

    #[test]
    fn method_renames_reach_every_override() {
        let index = index();
        let mut tree = MappingTree::new();
        let mut editor = MappingEditor::new(&index, &mut tree);

        let changed = editor.rename(&entry("b.m()V"), Some("run")).unwrap();
        assert_eq!(changed, [entry("a.m()V"), entry("b.m()V")]);
        assert!(editor.rename(&entry("a.m()V"), Some("run")).unwrap().is_empty());

        let removed = editor.remove(&entry("a.m()V"));
        assert_eq!(removed.len(), 2);
        assert_eq!(tree.deobf_name(&entry("b.m()V")), None);
        assert!(tree.get(&entry("a.m()V")).is_none());
    }

    #[test]
    fn colliding_names_are_refused() {
        let index = index();
        let mut tree = MappingTree::new();
        let mut editor = MappingEditor::new(&index, &mut tree);

        editor.rename(&entry("a.n()V"), Some("run")).unwrap();
        let err = editor.rename(&entry("b.m()V"), Some("run")).unwrap_err();
        assert!(matches!(err, EditError::Conflict { ref existing, .. } if existing == "a.n()V"));

        editor.rename(&entry("a.f:I"), Some("value")).unwrap();
        assert!(editor.rename(&entry("a.g:I"), Some("value")).is_err());

        editor.rename(&entry("a"), Some("pkg/Base")).unwrap();
        assert!(editor.rename(&entry("c"), Some("pkg/Base")).is_err());

        editor.rename(&entry("a.k(II)V@1"), Some("x")).unwrap();
        assert!(editor.rename(&entry("a.k(II)V@2"), Some("x")).is_err());
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let index = index();
        let mut tree = MappingTree::new();
        let mut editor = MappingEditor::new(&index, &mut tree);

        assert_eq!(
            editor.rename(&entry("a.<init>()V"), Some("make")),
            Err(EditError::NotRenamable("a.<init>()V".to_string()))
        );
        assert!(matches!(
            editor.rename(&entry("q"), Some("Q")),
            Err(EditError::UnknownEntry(_))
        ));
        assert!(matches!(
            editor.rename(&entry("a.f:I"), Some("two words")),
            Err(EditError::InvalidName { .. })
        ));
        assert!(matches!(
            editor.rename(&entry("a.k(II)V@3"), Some("z")),
            Err(EditError::UnknownEntry(_))
        ));
        assert!(editor.set_modifier(&entry("a.f:I"), AccessModifier::Public).unwrap());
        assert!(editor.set_modifier(&entry("a.k(II)V@1"), AccessModifier::Public).is_err());
    }
}
