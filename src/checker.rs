use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::entry::{ClassEntry, Entry, FieldEntry, LocalVariableEntry, MethodEntry};
use crate::index::JarIndex;
use crate::mapping::{MappingKey, MappingNode, MappingTree};

#[derive(Debug, Default)]
pub struct DroppedMappings {
    pub classes: BTreeMap<ClassEntry, MappingNode>,
    pub fields: BTreeMap<FieldEntry, MappingNode>,
    pub methods: BTreeMap<MethodEntry, MappingNode>,
    pub arguments: BTreeMap<LocalVariableEntry, MappingNode>,
}

#[derive(Debug, Serialize)]
pub struct DroppedSummary {
    pub classes: Vec<String>,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
    pub arguments: Vec<String>,
}

impl DroppedMappings {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.fields.len() + self.methods.len() + self.arguments.len()
    }

    fn insert(&mut self, entry: Entry, node: MappingNode) {
        match entry {
            Entry::Class(e) => {
                self.classes.insert(e, node);
            }
            Entry::Field(e) => {
                self.fields.insert(e, node);
            }
            Entry::Method(e) => {
                self.methods.insert(e, node);
            }
            Entry::LocalVariable(e) => {
                self.arguments.insert(e, node);
            }
        }
    }

    pub fn summary(&self) -> DroppedSummary {
        fn lines<K: fmt::Display>(map: &BTreeMap<K, MappingNode>) -> Vec<String> {
            map.iter()
                .map(|(entry, node)| match node.deobf_name() {
                    Some(name) => format!("{entry} -> {name}"),
                    None => entry.to_string(),
                })
                .collect()
        }
        DroppedSummary {
            classes: lines(&self.classes),
            fields: lines(&self.fields),
            methods: lines(&self.methods),
            arguments: lines(&self.arguments),
        }
    }
}

pub struct MappingChecker<'a> {
    index: &'a JarIndex,
}

impl<'a> MappingChecker<'a> {
    pub fn new(index: &'a JarIndex) -> Self {
        Self { index }
    }

    pub fn drop_broken_mappings(&self, mappings: &mut MappingTree) -> DroppedMappings {
        let mut broken = Vec::new();
        for class in mappings.classes() {
            let MappingKey::Class(name) = class.key() else {
                continue;
            };
            match ClassEntry::new(name) {
                Ok(entry) => self.collect_class(&entry, class, &mut broken),
                Err(err) => warn!("unusable class mapping {name}: {err}"),
            }
        }

        let mut dropped = DroppedMappings::default();
        for entry in broken {
            if let Some(node) = mappings.remove(&entry) {
                warn!("dropping broken {} mapping {}", entry.kind_name(), entry);
                dropped.insert(entry, node);
            }
        }
        if !dropped.is_empty() {
            info!("dropped {} broken mappings", dropped.len());
        }
        dropped
    }

    fn collect_class(&self, class: &ClassEntry, node: &MappingNode, broken: &mut Vec<Entry>) {
        if self.index.class_def(class).is_none() {
            broken.push(Entry::Class(class.clone()));
            return;
        }
        for child in node.children() {
            match child.key() {
                MappingKey::Class(name) => match ClassEntry::inner(class, name) {
                    Ok(inner) => self.collect_class(&inner, child, broken),
                    Err(err) => warn!("unusable inner class mapping {class}${name}: {err}"),
                },
                MappingKey::Field { name, desc } => {
                    match FieldEntry::new(class.clone(), name, desc) {
                        Ok(field) if self.index.field_def(&field).is_some() => {}
                        Ok(field) => broken.push(Entry::Field(field)),
                        Err(err) => warn!("unusable field mapping {class}.{name}: {err}"),
                    }
                }
                MappingKey::Method { name, desc } => {
                    match MethodEntry::new(class.clone(), name, desc) {
                        Ok(method) if self.index.method_def(&method).is_some() => {
                            self.collect_arguments(&method, child, broken);
                        }
                        Ok(method) => broken.push(Entry::Method(method)),
                        Err(err) => warn!("unusable method mapping {class}.{name}: {err}"),
                    }
                }
                MappingKey::Argument(_) => {}
            }
        }
    }

    fn collect_arguments(&self, method: &MethodEntry, node: &MappingNode, broken: &mut Vec<Entry>) {
        for child in node.children() {
            if let MappingKey::Argument(index) = child.key() {
                let arg = Entry::LocalVariable(LocalVariableEntry::new(method.clone(), *index));
                if !self.index.contains(&arg) {
                    broken.push(arg);
                }
            }
        }
    }
}
