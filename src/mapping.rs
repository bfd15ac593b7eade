use std::collections::BTreeMap;
use std::collections::btree_map::Entry as MapEntry;

use crate::access::AccessModifier;
use crate::entry::{ClassEntry, Entry};

// The derived order is the order children are written in: classes, then
// fields, then methods, then arguments, each by name and then descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MappingKey {
    Class(String),
    Field { name: String, desc: String },
    Method { name: String, desc: String },
    Argument(u32),
}

impl MappingKey {
    pub fn obf_name(&self) -> String {
        match self {
            MappingKey::Class(name) => name.clone(),
            MappingKey::Field { name, .. } | MappingKey::Method { name, .. } => name.clone(),
            MappingKey::Argument(index) => index.to_string(),
        }
    }
}

pub fn key_path(entry: &Entry) -> Vec<MappingKey> {
    fn class_path(class: &ClassEntry) -> Vec<MappingKey> {
        class
            .lineage()
            .into_iter()
            .map(|c| MappingKey::Class(c.name().to_string()))
            .collect()
    }

    match entry {
        Entry::Class(class) => class_path(class),
        Entry::Field(field) => {
            let mut path = class_path(field.owner());
            path.push(MappingKey::Field {
                name: field.name().to_string(),
                desc: field.desc().to_string(),
            });
            path
        }
        Entry::Method(method) => {
            let mut path = class_path(method.owner());
            path.push(MappingKey::Method {
                name: method.name().to_string(),
                desc: method.desc().to_string(),
            });
            path
        }
        Entry::LocalVariable(var) => {
            let mut path = key_path(&Entry::Method(var.method().clone()));
            path.push(MappingKey::Argument(var.index()));
            path
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappingNode {
    key: MappingKey,
    deobf_name: Option<String>,
    modifier: AccessModifier,
    dirty: bool,
    children: BTreeMap<MappingKey, MappingNode>,
}

impl MappingNode {
    pub fn new(key: MappingKey) -> Self {
        Self {
            key,
            deobf_name: None,
            modifier: AccessModifier::Unchanged,
            dirty: false,
            children: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &MappingKey {
        &self.key
    }

    pub fn deobf_name(&self) -> Option<&str> {
        self.deobf_name.as_deref()
    }

    pub fn modifier(&self) -> AccessModifier {
        self.modifier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_deobf_name(&mut self, name: Option<String>) -> bool {
        if self.deobf_name == name {
            return false;
        }
        self.deobf_name = name;
        self.dirty = true;
        true
    }

    pub fn set_modifier(&mut self, modifier: AccessModifier) -> bool {
        if self.modifier == modifier {
            return false;
        }
        self.modifier = modifier;
        self.dirty = true;
        true
    }

    pub fn child(&self, key: &MappingKey) -> Option<&MappingNode> {
        self.children.get(key)
    }

    pub fn child_mut(&mut self, key: &MappingKey) -> Option<&mut MappingNode> {
        self.children.get_mut(key)
    }

    pub fn child_or_insert(&mut self, key: MappingKey) -> &mut MappingNode {
        self.children
            .entry(key)
            .or_insert_with_key(|key| MappingNode::new(key.clone()))
    }

    pub fn remove_child(&mut self, key: &MappingKey) -> Option<MappingNode> {
        self.children.remove(key)
    }

    pub fn insert_child(&mut self, child: MappingNode) {
        match self.children.entry(child.key.clone()) {
            MapEntry::Vacant(slot) => {
                slot.insert(child);
            }
            MapEntry::Occupied(mut slot) => slot.get_mut().merge(child),
        }
    }

    fn merge(&mut self, other: MappingNode) {
        if other.deobf_name.is_some() {
            self.deobf_name = other.deobf_name;
        }
        if !other.modifier.is_unchanged() {
            self.modifier = other.modifier;
        }
        self.dirty |= other.dirty;
        for child in other.children.into_values() {
            self.insert_child(child);
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &MappingNode> {
        self.children.values()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_dirty_deep(&self) -> bool {
        self.dirty || self.children.values().any(MappingNode::is_dirty_deep)
    }

    pub fn same_content(&self, other: &MappingNode) -> bool {
        self.key == other.key
            && self.deobf_name == other.deobf_name
            && self.modifier == other.modifier
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|((ka, a), (kb, b))| ka == kb && a.same_content(b))
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
        for child in self.children.values_mut() {
            child.clear_dirty();
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingTree {
    classes: BTreeMap<MappingKey, MappingNode>,
    previous: Option<Box<MappingTree>>,
}

impl MappingTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, entry: &Entry) -> Option<&MappingNode> {
        let path = key_path(entry);
        let (first, rest) = path.split_first()?;
        let mut node = self.classes.get(first)?;
        for key in rest {
            node = node.child(key)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, entry: &Entry) -> Option<&mut MappingNode> {
        let path = key_path(entry);
        let (first, rest) = path.split_first()?;
        let mut node = self.classes.get_mut(first)?;
        for key in rest {
            node = node.child_mut(key)?;
        }
        Some(node)
    }

    pub fn node_or_insert(&mut self, entry: &Entry) -> &mut MappingNode {
        let mut path = key_path(entry).into_iter();
        // key_path always yields at least the top-level class
        let first = path
            .next()
            .unwrap_or_else(|| MappingKey::Class(entry.top_level_class().name().to_string()));
        let mut node = self
            .classes
            .entry(first)
            .or_insert_with_key(|key| MappingNode::new(key.clone()));
        for key in path {
            node = node.child_or_insert(key);
        }
        node
    }

    pub fn deobf_name(&self, entry: &Entry) -> Option<&str> {
        self.get(entry).and_then(MappingNode::deobf_name)
    }

    pub fn modifier(&self, entry: &Entry) -> AccessModifier {
        self.get(entry)
            .map(MappingNode::modifier)
            .unwrap_or_default()
    }

    pub fn set_deobf_name(&mut self, entry: &Entry, name: Option<&str>) -> bool {
        match name {
            Some(name) => self
                .node_or_insert(entry)
                .set_deobf_name(Some(name.to_string())),
            // an ARG line always carries a name, so an unnamed argument has no node
            None if matches!(entry, Entry::LocalVariable(_)) => self
                .remove(entry)
                .is_some_and(|node| node.deobf_name().is_some()),
            None => self
                .get_mut(entry)
                .is_some_and(|node| node.set_deobf_name(None)),
        }
    }

    pub fn set_modifier(&mut self, entry: &Entry, modifier: AccessModifier) -> bool {
        if matches!(entry, Entry::LocalVariable(_)) {
            return false;
        }
        if modifier.is_unchanged() {
            return self
                .get_mut(entry)
                .is_some_and(|node| node.set_modifier(modifier));
        }
        self.node_or_insert(entry).set_modifier(modifier)
    }

    pub fn remove(&mut self, entry: &Entry) -> Option<MappingNode> {
        let mut path = key_path(entry);
        let last = path.pop()?;
        if path.is_empty() {
            return self.classes.remove(&last);
        }
        let (first, rest) = path.split_first()?;
        let mut node = self.classes.get_mut(first)?;
        for key in rest {
            node = node.child_mut(key)?;
        }
        node.remove_child(&last)
    }

    pub fn classes(&self) -> impl Iterator<Item = &MappingNode> {
        self.classes.values()
    }

    pub fn class(&self, obf_name: &str) -> Option<&MappingNode> {
        self.classes.get(&MappingKey::Class(obf_name.to_string()))
    }

    pub fn insert_class(&mut self, node: MappingNode) {
        match self.classes.entry(node.key.clone()) {
            MapEntry::Vacant(slot) => {
                slot.insert(node);
            }
            MapEntry::Occupied(mut slot) => slot.get_mut().merge(node),
        }
    }

    pub fn contains_class(&self, obf_name: &str) -> bool {
        self.class(obf_name).is_some()
    }

    pub fn mark_saved(&mut self) {
        for node in self.classes.values_mut() {
            node.clear_dirty();
        }
        self.previous = Some(Box::new(MappingTree {
            classes: self.classes.clone(),
            previous: None,
        }));
    }

    pub fn clear_previous(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&MappingTree> {
        self.previous.as_deref()
    }

    pub fn previous_class(&self, obf_name: &str) -> Option<&MappingNode> {
        self.previous.as_ref().and_then(|p| p.class(obf_name))
    }

    pub fn needs_write(&self, obf_name: &str) -> bool {
        let Some(current) = self.class(obf_name) else {
            return false;
        };
        if current.is_dirty_deep() {
            return true;
        }
        match self.previous_class(obf_name) {
            Some(previous) => !current.same_content(previous),
            None => true,
        }
    }

    pub fn dropped_classes(&self) -> Vec<&MappingNode> {
        let Some(previous) = self.previous.as_deref() else {
            return Vec::new();
        };
        previous
            .classes()
            .filter(|node| !self.classes.contains_key(node.key()))
            .collect()
    }

    pub fn same_content(&self, other: &MappingTree) -> bool {
        self.classes.len() == other.classes.len()
            && self
                .classes
                .values()
                .zip(other.classes.values())
                .all(|(a, b)| a.same_content(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(spec: &str) -> Entry {
        spec.parse().unwrap()
    }

    #[test]
    fn setting_a_name_creates_the_path() {
        let mut tree = MappingTree::new();
        assert!(tree.set_deobf_name(&entry("a$b.m(I)V@1"), Some("count")));

        let outer = tree.class("a").unwrap();
        assert!(!outer.is_dirty());
        assert!(outer.is_dirty_deep());
        assert_eq!(tree.deobf_name(&entry("a$b.m(I)V@1")), Some("count"));
        assert_eq!(tree.deobf_name(&entry("a$b.m(I)V")), None);
    }

    #[test]
    fn same_name_does_not_dirty() {
        let mut tree = MappingTree::new();
        tree.set_deobf_name(&entry("a"), Some("Foo"));
        tree.mark_saved();

        assert!(!tree.set_deobf_name(&entry("a"), Some("Foo")));
        assert!(!tree.class("a").unwrap().is_dirty());
        assert!(!tree.needs_write("a"));

        assert!(!tree.set_deobf_name(&entry("zz"), None));
        assert!(tree.class("zz").is_none());
    }

    #[test]
    fn children_are_ordered_by_kind_then_name() {
        let mut tree = MappingTree::new();
        for spec in ["a.z()V", "a.b:I", "a$c", "a.a(I)V", "a.a()V", "a.B:I"] {
            tree.set_deobf_name(&entry(spec), Some("x"));
        }
        let keys: Vec<String> = tree
            .class("a")
            .unwrap()
            .children()
            .map(|c| format!("{:?}", c.key()))
            .collect();
        assert_eq!(
            keys,
            [
                "Class(\"c\")",
                "Field { name: \"B\", desc: \"I\" }",
                "Field { name: \"b\", desc: \"I\" }",
                "Method { name: \"a\", desc: \"()V\" }",
                "Method { name: \"a\", desc: \"(I)V\" }",
                "Method { name: \"z\", desc: \"()V\" }",
            ]
        );
    }

    #[test]
    fn removing_a_class_drops_its_subtree() {
        let mut tree = MappingTree::new();
        tree.set_deobf_name(&entry("a$b.f:I"), Some("value"));
        tree.set_deobf_name(&entry("c"), Some("Other"));
        tree.mark_saved();

        let removed = tree.remove(&entry("a")).unwrap();
        assert!(removed.has_children());
        assert!(tree.get(&entry("a$b.f:I")).is_none());
        let dropped: Vec<String> = tree.dropped_classes().iter().map(|n| n.key().obf_name()).collect();
        assert_eq!(dropped, ["a"]);
        assert!(!tree.needs_write("c"));
    }

    #[test]
    fn needs_write_compares_with_snapshot() {
        let mut tree = MappingTree::new();
        tree.set_deobf_name(&entry("a.f:I"), Some("value"));
        assert!(tree.needs_write("a"));
        tree.mark_saved();
        assert!(!tree.needs_write("a"));

        // removal dirties nothing but still changes the content
        tree.remove(&entry("a.f:I"));
        assert!(!tree.class("a").unwrap().is_dirty_deep());
        assert!(tree.needs_write("a"));

        tree.set_modifier(&entry("a"), AccessModifier::Public);
        assert_eq!(tree.modifier(&entry("a")), AccessModifier::Public);
        assert!(tree.class("a").unwrap().is_dirty());
    }
}
