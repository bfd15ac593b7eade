use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::classfile::{ClassDefinition, MemberReference};
use crate::entry::{
    ClassDefEntry, ClassEntry, Entry, EntryError, FieldDefEntry, FieldEntry, MethodDefEntry,
    MethodEntry,
};
use crate::pool::{EntryId, EntryPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    MethodCall,
    FieldRead,
    FieldWrite,
    Instantiation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryReference {
    pub entry: Entry,
    pub context: MethodEntry,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWarning {
    pub class: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub classes: usize,
    pub fields: usize,
    pub methods: usize,
    pub references: usize,
    pub inner_classes: usize,
    pub bridges: usize,
    pub warnings: usize,
}

#[derive(Debug, Default)]
pub struct JarIndex {
    pool: EntryPool,
    classes: Vec<EntryId>,
    class_defs: HashMap<EntryId, ClassDefEntry>,
    field_defs: HashMap<EntryId, FieldDefEntry>,
    method_defs: HashMap<EntryId, MethodDefEntry>,
    fields: HashMap<EntryId, Vec<EntryId>>,
    methods: HashMap<EntryId, Vec<EntryId>>,
    super_classes: HashMap<EntryId, EntryId>,
    interfaces: HashMap<EntryId, Vec<EntryId>>,
    subclasses: HashMap<EntryId, Vec<EntryId>>,
    implementors: HashMap<EntryId, Vec<EntryId>>,
    references: HashMap<EntryId, Vec<EntryReference>>,
    outer_classes: HashMap<EntryId, EntryId>,
    inner_classes: HashMap<EntryId, Vec<EntryId>>,
    bridges: HashMap<EntryId, EntryId>,
    warnings: Vec<IndexWarning>,
}

struct ValidClass {
    def: ClassDefEntry,
    fields: Vec<FieldDefEntry>,
    methods: Vec<(MethodDefEntry, Vec<(Entry, ReferenceKind)>)>,
    declared_outer: Option<ClassEntry>,
}

fn validate(class: &ClassDefinition) -> Result<ValidClass, EntryError> {
    let def = ClassDefEntry::parse(
        class.access,
        &class.name,
        class.signature.as_deref(),
        class.super_name.as_deref(),
        &class.interfaces,
    )?;
    let owner = def.entry.clone();

    let fields = class
        .fields
        .iter()
        .map(|f| {
            FieldDefEntry::parse(&owner, f.access, &f.name, &f.descriptor, f.signature.as_deref())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut methods = Vec::with_capacity(class.methods.len());
    for m in &class.methods {
        let method = MethodDefEntry::parse(
            &owner,
            m.access,
            &m.name,
            &m.descriptor,
            m.signature.as_deref(),
        )?;
        let mut references = Vec::with_capacity(m.references.len());
        for reference in &m.references {
            if let Some(target) = reference_target(reference)? {
                references.push((target, reference.kind));
            }
        }
        methods.push((method, references));
    }

    let declared_outer = class
        .inner_classes
        .iter()
        .find(|info| info.inner == class.name)
        .and_then(|info| info.outer.as_deref())
        .map(ClassEntry::new)
        .transpose()?;

    Ok(ValidClass {
        def,
        fields,
        methods,
        declared_outer,
    })
}

fn reference_target(reference: &MemberReference) -> Result<Option<Entry>, EntryError> {
    if reference.owner.starts_with('[') {
        return Ok(None);
    }
    let owner = ClassEntry::new(&reference.owner)?;
    let entry = match reference.kind {
        ReferenceKind::FieldRead | ReferenceKind::FieldWrite => {
            Entry::Field(FieldEntry::new(owner, &reference.name, &reference.descriptor)?)
        }
        ReferenceKind::MethodCall | ReferenceKind::Instantiation => {
            Entry::Method(MethodEntry::new(owner, &reference.name, &reference.descriptor)?)
        }
    };
    Ok(Some(entry))
}

impl JarIndex {
    pub fn build(classes: Vec<ClassDefinition>) -> Self {
        Self::build_with_warnings(classes, Vec::new())
    }

    pub fn build_with_warnings(classes: Vec<ClassDefinition>, warnings: Vec<IndexWarning>) -> Self {
        let mut index = JarIndex {
            warnings,
            ..Default::default()
        };
        let mut accepted = Vec::with_capacity(classes.len());
        let mut seen_classes = HashSet::new();

        for class in &classes {
            match validate(class) {
                Ok(valid) => {
                    if !seen_classes.insert(valid.def.entry.clone()) {
                        index.warn(&class.name, "duplicate class definition".to_string());
                        continue;
                    }
                    accepted.push(valid);
                }
                Err(err) => index.warn(&class.name, err.to_string()),
            }
        }

        for class in &accepted {
            index.add_definitions(class);
        }
        for class in &accepted {
            index.add_hierarchy(&class.def);
        }
        let mut seen_references = HashSet::new();
        for class in &accepted {
            index.add_references(class, &mut seen_references);
        }
        for class in &accepted {
            index.add_nesting(class);
        }
        for class in &accepted {
            index.add_bridges(class);
        }
        index
    }

    fn warn(&mut self, class: &str, message: String) {
        warn!("skipping class {class}: {message}");
        self.warnings.push(IndexWarning {
            class: class.to_string(),
            message,
        });
    }

    fn add_definitions(&mut self, class: &ValidClass) {
        let class_id = self.pool.intern(class.def.entry.clone());
        self.classes.push(class_id);
        self.class_defs.insert(class_id, class.def.clone());

        for field in &class.fields {
            let id = self.pool.intern(field.entry.clone());
            self.field_defs.insert(id, field.clone());
            self.fields.entry(class_id).or_default().push(id);
        }
        for (method, _) in &class.methods {
            let id = self.pool.intern(method.entry.clone());
            self.method_defs.insert(id, method.clone());
            self.methods.entry(class_id).or_default().push(id);
        }
    }

    fn add_hierarchy(&mut self, def: &ClassDefEntry) {
        let class_id = self.pool.intern(def.entry.clone());
        if let Some(super_class) = &def.super_class {
            let super_id = self.pool.intern(super_class.clone());
            self.super_classes.insert(class_id, super_id);
            self.subclasses.entry(super_id).or_default().push(class_id);
        }
        for interface in &def.interfaces {
            let interface_id = self.pool.intern(interface.clone());
            self.interfaces.entry(class_id).or_default().push(interface_id);
            self.implementors.entry(interface_id).or_default().push(class_id);
        }
    }

    fn add_references(&mut self, class: &ValidClass, seen: &mut HashSet<EntryReference>) {
        for (method, references) in &class.methods {
            for (target, kind) in references {
                let reference = EntryReference {
                    entry: target.clone(),
                    context: method.entry.clone(),
                    kind: *kind,
                };
                if !seen.insert(reference.clone()) {
                    continue;
                }
                let id = self.pool.intern(target.clone());
                self.references.entry(id).or_default().push(reference);
            }
        }
    }

    fn add_nesting(&mut self, class: &ValidClass) {
        let entry = &class.def.entry;
        let outer = entry.parent().cloned().or_else(|| class.declared_outer.clone());
        let Some(outer) = outer else {
            return;
        };
        let class_id = self.pool.intern(entry.clone());
        let outer_id = self.pool.intern(outer);
        self.outer_classes.insert(class_id, outer_id);
        self.inner_classes.entry(outer_id).or_default().push(class_id);
    }

    fn add_bridges(&mut self, class: &ValidClass) {
        for (method, references) in &class.methods {
            if !method.access.is_bridge() {
                continue;
            }
            let candidates: Vec<&MethodEntry> = references
                .iter()
                .filter(|(_, kind)| *kind == ReferenceKind::MethodCall)
                .filter_map(|(target, _)| target.as_method())
                .filter(|target| target.owner() == method.entry.owner() && **target != method.entry)
                .filter(|target| self.method_def(target).is_some())
                .collect();
            let bridged = candidates
                .iter()
                .find(|target| target.name() == method.entry.name())
                .or_else(|| candidates.first())
                .map(|target| (*target).clone());
            if let Some(bridged) = bridged {
                let bridge_id = self.pool.intern(method.entry.clone());
                let bridged_id = self.pool.intern(bridged);
                self.bridges.insert(bridge_id, bridged_id);
            }
        }
    }

    fn id(&self, entry: impl Into<Entry>) -> Option<EntryId> {
        self.pool.lookup(&entry.into())
    }

    fn class_entries(&self, ids: Option<&Vec<EntryId>>) -> Vec<ClassEntry> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.pool.get(*id).as_class().cloned())
            .collect()
    }

    pub fn pool(&self) -> &EntryPool {
        &self.pool
    }

    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefEntry> {
        self.classes.iter().filter_map(|id| self.class_defs.get(id))
    }

    pub fn class_def(&self, class: &ClassEntry) -> Option<&ClassDefEntry> {
        self.id(class.clone()).and_then(|id| self.class_defs.get(&id))
    }

    pub fn field_def(&self, field: &FieldEntry) -> Option<&FieldDefEntry> {
        self.id(field.clone()).and_then(|id| self.field_defs.get(&id))
    }

    pub fn method_def(&self, method: &MethodEntry) -> Option<&MethodDefEntry> {
        self.id(method.clone()).and_then(|id| self.method_defs.get(&id))
    }

    pub fn fields_of(&self, class: &ClassEntry) -> Vec<&FieldDefEntry> {
        self.id(class.clone())
            .and_then(|id| self.fields.get(&id))
            .into_iter()
            .flatten()
            .filter_map(|id| self.field_defs.get(id))
            .collect()
    }

    pub fn methods_of(&self, class: &ClassEntry) -> Vec<&MethodDefEntry> {
        self.id(class.clone())
            .and_then(|id| self.methods.get(&id))
            .into_iter()
            .flatten()
            .filter_map(|id| self.method_defs.get(id))
            .collect()
    }

    pub fn contains(&self, entry: &Entry) -> bool {
        match entry {
            Entry::Class(class) => self.class_def(class).is_some(),
            Entry::Field(field) => self.field_def(field).is_some(),
            Entry::Method(method) => self.method_def(method).is_some(),
            Entry::LocalVariable(var) => self
                .method_def(var.method())
                .is_some_and(|def| def.argument_slots().contains(&var.index())),
        }
    }

    pub fn references_to(&self, entry: &Entry) -> &[EntryReference] {
        self.pool
            .lookup(entry)
            .and_then(|id| self.references.get(&id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn super_class_of(&self, class: &ClassEntry) -> Option<&ClassEntry> {
        self.id(class.clone())
            .and_then(|id| self.super_classes.get(&id))
            .and_then(|id| self.pool.get(*id).as_class())
    }

    pub fn interfaces_of(&self, class: &ClassEntry) -> Vec<ClassEntry> {
        self.class_entries(self.id(class.clone()).and_then(|id| self.interfaces.get(&id)))
    }

    pub fn ancestors_of(&self, class: &ClassEntry) -> Vec<ClassEntry> {
        self.walk(class, |index, id| {
            let mut next: Vec<EntryId> = index.super_classes.get(&id).copied().into_iter().collect();
            next.extend(index.interfaces.get(&id).into_iter().flatten().copied());
            next
        })
    }

    pub fn descendants_of(&self, class: &ClassEntry) -> Vec<ClassEntry> {
        self.walk(class, |index, id| {
            let mut next: Vec<EntryId> = index.subclasses.get(&id).cloned().unwrap_or_default();
            next.extend(index.implementors.get(&id).into_iter().flatten().copied());
            next
        })
    }

    fn walk(
        &self,
        start: &ClassEntry,
        neighbours: impl Fn(&Self, EntryId) -> Vec<EntryId>,
    ) -> Vec<ClassEntry> {
        let Some(start) = self.id(start.clone()) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(id) = queue.pop_front() {
            for next in neighbours(self, id) {
                if visited.insert(next) {
                    if let Some(class) = self.pool.get(next).as_class() {
                        out.push(class.clone());
                    }
                    queue.push_back(next);
                }
            }
        }
        out
    }

    pub fn outer_class_of(&self, class: &ClassEntry) -> Option<&ClassEntry> {
        self.id(class.clone())
            .and_then(|id| self.outer_classes.get(&id))
            .and_then(|id| self.pool.get(*id).as_class())
    }

    pub fn inner_classes_of(&self, class: &ClassEntry) -> Vec<ClassEntry> {
        self.class_entries(self.id(class.clone()).and_then(|id| self.inner_classes.get(&id)))
    }

    pub fn is_bridge(&self, method: &MethodEntry) -> bool {
        self.method_def(method).is_some_and(|def| def.access.is_bridge())
    }

    pub fn is_synthetic(&self, entry: &Entry) -> bool {
        match entry {
            Entry::Class(class) => self.class_def(class).is_some_and(|d| d.access.is_synthetic()),
            Entry::Field(field) => self.field_def(field).is_some_and(|d| d.access.is_synthetic()),
            Entry::Method(method) => self
                .method_def(method)
                .is_some_and(|d| d.access.is_synthetic()),
            Entry::LocalVariable(_) => false,
        }
    }

    pub fn bridged_method(&self, bridge: &MethodEntry) -> Option<&MethodEntry> {
        self.id(bridge.clone())
            .and_then(|id| self.bridges.get(&id))
            .and_then(|id| self.pool.get(*id).as_method())
    }

    pub fn resolve_method(&self, method: &MethodEntry) -> Option<MethodEntry> {
        if self.method_def(method).is_some() {
            return Some(method.clone());
        }
        self.ancestors_of(method.owner())
            .into_iter()
            .map(|class| method.with_owner(class))
            .find(|candidate| self.method_def(candidate).is_some())
    }

    fn overridable(&self, method: &MethodEntry) -> bool {
        self.method_def(method).is_some_and(|def| {
            !def.access.is_private() && !def.access.is_static() && !method.is_constructor()
        })
    }

    // closed over ancestors and descendants; sorted, includes `method` when declared
    pub fn related_methods(&self, method: &MethodEntry) -> Vec<MethodEntry> {
        let Some(resolved) = self.resolve_method(method) else {
            return Vec::new();
        };
        if !self.overridable(&resolved) {
            return vec![resolved];
        }

        let mut related = BTreeSet::from([resolved.clone()]);
        let mut queue = VecDeque::from([resolved]);
        while let Some(current) = queue.pop_front() {
            let owner = current.owner();
            let mut classes = self.ancestors_of(owner);
            classes.extend(self.descendants_of(owner));
            for class in classes {
                let candidate = current.with_owner(class);
                if self.overridable(&candidate) && related.insert(candidate.clone()) {
                    queue.push_back(candidate);
                }
            }
        }
        related.into_iter().collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            classes: self.class_defs.len(),
            fields: self.field_defs.len(),
            methods: self.method_defs.len(),
            references: self.references.values().map(Vec::len).sum(),
            inner_classes: self.outer_classes.len(),
            bridges: self.bridges.len(),
            warnings: self.warnings.len(),
        }
    }
}
