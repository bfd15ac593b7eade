#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_BRIDGE: u16 = 0x0040;

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "jar_mapper_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// Writes classes as `<name>.class` entries.
pub fn write_classes(path: &Path, classes: Vec<ClassBuilder>) -> anyhow::Result<()> {
    let entries: Vec<(String, Vec<u8>)> = classes
        .into_iter()
        .map(|class| (format!("{}.class", class.name), class.build()))
        .collect();
    write_jar(path, &entries)
}

/// Bytecode for one method body.
#[derive(Default)]
pub struct Code {
    bytes: Vec<u8>,
}

#[derive(Clone, Copy)]
pub enum Op {
    AloadThis,
    Dup,
    Pop,
    Iconst(u8),
    New(u16),
    InvokeSpecial(u16),
    InvokeVirtual(u16),
    GetField(u16),
    PutField(u16),
    Return,
}

impl Code {
    pub fn push(mut self, op: Op) -> Self {
        match op {
            Op::AloadThis => self.bytes.push(0x2a),
            Op::Dup => self.bytes.push(0x59),
            Op::Pop => self.bytes.push(0x57),
            Op::Iconst(n) => self.bytes.push(0x03 + n.min(5)),
            Op::New(index) => self.index_op(0xbb, index),
            Op::InvokeSpecial(index) => self.index_op(0xb7, index),
            Op::InvokeVirtual(index) => self.index_op(0xb6, index),
            Op::GetField(index) => self.index_op(0xb4, index),
            Op::PutField(index) => self.index_op(0xb5, index),
            Op::Return => self.bytes.push(0xb1),
        }
        self
    }

    fn index_op(&mut self, opcode: u8, index: u16) {
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
    }
}

struct Member {
    access: u16,
    name: u16,
    descriptor: u16,
    code: Option<Vec<u8>>,
}

/// Assembles just enough of a class file for the reader: constant pool,
/// fields, and methods with a `Code` attribute.
pub struct ClassBuilder {
    pub name: String,
    access: u16,
    this_class: u16,
    super_class: u16,
    pool: Vec<u8>,
    pool_count: u16,
    interned: HashMap<(u8, String), u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut builder = Self {
            name: name.to_string(),
            access: ACC_PUBLIC | 0x0020,
            this_class: 0,
            super_class: 0,
            pool: Vec::new(),
            pool_count: 1,
            interned: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class(super_name);
        builder
    }

    fn constant(&mut self, tag: u8, key: String, body: Vec<u8>) -> u16 {
        if let Some(index) = self.interned.get(&(tag, key.clone())) {
            return *index;
        }
        let index = self.pool_count;
        self.pool.push(tag);
        self.pool.extend_from_slice(&body);
        self.pool_count += 1;
        self.interned.insert((tag, key), index);
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        let mut body = (value.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(value.as_bytes());
        self.constant(1, value.to_string(), body)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.constant(7, name.to_string(), name_index.to_be_bytes().to_vec())
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(descriptor);
        let mut body = name_index.to_be_bytes().to_vec();
        body.extend_from_slice(&desc_index.to_be_bytes());
        self.constant(12, format!("{name}:{descriptor}"), body)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        let mut body = class_index.to_be_bytes().to_vec();
        body.extend_from_slice(&nat_index.to_be_bytes());
        self.constant(tag, format!("{owner}.{name}{descriptor}"), body)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.fields.push(Member {
            access,
            name,
            descriptor,
            code: None,
        });
        self
    }

    pub fn method(mut self, access: u16, name: &str, descriptor: &str, code: Code) -> Self {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods.push(Member {
            access,
            name,
            descriptor,
            code: Some(code.bytes),
        });
        self
    }

    /// A constructor that calls `owner.<init>descriptor` on `this` with zeroes.
    pub fn constructor(mut self, descriptor: &str, owner: &str, target: &str) -> Self {
        let target_ref = self.method_ref(owner, "<init>", target);
        let mut code = Code::default().push(Op::AloadThis);
        for _ in 0..arg_count(target) {
            code = code.push(Op::Iconst(0));
        }
        let code = code.push(Op::InvokeSpecial(target_ref)).push(Op::Return);
        self.method(ACC_PUBLIC, "<init>", descriptor, code)
    }

    /// A method whose body is `new owner(0, ...)`.
    pub fn instantiating(mut self, name: &str, owner: &str, ctor: &str) -> Self {
        let class_index = self.class(owner);
        let ctor_ref = self.method_ref(owner, "<init>", ctor);
        let mut code = Code::default()
            .push(Op::New(class_index))
            .push(Op::Dup);
        for _ in 0..arg_count(ctor) {
            code = code.push(Op::Iconst(0));
        }
        let code = code
            .push(Op::InvokeSpecial(ctor_ref))
            .push(Op::Pop)
            .push(Op::Return);
        self.method(ACC_PUBLIC, name, "()V", code)
    }

    pub fn build(mut self) -> Vec<u8> {
        let code_name = self.utf8("Code");
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&self.pool_count.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        for members in [&self.fields, &self.methods] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                out.extend_from_slice(&member.access.to_be_bytes());
                out.extend_from_slice(&member.name.to_be_bytes());
                out.extend_from_slice(&member.descriptor.to_be_bytes());
                match &member.code {
                    None => out.extend_from_slice(&0u16.to_be_bytes()),
                    Some(code) => {
                        out.extend_from_slice(&1u16.to_be_bytes());
                        out.extend_from_slice(&code_name.to_be_bytes());
                        out.extend_from_slice(&(12 + code.len() as u32).to_be_bytes());
                        out.extend_from_slice(&8u16.to_be_bytes());
                        out.extend_from_slice(&8u16.to_be_bytes());
                        out.extend_from_slice(&(code.len() as u32).to_be_bytes());
                        out.extend_from_slice(code);
                        out.extend_from_slice(&0u16.to_be_bytes());
                        out.extend_from_slice(&0u16.to_be_bytes());
                    }
                }
            }
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

/// Number of `I` arguments in a descriptor such as `(II)V`.
fn arg_count(descriptor: &str) -> usize {
    descriptor
        .trim_start_matches('(')
        .split(')')
        .next()
        .map_or(0, str::len)
}
