//! Minimal class-file reader.
//!
//! Reads just what the index needs: names, access flags, `Signature`
//! attributes, `InnerClasses`, and the member references in each method's
//! `Code`. Everything else in the file is skipped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::index::ReferenceKind;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub access: u16,
    pub signature: Option<String>,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDefinition>,
    pub methods: Vec<MethodDefinition>,
    #[serde(default)]
    pub inner_classes: Vec<InnerClassInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    #[serde(default)]
    pub references: Vec<MemberReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberReference {
    pub kind: ReferenceKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerClassInfo {
    pub inner: String,
    pub outer: Option<String>,
    pub inner_name: Option<String>,
    pub access: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassReadError {
    #[error("unexpected end of class data at offset {0}")]
    Truncated(usize),

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {index} is not a {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("unknown opcode {opcode:#04x} at code offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
}

type ReadResult<T> = Result<T, ClassReadError>;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> ReadResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassReadError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> ReadResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> ReadResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> ReadResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    MemberRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read(reader: &mut Reader<'_>) -> ReadResult<Self> {
        let count = u32::from(reader.u16()?);
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);
        // a two-slot constant in the last slot steps past u16::MAX
        let mut index = 1u32;
        while index < count {
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(String::from_utf8_lossy(reader.bytes(len)?).into_owned())
                }
                3 | 4 => {
                    reader.bytes(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.bytes(8)?;
                    Constant::Other
                }
                7 => Constant::Class(reader.u16()?),
                8 | 16 | 19 | 20 => {
                    reader.u16()?;
                    Constant::Other
                }
                9..=11 => Constant::MemberRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                15 => {
                    reader.bytes(3)?;
                    Constant::Other
                }
                17 | 18 => {
                    reader.bytes(4)?;
                    Constant::Other
                }
                tag => {
                    return Err(ClassReadError::UnknownConstantTag {
                        tag,
                        index: index as u16,
                    });
                }
            };
            entries.push(constant);
            index += 1;
            // long and double take two slots
            if matches!(tag, 5 | 6) {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    fn utf8(&self, index: u16) -> ReadResult<&str> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ClassReadError::BadConstant {
                index,
                expected: "utf8 constant",
            }),
        }
    }

    fn class_name(&self, index: u16) -> ReadResult<&str> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(ClassReadError::BadConstant {
                index,
                expected: "class constant",
            }),
        }
    }

    fn optional_class_name(&self, index: u16) -> ReadResult<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(|s| Some(s.to_string()))
    }

    fn optional_utf8(&self, index: u16) -> ReadResult<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.utf8(index).map(|s| Some(s.to_string()))
    }

    fn member_ref(&self, index: u16) -> ReadResult<(&str, &str, &str)> {
        let Some(Constant::MemberRef {
            class,
            name_and_type,
        }) = self.get(index)
        else {
            return Err(ClassReadError::BadConstant {
                index,
                expected: "member reference",
            });
        };
        let owner = self.class_name(*class)?;
        let Some(Constant::NameAndType { name, descriptor }) = self.get(*name_and_type) else {
            return Err(ClassReadError::BadConstant {
                index: *name_and_type,
                expected: "name and type",
            });
        };
        Ok((owner, self.utf8(*name)?, self.utf8(*descriptor)?))
    }
}

struct Attribute<'a> {
    name: &'a str,
    info: &'a [u8],
}

fn read_attributes<'a>(
    reader: &mut Reader<'a>,
    pool: &'a ConstantPool,
) -> ReadResult<Vec<Attribute<'a>>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(reader.u16()?)?;
        let len = reader.u32()? as usize;
        attributes.push(Attribute {
            name,
            info: reader.bytes(len)?,
        });
    }
    Ok(attributes)
}

fn signature_of(attributes: &[Attribute<'_>], pool: &ConstantPool) -> ReadResult<Option<String>> {
    match attributes.iter().find(|a| a.name == "Signature") {
        Some(attr) => pool.optional_utf8(Reader::new(attr.info).u16()?),
        None => Ok(None),
    }
}

pub fn read_class(data: &[u8]) -> Result<ClassDefinition, ClassReadError> {
    let mut reader = Reader::new(data);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(ClassReadError::BadMagic(magic));
    }
    reader.u16()?;
    reader.u16()?;
    let pool = ConstantPool::read(&mut reader)?;

    let access = reader.u16()?;
    let name = pool.class_name(reader.u16()?)?.to_string();
    let super_name = pool.optional_class_name(reader.u16()?)?;
    let interface_count = reader.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(reader.u16()?)?.to_string());
    }

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let access = reader.u16()?;
        let name = pool.utf8(reader.u16()?)?.to_string();
        let descriptor = pool.utf8(reader.u16()?)?.to_string();
        let attributes = read_attributes(&mut reader, &pool)?;
        fields.push(FieldDefinition {
            name,
            descriptor,
            access,
            signature: signature_of(&attributes, &pool)?,
        });
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        let access = reader.u16()?;
        let name = pool.utf8(reader.u16()?)?.to_string();
        let descriptor = pool.utf8(reader.u16()?)?.to_string();
        let attributes = read_attributes(&mut reader, &pool)?;
        let mut references = Vec::new();
        if let Some(code) = attributes.iter().find(|a| a.name == "Code") {
            references = scan_code(code.info, &pool)?;
        }
        methods.push(MethodDefinition {
            name,
            descriptor,
            access,
            signature: signature_of(&attributes, &pool)?,
            references,
        });
    }

    let attributes = read_attributes(&mut reader, &pool)?;
    let signature = signature_of(&attributes, &pool)?;
    let mut inner_classes = Vec::new();
    if let Some(attr) = attributes.iter().find(|a| a.name == "InnerClasses") {
        let mut info = Reader::new(attr.info);
        for _ in 0..info.u16()? {
            inner_classes.push(InnerClassInfo {
                inner: pool.class_name(info.u16()?)?.to_string(),
                outer: pool.optional_class_name(info.u16()?)?,
                inner_name: pool.optional_utf8(info.u16()?)?,
                access: info.u16()?,
            });
        }
    }

    Ok(ClassDefinition {
        name,
        access,
        signature,
        super_name,
        interfaces,
        fields,
        methods,
        inner_classes,
    })
}

fn scan_code(info: &[u8], pool: &ConstantPool) -> ReadResult<Vec<MemberReference>> {
    let mut reader = Reader::new(info);
    reader.u16()?;
    reader.u16()?;
    let code_len = reader.u32()? as usize;
    let code = reader.bytes(code_len)?;

    let mut seen = HashSet::new();
    let mut references = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        let opcode = code[pc];
        let len = instruction_length(code, pc)?;
        if matches!(opcode, 0xb2..=0xb9) {
            let index = Reader::new(&code[pc + 1..]).u16()?;
            let (owner, name, descriptor) = pool.member_ref(index)?;
            let kind = match opcode {
                0xb2 | 0xb4 => ReferenceKind::FieldRead,
                0xb3 | 0xb5 => ReferenceKind::FieldWrite,
                _ if name == "<init>" => ReferenceKind::Instantiation,
                _ => ReferenceKind::MethodCall,
            };
            let reference = MemberReference {
                kind,
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            };
            if seen.insert(reference.clone()) {
                references.push(reference);
            }
        }
        pc += len;
    }
    Ok(references)
}

fn instruction_length(code: &[u8], pc: usize) -> ReadResult<usize> {
    let opcode = code[pc];
    let len = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x12 => 2,
        0x13 | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        0x84 => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        0xaa => {
            let base = pc + 1 + padding(pc);
            let mut reader = Reader::new(code.get(base..).unwrap_or_default());
            reader.u32()?;
            let low = reader.u32()? as i32;
            let high = reader.u32()? as i32;
            let count = (i64::from(high) - i64::from(low) + 1).max(0) as usize;
            1 + padding(pc) + 12 + count * 4
        }
        0xab => {
            let base = pc + 1 + padding(pc);
            let mut reader = Reader::new(code.get(base..).unwrap_or_default());
            reader.u32()?;
            let pairs = reader.u32()? as usize;
            1 + padding(pc) + 8 + pairs * 8
        }
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        0xc4 => match code.get(pc + 1) {
            Some(0x84) => 6,
            Some(_) => 4,
            None => return Err(ClassReadError::Truncated(pc)),
        },
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        0xca | 0xfe | 0xff => 1,
        opcode => return Err(ClassReadError::UnknownOpcode { opcode, offset: pc }),
    };
    if pc + len > code.len() {
        return Err(ClassReadError::Truncated(pc));
    }
    Ok(len)
}

fn padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}
