use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

bitflags! {
    // shared bits carry their method names: 0x0040 is BRIDGE here, VOLATILE on fields
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

const VISIBILITY: AccessFlags = AccessFlags::PUBLIC
    .union(AccessFlags::PROTECTED)
    .union(AccessFlags::PRIVATE);

impl AccessFlags {
    pub fn from_raw(bits: u16) -> Self {
        Self::from_bits_retain(bits)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    pub fn is_bridge(self) -> bool {
        self.contains(Self::BRIDGE)
    }

    pub fn with_visibility(self, visibility: AccessFlags) -> Self {
        (self - VISIBILITY) | (visibility & VISIBILITY)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AccessModifier {
    #[default]
    Unchanged,
    Public,
    Protected,
    Private,
}

impl AccessModifier {
    pub fn transform(self, access: AccessFlags) -> AccessFlags {
        match self {
            AccessModifier::Unchanged => access,
            AccessModifier::Public => access.with_visibility(AccessFlags::PUBLIC),
            AccessModifier::Protected => access.with_visibility(AccessFlags::PROTECTED),
            AccessModifier::Private => access.with_visibility(AccessFlags::PRIVATE),
        }
    }

    pub fn is_unchanged(self) -> bool {
        self == AccessModifier::Unchanged
    }

    pub fn formatted_suffix(self) -> String {
        if self.is_unchanged() {
            String::new()
        } else {
            format!(" ACC:{self}")
        }
    }
}

impl fmt::Display for AccessModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessModifier::Unchanged => "UNCHANGED",
            AccessModifier::Public => "PUBLIC",
            AccessModifier::Protected => "PROTECTED",
            AccessModifier::Private => "PRIVATE",
        };
        f.write_str(name)
    }
}

impl FromStr for AccessModifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNCHANGED" => Ok(AccessModifier::Unchanged),
            "PUBLIC" => Ok(AccessModifier::Public),
            "PROTECTED" => Ok(AccessModifier::Protected),
            "PRIVATE" => Ok(AccessModifier::Private),
            other => Err(format!("unknown access modifier '{other}'")),
        }
    }
}
