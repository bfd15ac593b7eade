use std::fmt;
use std::sync::Arc;

use crate::entry::EntryError;

pub type ClassNameMapper<'m> = dyn FnMut(&str) -> Option<String> + 'm;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor(Arc<str>);

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodDescriptor(Arc<str>);

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(Option<Arc<str>>);

impl TypeDescriptor {
    pub fn parse(raw: &str) -> Result<Self, EntryError> {
        rewrite(raw, Grammar::Type, &mut |_| None)?;
        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // `long` and `double` take two local variable slots.
    pub fn is_wide(&self) -> bool {
        matches!(self.as_str(), "J" | "D")
    }

    pub fn remap(&self, map: &mut ClassNameMapper<'_>) -> Self {
        match rewrite(&self.0, Grammar::Type, map) {
            Ok(out) => Self(Arc::from(out)),
            Err(_) => self.clone(),
        }
    }
}

impl MethodDescriptor {
    pub fn parse(raw: &str) -> Result<Self, EntryError> {
        rewrite(raw, Grammar::Method, &mut |_| None)?;
        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn argument_types(&self) -> Vec<TypeDescriptor> {
        let inner = self
            .0
            .strip_prefix('(')
            .and_then(|s| s.split_once(')'))
            .map(|(args, _)| args)
            .unwrap_or("");
        split_types(inner)
            .into_iter()
            .map(|t| TypeDescriptor(Arc::from(t)))
            .collect()
    }

    pub fn return_type(&self) -> &str {
        self.0.rsplit_once(')').map(|(_, ret)| ret).unwrap_or("V")
    }

    pub fn argument_slots(&self) -> u32 {
        self.argument_types()
            .iter()
            .map(|t| if t.is_wide() { 2 } else { 1 })
            .sum()
    }

    pub fn argument_slot_starts(&self, is_static: bool) -> Vec<u32> {
        let mut slot = if is_static { 0 } else { 1 };
        let mut starts = Vec::new();
        for arg in self.argument_types() {
            starts.push(slot);
            slot += if arg.is_wide() { 2 } else { 1 };
        }
        starts
    }

    pub fn remap(&self, map: &mut ClassNameMapper<'_>) -> Self {
        match rewrite(&self.0, Grammar::Method, map) {
            Ok(out) => Self(Arc::from(out)),
            Err(_) => self.clone(),
        }
    }
}

impl Signature {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, EntryError> {
        match raw {
            None => Ok(Self(None)),
            Some(raw) if raw.is_empty() => Ok(Self(None)),
            Some(raw) => {
                rewrite(raw, Grammar::Signature, &mut |_| None)?;
                Ok(Self(Some(Arc::from(raw))))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn remap(&self, map: &mut ClassNameMapper<'_>) -> Self {
        match &self.0 {
            None => Self(None),
            Some(raw) => match rewrite(raw, Grammar::Signature, map) {
                Ok(out) => Self(Some(Arc::from(out))),
                Err(_) => self.clone(),
            },
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(raw) => f.write_str(raw),
            None => f.write_str("<none>"),
        }
    }
}

fn split_types(mut s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    while !s.is_empty() {
        let dims = s.bytes().take_while(|b| *b == b'[').count();
        let end = match s.as_bytes().get(dims) {
            Some(b'L') => s.find(';').map(|i| i + 1).unwrap_or(s.len()),
            Some(_) => dims + 1,
            None => s.len(),
        };
        out.push(&s[..end]);
        s = &s[end..];
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Type,
    Method,
    Signature,
}

fn rewrite(src: &str, grammar: Grammar, map: &mut ClassNameMapper<'_>) -> Result<String, EntryError> {
    let mut walker = Walker {
        src,
        pos: 0,
        out: String::with_capacity(src.len()),
        generic: grammar == Grammar::Signature,
        map,
    };
    match grammar {
        Grammar::Type => walker.java_type()?,
        Grammar::Method => walker.method()?,
        Grammar::Signature => {
            if walker.peek() == Some('<') {
                walker.type_parameters()?;
            }
            if walker.peek() == Some('(') {
                walker.method()?;
            } else {
                walker.java_type()?;
                while !walker.at_end() {
                    walker.java_type()?;
                }
            }
        }
    }
    if !walker.at_end() {
        return Err(walker.error());
    }
    Ok(walker.out)
}

struct Walker<'s, 'm, 'f> {
    src: &'s str,
    pos: usize,
    out: String,
    generic: bool,
    map: &'m mut ClassNameMapper<'f>,
}

impl<'s> Walker<'s, '_, '_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self) -> EntryError {
        EntryError::InvalidDescriptor(self.src.to_string())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        self.out.push(c);
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), EntryError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error()),
        }
    }

    fn identifier(&mut self, stops: &[char]) -> Result<&'s str, EntryError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if start == self.pos {
            return Err(self.error());
        }
        Ok(&self.src[start..self.pos])
    }

    fn java_type(&mut self) -> Result<(), EntryError> {
        match self.peek() {
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                self.bump();
                Ok(())
            }
            Some('[') => {
                self.bump();
                self.java_type()
            }
            Some('T') if self.generic => {
                self.bump();
                let var = self.identifier(&[';'])?;
                self.out.push_str(var);
                self.expect(';')
            }
            Some('L') => self.class_type(),
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<(), EntryError> {
        self.expect('L')?;
        let stops: &[char] = if self.generic { &['<', '.', ';'] } else { &[';'] };
        let name = self.identifier(stops)?;
        let mut obf = name.to_string();
        let mut mapped = (self.map)(&obf).unwrap_or_else(|| obf.clone());
        self.out.push_str(&mapped);
        if self.peek() == Some('<') {
            self.type_arguments()?;
        }
        while self.peek() == Some('.') {
            self.bump();
            let inner = self.identifier(stops)?;
            obf = format!("{obf}${inner}");
            mapped = (self.map)(&obf).unwrap_or_else(|| format!("{mapped}${inner}"));
            let simple = mapped.rsplit('$').next().unwrap_or(inner);
            self.out.push_str(simple);
            if self.peek() == Some('<') {
                self.type_arguments()?;
            }
        }
        self.expect(';')
    }

    fn type_arguments(&mut self) -> Result<(), EntryError> {
        self.expect('<')?;
        loop {
            match self.peek() {
                Some('>') => {
                    self.bump();
                    return Ok(());
                }
                Some('*') => {
                    self.bump();
                }
                Some('+' | '-') => {
                    self.bump();
                    self.java_type()?;
                }
                Some(_) => self.java_type()?,
                None => return Err(self.error()),
            }
        }
    }

    fn type_parameters(&mut self) -> Result<(), EntryError> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            let name = self.identifier(&[':'])?;
            self.out.push_str(name);
            self.expect(':')?;
            if !matches!(self.peek(), Some(':')) {
                self.java_type()?;
            }
            while self.peek() == Some(':') {
                self.bump();
                self.java_type()?;
            }
        }
        self.expect('>')
    }

    fn method(&mut self) -> Result<(), EntryError> {
        self.expect('(')?;
        while self.peek() != Some(')') {
            self.java_type()?;
        }
        self.expect(')')?;
        if self.peek() == Some('V') {
            self.bump();
        } else {
            self.java_type()?;
        }
        while self.generic && self.peek() == Some('^') {
            self.bump();
            self.java_type()?;
        }
        Ok(())
    }
}
