//! Class-file constant pool (JVMS §4.4), restricted to the entry kinds that
//! synthesized methods reference: UTF-8 strings, classes, string literals,
//! name-and-type pairs and method references.
//!
//! Entries are deduplicated; indices start at 1 as the class-file format
//! requires.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(String),
    Class { name_idx: u16 },
    String { utf8_idx: u16 },
    NameAndType { name_idx: u16, descriptor_idx: u16 },
    MethodRef { class_idx: u16, name_and_type_idx: u16 },
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::MethodRef { .. } => 10,
            Constant::NameAndType { .. } => 12,
        }
    }
}

/// A resolved method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

impl fmt::Display for MethodRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// A constant that does not fit the class-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOverflow {
    /// The pool is out of 16-bit indices.
    Entries,
    /// A Utf8 entry whose encoded form is longer than a `u16` length.
    Utf8Length { len: usize },
}

impl fmt::Display for PoolOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entries => {
                write!(f, "constant pool overflow: more than {} entries", u16::MAX - 1)
            }
            Self::Utf8Length { len } => {
                write!(f, "utf8 constant of {len} bytes exceeds {} bytes", u16::MAX)
            }
        }
    }
}

impl std::error::Error for PoolOverflow {}

#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: HashMap<Constant, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, not counting the reserved slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: u16) -> Option<&Constant> {
        let pos = usize::from(idx).checked_sub(1)?;
        self.entries.get(pos)
    }

    fn add(&mut self, constant: Constant) -> Result<u16, PoolOverflow> {
        if let Some(&idx) = self.index.get(&constant) {
            return Ok(idx);
        }
        // Slot 0 is reserved and the count field is a u16.
        let idx = u16::try_from(self.entries.len() + 1)
            .ok()
            .filter(|&idx| idx < u16::MAX)
            .ok_or(PoolOverflow::Entries)?;
        self.entries.push(constant.clone());
        self.index.insert(constant, idx);
        Ok(idx)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16, PoolOverflow> {
        let len = encode_modified_utf8(value).len();
        if len > usize::from(u16::MAX) {
            return Err(PoolOverflow::Utf8Length { len });
        }
        self.add(Constant::Utf8(value.to_owned()))
    }

    pub fn class(&mut self, internal_name: &str) -> Result<u16, PoolOverflow> {
        let name_idx = self.utf8(internal_name)?;
        self.add(Constant::Class { name_idx })
    }

    pub fn string(&mut self, value: &str) -> Result<u16, PoolOverflow> {
        let utf8_idx = self.utf8(value)?;
        self.add(Constant::String { utf8_idx })
    }

    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, PoolOverflow> {
        let class_idx = self.class(owner)?;
        let name_idx = self.utf8(name)?;
        let descriptor_idx = self.utf8(descriptor)?;
        let name_and_type_idx = self.add(Constant::NameAndType {
            name_idx,
            descriptor_idx,
        })?;
        self.add(Constant::MethodRef {
            class_idx,
            name_and_type_idx,
        })
    }

    fn resolve_utf8(&self, idx: u16) -> Option<&str> {
        match self.get(idx)? {
            Constant::Utf8(value) => Some(value),
            _ => None,
        }
    }

    pub fn resolve_string(&self, idx: u16) -> Option<&str> {
        match *self.get(idx)? {
            Constant::String { utf8_idx } => self.resolve_utf8(utf8_idx),
            _ => None,
        }
    }

    pub fn resolve_method(&self, idx: u16) -> Option<MethodRef<'_>> {
        let Constant::MethodRef {
            class_idx,
            name_and_type_idx,
        } = *self.get(idx)?
        else {
            return None;
        };
        let Constant::Class { name_idx: owner_idx } = *self.get(class_idx)?
        else {
            return None;
        };
        let Constant::NameAndType {
            name_idx,
            descriptor_idx,
        } = *self.get(name_and_type_idx)?
        else {
            return None;
        };
        Some(MethodRef {
            owner: self.resolve_utf8(owner_idx)?,
            name: self.resolve_utf8(name_idx)?,
            descriptor: self.resolve_utf8(descriptor_idx)?,
        })
    }

    /// Encode as a class-file `constant_pool_count` followed by the entries.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // add() keeps len + 1 below u16::MAX
        buf.extend_from_slice(&((self.entries.len() + 1) as u16).to_be_bytes());
        for constant in &self.entries {
            buf.push(constant.tag());
            match constant {
                Constant::Utf8(value) => {
                    let bytes = encode_modified_utf8(value);
                    // utf8() rejects anything longer
                    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    buf.extend_from_slice(&bytes);
                }
                Constant::Class { name_idx } => {
                    buf.extend_from_slice(&name_idx.to_be_bytes());
                }
                Constant::String { utf8_idx } => {
                    buf.extend_from_slice(&utf8_idx.to_be_bytes());
                }
                Constant::NameAndType {
                    name_idx,
                    descriptor_idx,
                } => {
                    buf.extend_from_slice(&name_idx.to_be_bytes());
                    buf.extend_from_slice(&descriptor_idx.to_be_bytes());
                }
                Constant::MethodRef {
                    class_idx,
                    name_and_type_idx,
                } => {
                    buf.extend_from_slice(&class_idx.to_be_bytes());
                    buf.extend_from_slice(&name_and_type_idx.to_be_bytes());
                }
            }
        }
        buf
    }
}

/// JVM "modified UTF-8": NUL is two bytes and supplementary characters are
/// encoded as surrogate pairs, three bytes each.
fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}
