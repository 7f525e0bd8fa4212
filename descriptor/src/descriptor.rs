use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::param::{BaseType, Param, TypeTag};

/// Most dimensions a JVM array type may have.
pub const MAX_ARRAY_DEPTH: usize = 255;

/// Most local slots a method's parameters may occupy.
pub const MAX_PARAMETER_SLOTS: u16 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorError {
    pub message: String,
    pub descriptor: String,
    /// Byte offset into `descriptor` where parsing failed.
    pub offset: usize,
}

impl DescriptorError {
    fn new(message: impl Into<String>, descriptor: &str, offset: usize) -> Self {
        Self {
            message: message.into(),
            descriptor: descriptor.to_owned(),
            offset,
        }
    }
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed descriptor `{}` at {}: {}",
            self.descriptor, self.offset, self.message
        )
    }
}

impl std::error::Error for DescriptorError {}

/// A parsed method descriptor such as `(IDLjava/lang/String;)[J`.
///
/// Two descriptors are equal exactly when their text is equal. Structurally
/// interchangeable descriptors with different text (`(Z)I` vs `(I)I`) are
/// different descriptors.
#[derive(Debug, Clone)]
pub struct Descriptor {
    text: String,
    parameters: Vec<Param>,
    return_param: Param,
}

impl Descriptor {
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        Cursor::new(text).descriptor()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Param] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Param> {
        self.parameters.get(index)
    }

    pub fn return_param(&self) -> &Param {
        &self.return_param
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Total local slots taken by the parameters, receiver excluded.
    pub fn occupied_slots(&self) -> u16 {
        self.parameters.iter().map(Param::width).sum()
    }

    pub fn returns_void(&self) -> bool {
        self.return_param.is_void()
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Descriptor::parse(s)
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> DescriptorError {
        DescriptorError::new(message, self.text, offset)
    }

    fn expect(&mut self, byte: u8) -> Result<(), DescriptorError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(
                format!("expected `{}`, found `{}`", byte as char, b as char),
                self.pos,
            )),
            None => Err(self.error(
                format!("expected `{}`, found end of input", byte as char),
                self.pos,
            )),
        }
    }

    fn descriptor(mut self) -> Result<Descriptor, DescriptorError> {
        self.expect(b'(')?;

        let mut parameters = Vec::new();
        let mut slot: u16 = 0;
        while self.peek() != Some(b')') {
            let start = self.pos;
            if self.peek().is_none() {
                return Err(self.error("unterminated parameter list", start));
            }
            let tag = self.field_type(false)?;
            if slot + tag.width() > MAX_PARAMETER_SLOTS {
                return Err(self.error(
                    format!("parameters exceed {MAX_PARAMETER_SLOTS} slots"),
                    start,
                ));
            }
            parameters.push(Param::new(tag, slot, &self.text[start..self.pos]));
            slot += tag.width();
        }
        self.expect(b')')?;

        let start = self.pos;
        if self.peek().is_none() {
            return Err(self.error("missing return type", start));
        }
        let tag = self.field_type(true)?;
        let return_param = Param::new(tag, 0, &self.text[start..self.pos]);

        if self.pos != self.text.len() {
            return Err(self.error("trailing characters after return type", self.pos));
        }

        Ok(Descriptor {
            text: self.text.to_owned(),
            parameters,
            return_param,
        })
    }

    fn field_type(&mut self, allow_void: bool) -> Result<TypeTag, DescriptorError> {
        let start = self.pos;
        let mut depth = 0usize;
        while self.peek() == Some(b'[') {
            depth += 1;
            self.pos += 1;
        }
        if depth > MAX_ARRAY_DEPTH {
            return Err(self.error(
                format!("array type has more than {MAX_ARRAY_DEPTH} dimensions"),
                start,
            ));
        }

        let code_pos = self.pos;
        let Some(code) = self.peek() else {
            return Err(self.error("missing array element type", code_pos));
        };
        self.pos += 1;

        if code == b'V' {
            if !allow_void {
                return Err(self.error("`V` is only valid as a return type", code_pos));
            }
            if depth > 0 {
                return Err(self.error("array of `V` is not a type", code_pos));
            }
            return Ok(TypeTag::Void);
        }

        let Some(base) = BaseType::from_code(code) else {
            // Report the whole character, which may not be ASCII.
            let found = self.text[code_pos..].chars().next().unwrap_or('?');
            return Err(self.error(format!("unknown type code `{found}`"), code_pos));
        };
        if base == BaseType::Reference {
            self.class_name()?;
        }
        // depth <= MAX_ARRAY_DEPTH, checked above
        Ok(TypeTag::new(base, depth as u8))
    }

    /// Consumes `<internal name>;` after an `L`.
    fn class_name(&mut self) -> Result<(), DescriptorError> {
        let start = self.pos;
        let Some(len) = self.text[start..].find(';') else {
            return Err(self.error("unterminated class name", start - 1));
        };
        let name = &self.text[start..start + len];
        if name.is_empty() {
            return Err(self.error("empty class name", start));
        }
        if let Some(bad) = name.find(['.', '[', '(', ')']) {
            return Err(self.error(
                format!("invalid character in class name `{name}`"),
                start + bad,
            ));
        }
        if name.split('/').any(str::is_empty) {
            return Err(self.error(format!("empty package segment in `{name}`"), start));
        }
        self.pos = start + len + 1;
        Ok(())
    }
}
