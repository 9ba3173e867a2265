//! Constant pool decoding and typed access.
//!
//! Every class file carries a constant pool: an ordered, 0-indexed table of literal values that
//! field and method records reference by index for names, type names and literal operands.
//!
//! # Wire Format
//!
//! ```text
//! varint count
//! count × { u8 tag, payload }
//!   tag 0 (i64)  -> 8 bytes
//!   tag 1 (u64)  -> 8 bytes
//!   tag 2 (f64)  -> 8 bytes
//!   tag 3 (utf8) -> u32 length, length bytes
//! ```
//!
//! String payloads are copied out of the source buffer, so a loaded pool never borrows from the
//! bytes it was decoded from.

use std::fmt;

use strum::{Display, EnumCount, EnumIter, FromRepr, IntoStaticStr};

use crate::{classfile::parser::Parser, Error, Result};

/// Tag byte identifying the payload of a constant pool entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display, IntoStaticStr,
)]
#[repr(u8)]
pub enum ConstantTag {
    /// Signed 64-bit integer
    #[strum(serialize = "i64")]
    Int64 = 0,
    /// Unsigned 64-bit integer
    #[strum(serialize = "u64")]
    UInt64 = 1,
    /// IEEE 754 double precision float
    #[strum(serialize = "f64")]
    Float64 = 2,
    /// Length-prefixed UTF-8 string
    #[strum(serialize = "utf8")]
    Utf8 = 3,
}

/// A single constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Signed 64-bit integer literal
    Int(i64),
    /// Unsigned 64-bit integer literal
    UInt(u64),
    /// 64-bit floating point literal
    Float(f64),
    /// Owned UTF-8 text, used for names and string literals
    Str(String),
}

impl Constant {
    /// The tag this constant is encoded with.
    #[must_use]
    pub fn tag(&self) -> ConstantTag {
        match self {
            Constant::Int(_) => ConstantTag::Int64,
            Constant::UInt(_) => ConstantTag::UInt64,
            Constant::Float(_) => ConstantTag::Float64,
            Constant::Str(_) => ConstantTag::Utf8,
        }
    }

    /// Short kind name used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.tag().into()
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{value}i64"),
            Constant::UInt(value) => write!(f, "{value}u64"),
            Constant::Float(value) => write!(f, "{value}f64"),
            Constant::Str(text) => write!(f, "{text:?}"),
        }
    }
}

/// The constant pool of one class.
///
/// Immutable once loaded; owned by the class descriptor it was decoded for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Decode a constant pool from the current parser position.
    ///
    /// # Arguments
    /// * `parser` - Cursor positioned at the pool's count
    /// * `max_entries` - Largest entry count accepted
    ///
    /// # Errors
    /// - [`Error::ConstantPoolTooLarge`] if the declared count exceeds `max_entries`
    /// - [`Error::UnknownConstantTag`] for tags outside the known set
    /// - [`Error::TruncatedInput`] if the buffer ends inside the pool
    /// - [`Error::Malformed`] if a string payload is not valid UTF-8
    pub fn read(parser: &mut Parser<'_>, max_entries: usize) -> Result<ConstantPool> {
        let count = parser.read_varint()? as usize;
        if count > max_entries {
            return Err(Error::ConstantPoolTooLarge {
                count,
                max: max_entries,
            });
        }

        // Smallest possible entry is a tag plus a 4 byte length
        let mut entries = Vec::with_capacity(count.min(parser.remaining() / 5));
        for index in 0..count {
            entries.push(Self::read_entry(parser, index)?);
        }

        Ok(ConstantPool { entries })
    }

    fn read_entry(parser: &mut Parser<'_>, index: usize) -> Result<Constant> {
        let tag = parser.read_u8()?;
        match ConstantTag::from_repr(tag) {
            Some(ConstantTag::Int64) => Ok(Constant::Int(parser.read_i64()?)),
            Some(ConstantTag::UInt64) => Ok(Constant::UInt(parser.read_u64()?)),
            Some(ConstantTag::Float64) => Ok(Constant::Float(parser.read_f64()?)),
            Some(ConstantTag::Utf8) => {
                let start = parser.pos();
                let length = parser.read_u32()? as usize;
                let bytes = parser.read_bytes(length)?;
                let text = std::str::from_utf8(bytes).map_err(|error| {
                    malformed_error!(
                        "Invalid UTF-8 string constant {} at offset {}: {}",
                        index,
                        start,
                        error
                    )
                })?;
                Ok(Constant::Str(text.to_owned()))
            }
            None => Err(Error::UnknownConstantTag { index, tag }),
        }
    }

    /// Build a pool directly from entries.
    #[must_use]
    pub fn from_entries(entries: Vec<Constant>) -> Self {
        ConstantPool { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Constant> {
        self.entries.get(index)
    }

    /// All entries in pool order.
    #[must_use]
    pub fn as_slice(&self) -> &[Constant] {
        &self.entries
    }

    /// Iterate entries in pool order.
    pub fn iter(&self) -> std::slice::Iter<'_, Constant> {
        self.entries.iter()
    }

    /// The signed integer at `index`, if that entry is one.
    #[must_use]
    pub fn get_int(&self, index: usize) -> Option<i64> {
        match self.entries.get(index) {
            Some(&Constant::Int(value)) => Some(value),
            _ => None,
        }
    }

    /// The unsigned integer at `index`, if that entry is one.
    #[must_use]
    pub fn get_uint(&self, index: usize) -> Option<u64> {
        match self.entries.get(index) {
            Some(&Constant::UInt(value)) => Some(value),
            _ => None,
        }
    }

    /// The float at `index`, if that entry is one.
    #[must_use]
    pub fn get_float(&self, index: usize) -> Option<f64> {
        match self.entries.get(index) {
            Some(&Constant::Float(value)) => Some(value),
            _ => None,
        }
    }

    /// The string at `index`, if that entry is one.
    #[must_use]
    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.entries.get(index) {
            Some(Constant::Str(text)) => Some(text),
            _ => None,
        }
    }

    /// Validate that `index` addresses an entry of this pool.
    ///
    /// # Errors
    /// Returns [`Error::ConstantIndexOutOfRange`] if it does not.
    pub fn check_index(&self, index: u16) -> Result<()> {
        if usize::from(index) < self.entries.len() {
            Ok(())
        } else {
            Err(Error::ConstantIndexOutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }

    /// Resolve `index` to a string constant.
    ///
    /// # Errors
    /// - [`Error::ConstantIndexOutOfRange`] if `index` is past the end of the pool
    /// - [`Error::ConstantTypeMismatch`] if the entry is not a string
    pub fn expect_str(&self, index: u16) -> Result<&str> {
        self.check_index(index)?;
        match &self.entries[usize::from(index)] {
            Constant::Str(text) => Ok(text),
            other => Err(Error::ConstantTypeMismatch {
                index: usize::from(index),
                expected: "utf8",
                found: other.kind_name(),
            }),
        }
    }
}

impl<'a> IntoIterator for &'a ConstantPool {
    type Item = &'a Constant;
    type IntoIter = std::slice::Iter<'a, Constant>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
