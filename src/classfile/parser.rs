//! Bounds-checked byte cursor for class file decoding.
//!
//! This module provides the [`crate::classfile::parser::Parser`] type, a cursor over an
//! immutable, caller-owned byte slice. Every read validates that enough bytes remain before the
//! end of the slice and advances the position by exactly the width of the value read; a read
//! that cannot be satisfied fails with [`crate::Error::TruncatedInput`] and never touches bytes
//! past the end.
//!
//! # Key Components
//!
//! ## Fixed-Width Reads
//! - [`Parser::read_u8`], [`Parser::read_u16`], [`Parser::read_u32`], [`Parser::read_u64`]
//! - [`Parser::read_i32`], [`Parser::read_i64`]
//! - [`Parser::read_f32`], [`Parser::read_f64`]
//!
//! ## Variable-Length Reads
//! - [`Parser::read_varint`] - LEB128 encoded counts
//! - [`Parser::read_bytes`] - Borrowed byte runs
//!
//! # Examples
//!
//! ```rust
//! use glr::Parser;
//!
//! let data = [0x2A, 0x01, 0x00, 0x96, 0x01];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_u8()?, 42);
//! assert_eq!(parser.read_u16()?, 1);
//! assert_eq!(parser.read_varint()?, 150);
//! assert!(!parser.has_more_data());
//! # Ok::<(), glr::Error>(())
//! ```

use crate::{
    classfile::io::{read_le_at, ClassIO},
    Result,
};

/// A cursor-based parser over a borrowed byte slice.
///
/// The parser never owns its buffer. Borrowed results such as [`Parser::read_bytes`] share the
/// buffer's lifetime `'a`; anything that must outlive the buffer has to be copied by the caller.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if at least one unread byte remains.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Current read position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read a little-endian value of any [`ClassIO`] type.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than `size_of::<T>()` bytes remain.
    pub fn read_le<T: ClassIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] at the end of the buffer.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_le()
    }

    /// Read a little-endian `u16`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_le()
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_le()
    }

    /// Read a little-endian `u64`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_le()
    }

    /// Read a little-endian `i32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_le()
    }

    /// Read a little-endian `i64`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_le()
    }

    /// Read a little-endian IEEE 754 `f32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_le()
    }

    /// Read a little-endian IEEE 754 `f64`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_le()
    }

    /// Read an unsigned LEB128 integer of at most 32 bits.
    ///
    /// Each byte carries 7 value bits; the high bit marks a continuation.
    ///
    /// # Errors
    /// - [`crate::Error::TruncatedInput`] if the buffer ends inside the encoding
    /// - [`crate::Error::Malformed`] if the encoding does not fit into 32 bits
    pub fn read_varint(&mut self) -> Result<u32> {
        let start = self.position;
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7F);

            if shift == 28 && bits > 0x0F {
                return Err(malformed_error!(
                    "Varint at offset {} overflows 32 bits",
                    start
                ));
            }

            value |= bits << shift;

            if (byte & 0x80) == 0 {
                return Ok(value);
            }

            shift += 7;
            if shift > 28 {
                return Err(malformed_error!(
                    "Varint at offset {} is longer than 5 bytes",
                    start
                ));
            }
        }
    }

    /// Borrow the next `length` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if length > available {
            return Err(truncated_error!(self.position, length, available));
        }

        let bytes = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }
}
