//! Endian-aware primitive reads and writes for the class file format.
//!
//! All multi-byte values in a class file are little-endian. [`ClassIO`] abstracts over the
//! fixed-width primitives the format uses so that [`read_le_at`] and [`write_le`] can be written
//! once for every width.
//!
//! # Examples
//!
//! ```rust,ignore
//! use glr::classfile::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00]; // Two u16 values: 1, 2
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;
//! assert_eq!(first, 1);
//! assert_eq!(offset, 2);
//! # Ok::<(), glr::Error>(())
//! ```

use crate::Result;

/// Trait for fixed-width primitives that can be read from and written to a class file.
///
/// Implemented for `u8`, `u16`, `u32`, `u64`, `i8`, `i16`, `i32`, `i64`, `f32` and `f64`.
pub trait ClassIO: Sized + Copy {
    /// Byte array representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode the value from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode the value as little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_class_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    f32 => 4,
    u64 => 8,
    i64 => 8,
    f64 => 8,
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by `size_of::<T>()` on success and left untouched on failure.
///
/// # Errors
///
/// Returns [`crate::Error::TruncatedInput`] if fewer than `size_of::<T>()` bytes remain after
/// `offset`.
pub fn read_le_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let available = data.len().saturating_sub(*offset);
    if type_len > available {
        return Err(truncated_error!(*offset, type_len, available));
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(truncated_error!(*offset, type_len, available));
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Appends `value` to `buffer` in little-endian byte order.
pub fn write_le<T: ClassIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Appends `value` to `buffer` as an unsigned LEB128 integer.
pub fn write_varint(buffer: &mut Vec<u8>, mut value: u32) {
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let byte = (value & 0x7F) as u8;
        value >>= 7;

        if value == 0 {
            buffer.push(byte);
            return;
        }

        buffer.push(byte | 0x80);
    }
}
