//! Class file format: decoding, model and encoding.
//!
//! A class file is a little-endian byte stream describing one struct, enum, trait or module:
//!
//! ```text
//! offset  size    field
//! 0       4       magic "$GLR"
//! 4       1       version
//! 5       1       header: bits 0..=5 access, bits 6..=7 kind
//! 6       varint  constant pool count, then entries
//! ...     varint  field count, then { u8 access, u16 name, type }
//! ...     varint  method count, then { u8 access, u8 call kind, u16 name, type,
//!                                      u32 body length, body }
//! type:   varint tag count, then count × u16 constant pool index
//! ```
//!
//! # Key Components
//!
//! - [`parser::Parser`] - Bounds-checked cursor every decoder reads through
//! - [`constpool::ConstantPool`] - Typed constants referenced by index
//! - [`builder::DescriptorBuilder`] - Decodes a complete file into a [`ClassDescriptor`]
//! - [`writer::ClassFileWriter`] - Encodes class files
//! - [`opcodes`] - The bytecode opcode table

pub mod builder;
pub mod constpool;
pub mod descriptor;
pub mod io;
pub mod opcodes;
pub mod parser;
pub mod writer;

pub use builder::{ClassHeader, DescriptorBuilder};
pub use constpool::{Constant, ConstantPool, ConstantTag};
pub use descriptor::{AccessFlags, CallKind, ClassDescriptor, ClassKind, Field, Method, TypeRef};
pub use parser::Parser;
pub use writer::ClassFileWriter;

/// Magic bytes every class file starts with.
pub const CLASS_MAGIC: [u8; 4] = *b"$GLR";

/// Oldest class file version the loader accepts.
pub const MIN_VERSION: u8 = 1;

/// Version written by [`ClassFileWriter`].
pub const CURRENT_VERSION: u8 = 1;

/// Mask of the access sub-field in the header byte.
pub const ACCESS_MASK: u8 = 0x3F;

/// Position of the kind sub-field in the header byte.
pub const KIND_SHIFT: u8 = 6;
