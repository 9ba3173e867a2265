//! Class file encoder.
//!
//! [`ClassFileWriter`] produces the binary class file layout that [`crate::ClassLoader`]
//! consumes. Compilers emitting classes for the runtime use it, and so do the round-trip tests and
//! benchmarks of this crate. String constants are interned, so repeated names and type names
//! share a single pool entry.
//!
//! # Examples
//!
//! ```rust
//! use glr::classfile::{AccessFlags, CallKind, ClassFileWriter, ClassKind};
//! use glr::{ClassLoader, LoaderConfig};
//!
//! let mut writer = ClassFileWriter::named("Counter", ClassKind::Struct, AccessFlags::PUB);
//! writer
//!     .field(AccessFlags::empty(), "value", &["u64"])?
//!     .method(AccessFlags::PUB, CallKind::Call, "increment", &[], &[0x00])?;
//!
//! let loader = ClassLoader::new(LoaderConfig::default())?;
//! let class = loader.load_class(&writer.build())?;
//! assert_eq!(class.name(), "Counter");
//! assert_eq!(class.fields.len(), 1);
//! # Ok::<(), glr::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    classfile::{
        builder::ClassHeader,
        constpool::Constant,
        descriptor::{AccessFlags, CallKind, ClassKind},
        io::{write_le, write_varint},
        CLASS_MAGIC, CURRENT_VERSION,
    },
    Error, Result,
};

/// Largest number of entries a constant pool can hold with 16-bit indices.
const MAX_POOL_ENTRIES: usize = 1 << 16;

struct FieldRecord {
    access: AccessFlags,
    name: u16,
    types: Vec<u16>,
}

struct MethodRecord {
    access: AccessFlags,
    call_kind: CallKind,
    name: u16,
    args: Vec<u16>,
    body: Vec<u8>,
}

/// Builder for binary class files.
pub struct ClassFileWriter {
    version: u8,
    header: u8,
    constants: Vec<Constant>,
    strings: HashMap<String, u16>,
    fields: Vec<FieldRecord>,
    methods: Vec<MethodRecord>,
}

impl ClassFileWriter {
    /// Create a writer for an anonymous class.
    ///
    /// Constant 0 names the class, so the first constant added to an anonymous writer is
    /// preceded by an empty string at index 0.
    #[must_use]
    pub fn new(kind: ClassKind, access: AccessFlags) -> Self {
        ClassFileWriter {
            version: CURRENT_VERSION,
            header: ClassHeader::encode_byte(kind, access),
            constants: Vec::new(),
            strings: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Create a writer for a class called `name`; the name occupies constant 0.
    #[must_use]
    pub fn named(name: &str, kind: ClassKind, access: AccessFlags) -> Self {
        let mut writer = Self::new(kind, access);
        writer.strings.insert(name.to_owned(), 0);
        writer.constants.push(Constant::Str(name.to_owned()));
        writer
    }

    /// Override the class file version.
    pub fn version(&mut self, version: u8) -> &mut Self {
        self.version = version;
        self
    }

    /// Append a constant and return its index. Constants are not deduplicated.
    ///
    /// # Errors
    /// - [`Error::ConstantPoolTooLarge`] if the pool is already full
    /// - [`Error::Malformed`] for strings longer than `u32::MAX` bytes
    pub fn constant(&mut self, constant: Constant) -> Result<u16> {
        if self.constants.is_empty() {
            self.constants.push(Constant::Str(String::new()));
            self.strings.insert(String::new(), 0);
        }

        let Ok(index) = u16::try_from(self.constants.len()) else {
            return Err(Error::ConstantPoolTooLarge {
                count: self.constants.len() + 1,
                max: MAX_POOL_ENTRIES,
            });
        };

        if let Constant::Str(text) = &constant {
            if u32::try_from(text.len()).is_err() {
                return Err(malformed_error!(
                    "String constant of {} bytes does not fit a u32 length",
                    text.len()
                ));
            }
        }

        self.constants.push(constant);
        Ok(index)
    }

    /// Intern `text` and return the index of its string constant.
    ///
    /// # Errors
    /// See [`ClassFileWriter::constant`].
    pub fn string(&mut self, text: &str) -> Result<u16> {
        if let Some(&index) = self.strings.get(text) {
            return Ok(index);
        }

        let index = self.constant(Constant::Str(text.to_owned()))?;
        self.strings.insert(text.to_owned(), index);
        Ok(index)
    }

    /// Append a field called `name` of type `types`.
    ///
    /// # Errors
    /// - See [`ClassFileWriter::constant`]
    /// - [`Error::Malformed`] if `types` is empty
    pub fn field(&mut self, access: AccessFlags, name: &str, types: &[&str]) -> Result<&mut Self> {
        if types.is_empty() {
            return Err(malformed_error!("Field '{}' needs at least one type", name));
        }

        let name = self.string(name)?;
        let types = self.strings_of(types)?;

        self.fields.push(FieldRecord {
            access,
            name,
            types,
        });
        Ok(self)
    }

    /// Append a method called `name` taking `args`, with the opaque bytecode `body`.
    ///
    /// # Errors
    /// - See [`ClassFileWriter::constant`]
    /// - [`Error::Malformed`] for bodies longer than `u32::MAX` bytes
    pub fn method(
        &mut self,
        access: AccessFlags,
        call_kind: CallKind,
        name: &str,
        args: &[&str],
        body: &[u8],
    ) -> Result<&mut Self> {
        if u32::try_from(body.len()).is_err() {
            return Err(malformed_error!(
                "Method body of {} bytes does not fit a u32 length",
                body.len()
            ));
        }

        let name = self.string(name)?;
        let args = self.strings_of(args)?;

        self.methods.push(MethodRecord {
            access,
            call_kind,
            name,
            args,
            body: body.to_vec(),
        });
        Ok(self)
    }

    /// Number of constants written so far.
    #[must_use]
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Encode the class file.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(64);

        buffer.extend_from_slice(&CLASS_MAGIC);
        write_le(&mut buffer, self.version);
        write_le(&mut buffer, self.header);

        write_count(&mut buffer, self.constants.len());
        for constant in &self.constants {
            write_le(&mut buffer, constant.tag() as u8);
            match constant {
                Constant::Int(value) => write_le(&mut buffer, *value),
                Constant::UInt(value) => write_le(&mut buffer, *value),
                Constant::Float(value) => write_le(&mut buffer, *value),
                Constant::Str(text) => {
                    write_count_u32(&mut buffer, text.len());
                    buffer.extend_from_slice(text.as_bytes());
                }
            }
        }

        write_count(&mut buffer, self.fields.len());
        for field in &self.fields {
            write_le(&mut buffer, field.access.bits());
            write_le(&mut buffer, field.name);
            write_tags(&mut buffer, &field.types);
        }

        write_count(&mut buffer, self.methods.len());
        for method in &self.methods {
            write_le(&mut buffer, method.access.bits());
            write_le(&mut buffer, method.call_kind as u8);
            write_le(&mut buffer, method.name);
            write_tags(&mut buffer, &method.args);
            write_count_u32(&mut buffer, method.body.len());
            buffer.extend_from_slice(&method.body);
        }

        buffer
    }

    fn strings_of(&mut self, names: &[&str]) -> Result<Vec<u16>> {
        names.iter().map(|name| self.string(name)).collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_count(buffer: &mut Vec<u8>, count: usize) {
    write_varint(buffer, count as u32);
}

#[allow(clippy::cast_possible_truncation)]
fn write_count_u32(buffer: &mut Vec<u8>, count: usize) {
    write_le(buffer, count as u32);
}

fn write_tags(buffer: &mut Vec<u8>, tags: &[u16]) {
    write_count(buffer, tags.len());
    for tag in tags {
        write_le(buffer, *tag);
    }
}
