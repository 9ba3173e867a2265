//! Class descriptor construction from raw class file bytes.
//!
//! [`DescriptorBuilder`] drives a [`Parser`] through a complete class file: the header, the
//! constant pool, the field records and the method records. Every count is checked against the
//! configured [`DecodeLimits`] before anything is allocated for it, and every constant-pool index
//! is validated against the pool that was just decoded. The builder either returns a complete
//! [`ClassDescriptor`] or an error; it never produces a partially populated class.
//!
//! # Examples
//!
//! ```rust
//! use glr::classfile::{AccessFlags, ClassKind, DescriptorBuilder};
//! use glr::DecodeLimits;
//!
//! let bytes = b"$GLR\x01\x01\x00\x00\x00";
//! let class = DescriptorBuilder::new(bytes, DecodeLimits::default()).build()?;
//!
//! assert_eq!(class.kind, ClassKind::Struct);
//! assert_eq!(class.access, AccessFlags::PUB);
//! assert!(class.fields.is_empty());
//! # Ok::<(), glr::Error>(())
//! ```

use crate::{
    classfile::{
        constpool::ConstantPool,
        descriptor::{AccessFlags, CallKind, ClassDescriptor, ClassKind, Field, Method, TypeRef},
        parser::Parser,
        ACCESS_MASK, CLASS_MAGIC, KIND_SHIFT, MIN_VERSION,
    },
    config::DecodeLimits,
    Error, Result,
};

/// The fixed-size header at the start of every class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassHeader {
    /// Class file version
    pub version: u8,
    /// Class kind
    pub kind: ClassKind,
    /// Class access flags, never empty
    pub access: AccessFlags,
}

impl ClassHeader {
    /// Read and validate the header.
    ///
    /// # Errors
    /// - [`Error::TruncatedInput`] if the buffer is shorter than the header
    /// - [`Error::BadMagic`] if the magic does not match
    /// - [`Error::UnsupportedVersion`] for versions below [`MIN_VERSION`]
    /// - [`Error::BadAccess`] if the access sub-field is empty or has undefined bits
    pub fn read(parser: &mut Parser<'_>) -> Result<ClassHeader> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(parser.read_bytes(4)?);
        if magic != CLASS_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let version = parser.read_u8()?;
        if version < MIN_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                minimum: MIN_VERSION,
            });
        }

        let header = parser.read_u8()?;
        let access = match AccessFlags::from_bits(header & ACCESS_MASK) {
            Some(access) if !access.is_empty() => access,
            _ => return Err(Error::BadAccess(header)),
        };

        // Two bits always map onto one of the four kinds
        let kind = ClassKind::from_repr(header >> KIND_SHIFT).unwrap_or(ClassKind::Struct);

        Ok(ClassHeader {
            version,
            kind,
            access,
        })
    }

    /// The header byte for `kind` and `access`.
    #[must_use]
    pub fn encode_byte(kind: ClassKind, access: AccessFlags) -> u8 {
        ((kind as u8) << KIND_SHIFT) | (access.bits() & ACCESS_MASK)
    }
}

/// Decodes one class file into a [`ClassDescriptor`].
pub struct DescriptorBuilder<'a> {
    parser: Parser<'a>,
    limits: DecodeLimits,
}

impl<'a> DescriptorBuilder<'a> {
    /// Create a builder over `data`.
    #[must_use]
    pub fn new(data: &'a [u8], limits: DecodeLimits) -> Self {
        DescriptorBuilder {
            parser: Parser::new(data),
            limits,
        }
    }

    /// Decode the complete class file.
    ///
    /// # Errors
    /// Returns the first decoding error encountered. See [`crate::Error`] for the decoding
    /// variants; trailing bytes after the last method are reported as [`Error::Malformed`].
    pub fn build(mut self) -> Result<ClassDescriptor> {
        let header = ClassHeader::read(&mut self.parser)?;
        let pool = ConstantPool::read(&mut self.parser, self.limits.max_constants)?;
        let name = class_name(&pool)?;

        let fields = self.read_fields(&pool)?;
        let methods = self.read_methods(&pool)?;

        if self.parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after the last method at offset {}",
                self.parser.remaining(),
                self.parser.pos()
            ));
        }

        Ok(ClassDescriptor {
            kind: header.kind,
            access: header.access,
            version: header.version,
            name,
            fields,
            methods,
            pool,
        })
    }

    fn read_fields(&mut self, pool: &ConstantPool) -> Result<Vec<Field>> {
        let count = self.parser.read_varint()? as usize;
        if count > self.limits.max_fields {
            return Err(Error::FieldCountExceeded {
                count,
                max: self.limits.max_fields,
            });
        }

        // access + name + one-byte tag count + one tag
        let mut fields = Vec::with_capacity(count.min(self.parser.remaining() / 6));
        for _ in 0..count {
            fields.push(self.read_field(pool)?);
        }

        Ok(fields)
    }

    fn read_field(&mut self, pool: &ConstantPool) -> Result<Field> {
        let access = self.read_member_access()?;
        let name = self.read_name(pool)?;

        let offset = self.parser.pos();
        let tags = self.read_type(pool)?;
        if tags.is_empty() {
            return Err(malformed_error!("Field type at offset {} has no tags", offset));
        }

        Ok(Field {
            access,
            name,
            ty: TypeRef::from_tags(tags),
        })
    }

    fn read_methods(&mut self, pool: &ConstantPool) -> Result<Vec<Method>> {
        let count = self.parser.read_varint()? as usize;
        if count > self.limits.max_methods {
            return Err(Error::MethodCountExceeded {
                count,
                max: self.limits.max_methods,
            });
        }

        // access + call kind + name + tag count + body length
        let mut methods = Vec::with_capacity(count.min(self.parser.remaining() / 9));
        for _ in 0..count {
            methods.push(self.read_method(pool)?);
        }

        Ok(methods)
    }

    fn read_method(&mut self, pool: &ConstantPool) -> Result<Method> {
        let access = self.read_member_access()?;

        let call_kind = self.parser.read_u8()?;
        let Some(call_kind) = CallKind::from_repr(call_kind) else {
            return Err(Error::UnknownCallKind(call_kind));
        };

        let name = self.read_name(pool)?;
        let args = TypeRef::from_tags(self.read_type(pool)?);

        let body_len = self.parser.read_u32()? as usize;
        let body = self.parser.read_bytes(body_len)?;

        Ok(Method {
            access,
            call_kind,
            name,
            args,
            body: body.into(),
        })
    }

    fn read_member_access(&mut self) -> Result<AccessFlags> {
        let offset = self.parser.pos();
        let access = self.parser.read_u8()?;
        AccessFlags::from_bits(access).ok_or_else(|| {
            malformed_error!(
                "Member access 0x{:02X} at offset {} has undefined bits",
                access,
                offset
            )
        })
    }

    fn read_name(&mut self, pool: &ConstantPool) -> Result<u16> {
        let index = self.parser.read_u16()?;
        pool.expect_str(index)?;
        Ok(index)
    }

    fn read_type(&mut self, pool: &ConstantPool) -> Result<Vec<u16>> {
        let count = self.parser.read_varint()? as usize;

        let mut tags = Vec::with_capacity(count.min(self.parser.remaining() / 2));
        for _ in 0..count {
            let tag = self.parser.read_u16()?;
            pool.check_index(tag)?;
            tags.push(tag);
        }

        Ok(tags)
    }
}

/// The class name stored at constant 0, or the empty name for an empty pool.
fn class_name(pool: &ConstantPool) -> Result<String> {
    if pool.is_empty() {
        return Ok(String::new());
    }

    Ok(pool.expect_str(0)?.to_owned())
}

impl ClassDescriptor {
    /// Decode a class descriptor from `data` using `limits`.
    ///
    /// # Errors
    /// See [`DescriptorBuilder::build`].
    pub fn from_bytes(data: &[u8], limits: DecodeLimits) -> Result<ClassDescriptor> {
        DescriptorBuilder::new(data, limits).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::constpool::Constant;
    use crate::test::{minimal_class, sample_class_bytes};

    fn build(data: &[u8]) -> Result<ClassDescriptor> {
        DescriptorBuilder::new(data, DecodeLimits::default()).build()
    }

    #[test]
    fn minimal_struct() {
        let class = build(&minimal_class()).unwrap();
        assert_eq!(class.kind, ClassKind::Struct);
        assert_eq!(class.access, AccessFlags::PUB);
        assert_eq!(class.version, 1);
        assert!(class.is_anonymous());
        assert!(class.pool.is_empty());
        assert!(class.fields.is_empty());
        assert!(class.methods.is_empty());
    }

    #[test]
    fn header_kinds() {
        for (byte, kind) in [
            (0x01, ClassKind::Struct),
            (0x41, ClassKind::Enum),
            (0x83, ClassKind::Trait),
            (0xC5, ClassKind::Module),
        ] {
            let data = [b'$', b'G', b'L', b'R', 1, byte];
            let header = ClassHeader::read(&mut Parser::new(&data)).unwrap();
            assert_eq!(header.kind, kind);
            assert_eq!(ClassHeader::encode_byte(header.kind, header.access), byte);
        }
    }

    #[test]
    fn header_errors() {
        assert!(matches!(
            build(b"XGLR\x01\x01\x00\x00\x00"),
            Err(Error::BadMagic(magic)) if &magic == b"XGLR"
        ));
        assert!(matches!(
            build(b"$GLR\x00\x01\x00\x00\x00"),
            Err(Error::UnsupportedVersion { found: 0, minimum: 1 })
        ));
        assert!(matches!(
            build(b"$GLR\x01\x40\x00\x00\x00"),
            Err(Error::BadAccess(0x40))
        ));
        assert!(matches!(
            build(b"$GLR\x01\x09\x00\x00\x00"),
            Err(Error::BadAccess(0x09))
        ));
        assert!(matches!(build(b"$GL"), Err(Error::TruncatedInput { .. })));
    }

    #[test]
    fn sample_class() {
        let class = build(&sample_class_bytes()).unwrap();
        assert_eq!(class.name(), "Point");
        assert_eq!(class.kind, ClassKind::Struct);
        assert_eq!(class.access, AccessFlags::PUB | AccessFlags::CONST);

        assert_eq!(class.fields.len(), 2);
        let x = class.field("x").unwrap();
        assert_eq!(class.pool.get_str(usize::from(x.ty.tags()[0])), Some("f64"));

        let length = class.method("length").unwrap();
        assert_eq!(length.call_kind, CallKind::Call);
        assert!(length.args.is_empty());
        assert_eq!(&*length.body, &[0x01, 0x02, 0x00]);

        let scale = class.method("scale").unwrap();
        assert_eq!(scale.call_kind, CallKind::VirtualCall);
        let names: Vec<_> = scale.args.names(&class.pool).flatten().collect();
        assert_eq!(names, vec!["Point", "f64"]);
    }

    #[test]
    fn trailing_bytes() {
        let mut data = minimal_class();
        data.push(0x00);
        assert!(matches!(build(&data), Err(Error::Malformed { .. })));
    }

    #[test]
    fn non_string_class_name() {
        let mut data = b"$GLR\x01\x01\x01\x00".to_vec();
        data.extend_from_slice(&7i64.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x00]);

        assert!(matches!(
            build(&data),
            Err(Error::ConstantTypeMismatch {
                index: 0,
                expected: "utf8",
                found: "i64"
            })
        ));
    }

    #[test]
    fn field_errors() {
        let pool = |data: &mut Vec<u8>| {
            data.extend_from_slice(b"$GLR\x01\x01\x02");
            data.extend_from_slice(&[0x03, 0x01, 0x00, 0x00, 0x00, b'A']);
            data.extend_from_slice(&[0x00]);
            data.extend_from_slice(&1i64.to_le_bytes());
        };

        // name index past the pool
        let mut data = Vec::new();
        pool(&mut data);
        data.extend_from_slice(&[0x01, 0x01, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            build(&data),
            Err(Error::ConstantIndexOutOfRange { index: 5, len: 2 })
        ));

        // name index refers to an integer
        let mut data = Vec::new();
        pool(&mut data);
        data.extend_from_slice(&[0x01, 0x01, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            build(&data),
            Err(Error::ConstantTypeMismatch { index: 1, .. })
        ));

        // empty field type
        let mut data = Vec::new();
        pool(&mut data);
        data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(build(&data), Err(Error::Malformed { .. })));

        // type tag past the pool
        let mut data = Vec::new();
        pool(&mut data);
        data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x09, 0x00, 0x00]);
        assert!(matches!(
            build(&data),
            Err(Error::ConstantIndexOutOfRange { index: 9, len: 2 })
        ));

        // undefined member access bits
        let mut data = Vec::new();
        pool(&mut data);
        data.extend_from_slice(&[0x01, 0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(build(&data), Err(Error::Malformed { .. })));
    }

    #[test]
    fn unknown_call_kind() {
        let mut data = b"$GLR\x01\x01\x01\x03\x01\x00\x00\x00m".to_vec();
        data.extend_from_slice(&[0x00, 0x01, 0x00, 0x04, 0x00, 0x00]);
        assert!(matches!(build(&data), Err(Error::UnknownCallKind(4))));
    }

    #[test]
    fn count_limits() {
        let limits = DecodeLimits::default()
            .with_max_fields(1)
            .with_max_methods(0);

        let data = b"$GLR\x01\x01\x00\x02";
        assert!(matches!(
            DescriptorBuilder::new(data, limits).build(),
            Err(Error::FieldCountExceeded { count: 2, max: 1 })
        ));

        let data = b"$GLR\x01\x01\x00\x00\x01";
        assert!(matches!(
            DescriptorBuilder::new(data, limits).build(),
            Err(Error::MethodCountExceeded { count: 1, max: 0 })
        ));

        let data = b"$GLR\x01\x01\x02";
        assert!(matches!(
            DescriptorBuilder::new(data, limits.with_max_constants(1)).build(),
            Err(Error::ConstantPoolTooLarge { count: 2, max: 1 })
        ));
    }

    #[test]
    fn hostile_counts_do_not_allocate() {
        // 2^32-1 fields declared, nothing behind them
        let data = b"$GLR\x01\x01\x00\xFF\xFF\xFF\xFF\x0F";
        assert!(matches!(
            DescriptorBuilder::new(data, DecodeLimits::unlimited()).build(),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn from_bytes_matches_builder() {
        let data = sample_class_bytes();
        let class = ClassDescriptor::from_bytes(&data, DecodeLimits::default()).unwrap();
        assert_eq!(class, build(&data).unwrap());
        assert_eq!(class.pool.get(0), Some(&Constant::Str("Point".to_string())));
    }
}
