//! In-memory class descriptor model.
//!
//! A [`ClassDescriptor`] is the loaded form of one class file: its kind and access, its name,
//! the fields in declaration order, the methods in declaration order and the constant pool all
//! of them index into. A descriptor owns everything it refers to, so it can be stored, moved
//! and dropped as a single unit.
//!
//! Type references name other classes through constant-pool strings rather than pointers;
//! resolving them to loaded classes happens lazily through
//! [`crate::ClassLoader::resolve_type`].

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::classfile::constpool::ConstantPool;

/// Kind of a class, stored in the top two bits of the class header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[repr(u8)]
pub enum ClassKind {
    /// Product type with fields
    #[strum(serialize = "struct")]
    Struct = 0,
    /// Sum type
    #[strum(serialize = "enum")]
    Enum = 1,
    /// Interface of methods
    #[strum(serialize = "trait")]
    Trait = 2,
    /// Namespace of functions and statics
    #[strum(serialize = "module")]
    Module = 3,
}

bitflags! {
    /// Access flags of a class, field or method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u8 {
        /// Visible outside the defining module
        const PUB = 0x01;
        /// Immutable after construction
        const CONST = 0x02;
        /// Belongs to the class rather than an instance
        const STATIC = 0x04;
    }
}

/// How the interpreter dispatches a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[repr(u8)]
pub enum CallKind {
    /// Regular interpreted call
    #[strum(serialize = "call")]
    Call = 0,
    /// Interpreted tail call
    #[strum(serialize = "tcall")]
    TailCall = 1,
    /// Interpreted virtual call
    #[strum(serialize = "vcall")]
    VirtualCall = 2,
    /// Call into jitted code
    #[strum(serialize = "jcall")]
    JitCall = 3,
}

/// A type reference: constant-pool indices of type names.
///
/// Plain fields and parameters carry a single tag; generic or union typed members carry a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// One type name
    Single(u16),
    /// An ordered chain of type names, possibly empty for argument lists
    Chain(Vec<u16>),
}

impl TypeRef {
    /// Build a reference from decoded tags; a single tag becomes [`TypeRef::Single`].
    #[must_use]
    pub fn from_tags(mut tags: Vec<u16>) -> Self {
        if tags.len() == 1 {
            TypeRef::Single(tags.remove(0))
        } else {
            TypeRef::Chain(tags)
        }
    }

    /// The tags of this reference in order.
    #[must_use]
    pub fn tags(&self) -> &[u16] {
        match self {
            TypeRef::Single(tag) => std::slice::from_ref(tag),
            TypeRef::Chain(tags) => tags,
        }
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags().len()
    }

    /// Returns `true` for an empty chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags().is_empty()
    }

    /// Type names of this reference, looked up in `pool`.
    ///
    /// Tags that do not refer to a string constant yield `None`.
    pub fn names<'p>(&'p self, pool: &'p ConstantPool) -> impl Iterator<Item = Option<&'p str>> {
        self.tags()
            .iter()
            .map(move |tag| pool.get_str(usize::from(*tag)))
    }
}

/// A field record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Access flags
    pub access: AccessFlags,
    /// Constant-pool index of the field name
    pub name: u16,
    /// Declared type
    pub ty: TypeRef,
}

/// A method record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Access flags
    pub access: AccessFlags,
    /// Dispatch kind
    pub call_kind: CallKind,
    /// Constant-pool index of the method name
    pub name: u16,
    /// Argument types in declaration order
    pub args: TypeRef,
    /// Opaque bytecode body
    pub body: Box<[u8]>,
}

/// A fully decoded class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    /// Class kind from the header byte
    pub kind: ClassKind,
    /// Class access from the header byte
    pub access: AccessFlags,
    /// Class file version
    pub version: u8,
    /// Class name, empty for anonymous classes
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    /// Methods in declaration order
    pub methods: Vec<Method>,
    /// Constant pool the records index into
    pub pool: ConstantPool,
}

impl ClassDescriptor {
    /// The class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the class was loaded without a name.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Name of a field, resolved through the constant pool.
    #[must_use]
    pub fn field_name(&self, field: &Field) -> Option<&str> {
        self.pool.get_str(usize::from(field.name))
    }

    /// Name of a method, resolved through the constant pool.
    #[must_use]
    pub fn method_name(&self, method: &Method) -> Option<&str> {
        self.pool.get_str(usize::from(method.name))
    }

    /// First field called `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| self.field_name(field) == Some(name))
    }

    /// First method called `name`.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| self.method_name(method) == Some(name))
    }
}
