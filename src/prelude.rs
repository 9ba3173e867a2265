//! # glr Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the glr
//! library. Import it to get quick access to everything needed for loading and inspecting classes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all glr operations
pub use crate::Error;

/// The result type used throughout glr
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Class loader and resolution results
pub use crate::loader::{ClassLoader, ResolvedType};

/// Loader, decoder and registry configuration
pub use crate::config::{DecodeLimits, LoaderConfig, RegistryConfig};

// ================================================================================================
// Class Model
// ================================================================================================

/// Decoded classes and their members
pub use crate::classfile::{
    AccessFlags, CallKind, ClassDescriptor, ClassKind, Field, Method, TypeRef,
};

/// Constant pool
pub use crate::classfile::{Constant, ConstantPool, ConstantTag};

/// Encoding and decoding
pub use crate::classfile::{ClassFileWriter, DescriptorBuilder, Parser};

/// Bytecode opcode table
pub use crate::classfile::opcodes::{Instruction, Op};

// ================================================================================================
// Registry and Memory
// ================================================================================================

/// Registered classes
pub use crate::registry::{ClassHandle, ClassId, ClassRegistry, RegistryStats};

/// Page mapping
pub use crate::memory::{PageMapper, SystemPages, VirtualArena};
