use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! truncated_error {
    ($offset:expr, $needed:expr, $available:expr) => {
        crate::Error::TruncatedInput {
            offset: $offset,
            needed: $needed,
            available: $available,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every error is recoverable by the caller: a failed [`crate::ClassLoader::load_class`] never
/// registers a partial class, and a failed registry growth leaves the registry in its last
/// consistent state.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::TruncatedInput`] - Fewer bytes remained than a read required
/// - [`Error::BadMagic`] - The buffer does not start with the class file magic
/// - [`Error::UnsupportedVersion`] - Class file version below the supported minimum
/// - [`Error::BadAccess`] - Class header carries no (or undefined) access bits
/// - [`Error::UnknownConstantTag`] - Constant pool entry with an unknown tag
/// - [`Error::ConstantIndexOutOfRange`] - Field/method index past the constant pool
/// - [`Error::ConstantTypeMismatch`] - Index refers to a constant of the wrong kind
/// - [`Error::ConstantPoolTooLarge`] - Declared pool size above the configured maximum
/// - [`Error::FieldCountExceeded`] / [`Error::MethodCountExceeded`] - Member caps exceeded
/// - [`Error::UnknownCallKind`] - Method record with an undefined call kind
/// - [`Error::Malformed`] - Any other structural damage
///
/// ## Registry Errors
/// - [`Error::DuplicateClass`] - A class with this name is already registered
/// - [`Error::RegistryFull`] - Probing exhausted the slot array (internal invariant failure)
/// - [`Error::LockError`] - The registry lock was poisoned
///
/// ## Resource Errors
/// - [`Error::ReservationFailed`] - The platform refused the address range
/// - [`Error::CommitFailed`] - The platform could not back the requested pages
/// - [`Error::ReservationExhausted`] - Growth would pass the end of the reservation
/// - [`Error::FileError`] - Filesystem I/O errors when loading class files from disk
///
/// # Examples
///
/// ```rust
/// use glr::{ClassLoader, Error, LoaderConfig};
///
/// let loader = ClassLoader::new(LoaderConfig::default())?;
/// match loader.load_class(b"XGLR\x01\x01\x00\x00\x00") {
///     Err(Error::BadMagic(magic)) => assert_eq!(&magic, b"XGLR"),
///     other => panic!("unexpected result: {:?}", other.map(|class| class.id())),
/// }
/// # Ok::<(), glr::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Decoding errors
    /// Fewer bytes remained in the input than the current read required.
    ///
    /// The cursor never reads past the end of its buffer; any read that would do so fails
    /// with this error instead.
    #[error("Truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        /// Cursor position at which the read was attempted
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes that remained
        available: usize,
    },

    /// The buffer does not start with the class file magic.
    #[error("Bad class file magic - {0:02X?}")]
    BadMagic([u8; 4]),

    /// The class file version is below the minimum this loader supports.
    #[error("Unsupported class file version {found}, minimum is {minimum}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u8,
        /// Minimum supported version
        minimum: u8,
    },

    /// The class header has an empty access sub-field, or sets undefined access bits.
    #[error("Invalid class access in header byte 0x{0:02X}")]
    BadAccess(u8),

    /// A constant pool entry carries a tag outside the known set.
    #[error("Unknown constant tag {tag} at entry {index}")]
    UnknownConstantTag {
        /// Index of the offending entry
        index: usize,
        /// The tag byte that was read
        tag: u8,
    },

    /// A field or method record references a constant past the end of the pool.
    #[error("Constant index {index} out of range, pool has {len} entries")]
    ConstantIndexOutOfRange {
        /// The index that was referenced
        index: u16,
        /// Number of entries in the pool
        len: usize,
    },

    /// A constant is referenced where a different kind of constant is required.
    #[error("Constant {index} is a {found}, expected {expected}")]
    ConstantTypeMismatch {
        /// The index that was referenced
        index: usize,
        /// The constant kind the reference requires
        expected: &'static str,
        /// The constant kind found at the index
        found: &'static str,
    },

    /// The declared constant pool size exceeds the configured maximum.
    #[error("Constant pool declares {count} entries, maximum is {max}")]
    ConstantPoolTooLarge {
        /// Declared entry count
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The declared field count exceeds the configured maximum.
    #[error("Class declares {count} fields, maximum is {max}")]
    FieldCountExceeded {
        /// Declared field count
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The declared method count exceeds the configured maximum.
    #[error("Class declares {count} methods, maximum is {max}")]
    MethodCountExceeded {
        /// Declared method count
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// A method record carries a call kind outside the known set.
    #[error("Unknown method call kind {0}")]
    UnknownCallKind(u8),

    /// The class file is damaged and could not be decoded.
    ///
    /// Covers structural problems outside the dedicated variants, such as invalid UTF-8 in a
    /// string constant or trailing bytes after the last method. The error includes the source
    /// location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    // Registry errors
    /// A class with the same name is already registered.
    ///
    /// Redefinition is an error; the registry is left unchanged.
    #[error("Class '{0}' is already registered")]
    DuplicateClass(String),

    /// Probing visited every slot without finding a free one.
    ///
    /// The growth policy keeps the table below its load factor, so observing this error means
    /// an internal invariant was violated.
    #[error("Class registry is full ({slots} slots)")]
    RegistryFull {
        /// Slot count at the time of the failure
        slots: usize,
    },

    /// Failed to lock target.
    ///
    /// The registry lock was poisoned by a panic in another thread.
    #[error("Failed to lock target")]
    LockError,

    // Resource errors
    /// The platform refused to reserve the requested address range.
    #[error("Failed to reserve {size} bytes of address space - {message}")]
    ReservationFailed {
        /// Requested reservation size in bytes
        size: usize,
        /// Platform error description
        message: String,
    },

    /// The platform could not back the requested pages.
    #[error("Failed to commit {size} bytes at offset {offset} - {message}")]
    CommitFailed {
        /// Offset of the range within the reservation
        offset: usize,
        /// Size of the range in bytes
        size: usize,
        /// Platform error description
        message: String,
    },

    /// Growth would extend past the end of the reservation.
    #[error("Arena growth to {requested} bytes exceeds the {reserved} byte reservation")]
    ReservationExhausted {
        /// Committed size the growth would have produced
        requested: usize,
        /// Size of the reservation
        reserved: usize,
    },

    /// Filesystem I/O error while reading a class file.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    // Configuration errors
    /// A loader or registry configuration value is invalid.
    #[error("Invalid configuration - {0}")]
    InvalidConfig(String),
}
