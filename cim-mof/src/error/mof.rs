/*!
 Errors that can happen when deserializing MOF data.

 Every [`MofError`] belongs to exactly one [`ErrorKind`], which is the coarse category callers are
 expected to branch on. The variants themselves carry the byte position and names needed for diagnostics.
*/

use std::{
    fmt::{Display, Formatter, Result},
    str::Utf8Error,
};

use thiserror::Error;

use crate::mof::{hooks::HookError, models::CimType};

/// The failure categories a deserialize call can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required argument was missing
    NullArgument,
    /// The cursor was at or past the end of the buffer, or a read would cross it
    OutOfRange,
    /// The bytes do not form valid MOF records or declarations
    MalformedContent,
    /// The buffer is larger than the configured maximum
    SizeLimitExceeded,
    /// A capability the deserializer was not configured for was requested
    NotSupported,
}

impl ErrorKind {
    /// Whether this kind is reported as a generic engine failure, as opposed to an argument error
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedContent | ErrorKind::SizeLimitExceeded
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            ErrorKind::NullArgument => write!(fmt, "null argument"),
            ErrorKind::OutOfRange => write!(fmt, "out of range"),
            ErrorKind::MalformedContent => write!(fmt, "malformed content"),
            ErrorKind::SizeLimitExceeded => write!(fmt, "size limit exceeded"),
            ErrorKind::NotSupported => write!(fmt, "not supported"),
        }
    }
}

/// Errors that can happen when deserializing MOF data
#[derive(Debug, Error)]
pub enum MofError {
    #[error("no buffer was provided")]
    NullBuffer,
    #[error("offset {offset:#x} is not inside the buffer of length {len:#x}")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("reading {wanted} bytes at {offset:#x} crosses the end of the buffer at {end:#x}")]
    OutOfBounds {
        offset: usize,
        wanted: usize,
        end: usize,
    },
    #[error("array of {count} elements at {offset:#x} cannot fit in the {remaining} remaining bytes")]
    ArrayTooLong {
        offset: usize,
        count: usize,
        remaining: usize,
    },
    #[error("buffer of {size} bytes exceeds the limit of {limit} bytes")]
    SizeLimitExceeded { size: usize, limit: usize },
    #[error("no MOF document signature at {0:#x}")]
    InvalidSignature(usize),
    #[error("invalid format version {version} at {offset:#x}")]
    InvalidVersion { version: u16, offset: usize },
    #[error("format version {version} is newer than the supported version {supported}")]
    UnsupportedVersion { version: u16, supported: u16 },
    #[error("unknown record tag {tag:#04x} at {offset:#x}")]
    UnknownRecord { tag: u8, offset: usize },
    #[error("record ending at {end:#x} has {trailing} unread bytes")]
    TrailingBytes { end: usize, trailing: usize },
    #[error("unknown CIM type tag {tag} at {offset:#x}")]
    UnknownType { tag: u8, offset: usize },
    #[error("invalid UTF-16 text at {offset:#x}")]
    InvalidUtf16 { offset: usize },
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("`{owner}` expects a {expected} value, found {found}")]
    InvalidLiteral {
        owner: String,
        expected: CimType,
        found: String,
    },
    #[error("alias `${0}` is not defined")]
    UnknownAlias(String),
    #[error("alias `${0}` is defined more than once")]
    DuplicateAlias(String),
    #[error("qualifier `{0}` has conflicting flavors")]
    InvalidFlavor(String),
    #[error("invalid UTF-8 string at {offset:#x}: {source}")]
    InvalidString {
        offset: usize,
        #[source]
        source: Utf8Error,
    },
    #[error("invalid {what} byte {value:#04x} at {offset:#x}")]
    InvalidMarker {
        what: &'static str,
        value: u8,
        offset: usize,
    },
    #[error("invalid {what} bits {bits:#x} at {offset:#x}")]
    InvalidFlags {
        what: &'static str,
        bits: u32,
        offset: usize,
    },
    #[error("invalid declaration at {offset:#x}: {reason}")]
    InvalidDeclaration { offset: usize, reason: &'static str },
    #[error("invalid datetime `{value}`: {reason}")]
    InvalidDateTime { value: String, reason: &'static str },
    #[error("empty {what} name at {offset:#x}")]
    EmptyName { what: &'static str, offset: usize },
    #[error("class `{0}` is declared more than once")]
    DuplicateClass(String),
    #[error("`{name}` appears more than once in `{owner}`")]
    DuplicateMember { owner: String, name: String },
    #[error("class `{class}` is not declared in the buffer and no class resolver was provided for {namespace}")]
    ClassNotFound { class: String, namespace: String },
    #[error("class resolver failed for `{class}`: {source}")]
    ClassResolution {
        class: String,
        #[source]
        source: HookError,
    },
    #[error("class resolver returned `{returned}` when asked for `{requested}`")]
    ResolvedClassMismatch { requested: String, returned: String },
    #[error("property `{property}` is not declared on class `{class}`")]
    UnknownProperty { class: String, property: String },
    #[error("`{element}` in class `{class}` changes the inherited type {inherited} to {declared}")]
    TypeOverride {
        class: String,
        element: String,
        inherited: CimType,
        declared: CimType,
    },
    #[error("qualifier `{qualifier}` on `{element}` does not allow overriding")]
    QualifierOverride { element: String, qualifier: String },
    #[error("class `{0}` is abstract and cannot be instantiated")]
    AbstractInstance(String),
    #[error("property `{property}` expects an instance of `{expected}`, found `{found}`")]
    EmbeddedClassMismatch {
        property: String,
        expected: String,
        found: String,
    },
    #[error("embedded instances are nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("`{0}` is included but no include resolver was provided")]
    MissingIncludeResolver(String),
    #[error("`{0}` is included but this deserializer does not process include records")]
    IncludeNotSupported(String),
    #[error("include resolver failed for `{file}`: {source}")]
    IncludeResolution {
        file: String,
        #[source]
        source: HookError,
    },
    #[error("includes are nested deeper than {0} levels")]
    IncludeTooDeep(usize),
    #[error("`{0}` includes itself")]
    IncludeCycle(String),
    #[error("in included file `{file}`: {source}")]
    Included {
        file: String,
        #[source]
        source: Box<MofError>,
    },
}

impl MofError {
    /// The failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MofError::NullBuffer => ErrorKind::NullArgument,
            MofError::OffsetOutOfRange { .. }
            | MofError::OutOfBounds { .. }
            | MofError::ArrayTooLong { .. } => ErrorKind::OutOfRange,
            MofError::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            MofError::UnsupportedVersion { .. } | MofError::IncludeNotSupported(_) => {
                ErrorKind::NotSupported
            }
            MofError::Included { source, .. } => source.kind(),
            _ => ErrorKind::MalformedContent,
        }
    }
}
