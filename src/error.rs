//! Types for errors that can occur while decoding YXDB files.
use std::fmt;

/// The kind of field a typed accessor expected, used in [`Error::WrongFieldKind`] messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Byte,
    Int64,
    Float64,
    String,
    Time,
    Blob,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "bool",
            FieldKind::Byte => "byte",
            FieldKind::Int64 => "int64",
            FieldKind::Float64 => "float64",
            FieldKind::String => "string",
            FieldKind::Time => "time",
            FieldKind::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// An error that can occur while opening or decoding a YXDB file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file or stream didn't conform to the YXDB format.
    #[error("malformed yxdb file: {0}")]
    MalformedFile(String),
    /// A lower-level I/O failure while reading the underlying stream.
    #[error("I/O error while {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
    /// An LZF block decompressed to more bytes than the output buffer can hold.
    #[error("LZF output buffer too small: needed at least {needed} bytes, had {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    /// A typed accessor was called on a field index/name of a different kind, or on a
    /// name that doesn't exist in the schema.
    #[error("{0}")]
    WrongFieldKind(String),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedFile(msg.into())
    }

    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Error::Io {
            source,
            context: context.into(),
        }
    }

    pub(crate) fn buffer_too_small(needed: usize, capacity: usize) -> Self {
        Error::BufferTooSmall { needed, capacity }
    }

    pub(crate) fn wrong_kind_index(index: usize, expected: FieldKind) -> Self {
        Error::WrongFieldKind(format!("field at index {index} is not a {expected} field"))
    }

    pub(crate) fn unknown_name(name: &str) -> Self {
        Error::WrongFieldKind(format!("field '{name}' does not exist"))
    }
}

/// A result of a fallible YXDB operation.
pub type Result<T> = std::result::Result<T, Error>;
