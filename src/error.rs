//! Error types for RAR archive parsing and streaming.
//!
//! The main error type is [`RarError`], which covers every failure mode of
//! the header parsing pipeline, chunk graph assembly, and range-to-stream
//! engine.

use std::fmt;
use std::io;

/// Error type for RAR parsing and streaming operations.
#[derive(Debug)]
pub enum RarError {
    /// The first supplied volume is missing the RAR marker signature.
    NotRar,
    /// A RAR5 marker was detected; RAR5 archives are not parsed, only
    /// recognized.
    Rar5Unsupported,
    /// A block's declared size exceeds the remaining bytes of its volume.
    /// Non-fatal: parsing of that volume stops but prior blocks remain valid.
    TruncatedBlock {
        /// Index of the volume the truncated block was found in.
        volume_index: usize,
        /// Byte offset of the truncated block within that volume.
        offset: u64,
    },
    /// A continuation chunk (`continuedFromPrev`) has no preceding open head
    /// chunk. Non-fatal: the resulting `InnerFile` is marked incomplete.
    DanglingContinuation {
        /// Name of the inner file the dangling continuation belongs to.
        name: String,
        /// Index of the volume the continuation chunk was found in.
        volume_index: usize,
    },
    /// The underlying media adapter failed while reading a volume.
    IoError {
        /// Name of the volume the read was issued against.
        volume: String,
        /// The underlying I/O error.
        cause: io::Error,
    },
    /// `start > end`, or `end >= length`, for a requested interval.
    InvalidInterval,
    /// A structural violation in block layout (e.g. a nonsensical header
    /// size) that is not a simple truncation.
    ParseError(String),
    /// The provided buffer is too small to contain the header being parsed.
    BufferTooSmall {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        have: usize,
    },
    /// No volumes were supplied, or no inner files were found.
    NoFilesFound,
}

impl fmt::Display for RarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRar => write!(f, "not a RAR archive: missing marker signature"),
            Self::Rar5Unsupported => write!(f, "RAR5 archives are not supported"),
            Self::TruncatedBlock {
                volume_index,
                offset,
            } => write!(
                f,
                "truncated block at volume {volume_index} offset {offset}"
            ),
            Self::DanglingContinuation { name, volume_index } => write!(
                f,
                "dangling continuation for '{name}' at volume {volume_index}: no preceding head chunk"
            ),
            Self::IoError { volume, cause } => {
                write!(f, "I/O error on volume '{volume}': {cause}")
            }
            Self::InvalidInterval => write!(f, "invalid byte interval"),
            Self::ParseError(detail) => write!(f, "parse error: {detail}"),
            Self::BufferTooSmall { needed, have } => {
                write!(f, "buffer too small: need {needed} bytes, have {have}")
            }
            Self::NoFilesFound => write!(f, "no files found in archive"),
        }
    }
}

impl std::error::Error for RarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RarError>;
