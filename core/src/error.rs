//! Error kinds for model loading and the on-disk codec.
//!
//! Scoring itself never fails (see [`crate::scoring`]): a buffer that matches
//! nothing just produces a score vector whose highest entry is at or below
//! zero. Only `load`/`save` and the codec's binary parsing can fail, so this
//! enum is deliberately small.

use thiserror::Error;

/// Everything that can go wrong loading or writing a model file.
#[derive(Error, Debug)]
pub enum LangIdentError {
    /// The file's leading signature did not match
    /// `"Language Identification Database\r\n\x1A\x04\0"`.
    #[error("bad database signature in {path}")]
    BadSignature { path: String },

    /// The file's version byte was below `MIN_VERSION`.
    #[error("unsupported database version {found} (need >= {min}) in {path}")]
    UnsupportedVersion {
        path: String,
        found: u8,
        min: u8,
    },

    /// The file ended (or a length-prefixed block ended) before all
    /// mandatory fields were read. A truncated trie block fails load;
    /// truncated per-language metadata fields instead default to zero and
    /// do not raise this.
    #[error("truncated database file in {path}: {detail}")]
    TruncatedFile { path: String, detail: String },

    /// A structural invariant of the packed trie or frequency pool was
    /// violated (an out-of-range child index, a frequency list that doesn't
    /// end in a `last` record, ...).
    #[error("corrupt database file in {path}: {detail}")]
    Corruption { path: String, detail: String },

    /// Constructing an identifier-sized table (score vector, alignment
    /// table, ...) failed to allocate. In practice this only happens with a
    /// language count that overflows `usize` arithmetic downstream.
    #[error("out of memory building identifier tables: {0}")]
    AllocationFailure(String),

    /// Wraps the underlying filesystem error for `Identifier::load`/`save`.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LangIdentError>;
