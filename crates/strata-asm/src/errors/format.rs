// src/errors/format.rs
//! Binary format errors (A1xxx).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::{Diagnostic, SourceSpan};
use strata_identity::VersionError;
use thiserror::Error;

/// Span of a single byte at `offset`, for labelling stream positions.
pub(crate) fn at(offset: usize) -> SourceSpan {
    (offset, 1).into()
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum FormatError {
    #[error("not a module file: magic {found:#010x}")]
    #[diagnostic(code(A1001), help("module files begin with 0xEC57A5EE"))]
    BadMagic { found: u32 },

    #[error("unsupported file version {major}.{minor}, expected {expected_major}.{expected_minor}")]
    #[diagnostic(code(A1002))]
    UnsupportedVersion {
        major: u16,
        minor: u16,
        expected_major: u16,
        expected_minor: u16,
    },

    #[error("unexpected end of stream, {needed} more byte(s) needed")]
    #[diagnostic(code(A1003))]
    UnexpectedEof {
        needed: usize,
        #[label("truncated here")]
        span: SourceSpan,
    },

    #[error("packed integer uses the unsupported huge form")]
    #[diagnostic(code(A1004))]
    InvalidPackedInteger {
        #[label("huge form")]
        span: SourceSpan,
    },

    #[error("illegal magnitude {value}")]
    #[diagnostic(code(A1005), help("counts and lengths must be in 0..=2147483647"))]
    InvalidMagnitude {
        value: i64,
        #[label("expected a count or length")]
        span: SourceSpan,
    },

    #[error("unknown constant tag {tag:#04x}")]
    #[diagnostic(code(A1006))]
    UnknownConstantTag {
        tag: u8,
        #[label("not a constant format")]
        span: SourceSpan,
    },

    #[error("constant index {index} out of range for pool of {size}")]
    #[diagnostic(code(A1007))]
    IndexOutOfRange { index: i64, size: usize },

    #[error("unknown component format {bits}")]
    #[diagnostic(code(A1008))]
    UnknownComponentFormat {
        bits: u8,
        #[label("in these flags")]
        span: SourceSpan,
    },

    #[error("component flags {bits:#06x} carry no access")]
    #[diagnostic(code(A1009))]
    InvalidAccess {
        bits: u16,
        #[label("in these flags")]
        span: SourceSpan,
    },

    #[error("unknown contribution composition {ordinal}")]
    #[diagnostic(code(A1010))]
    UnknownComposition {
        ordinal: u8,
        #[label("not a composition")]
        span: SourceSpan,
    },

    #[error("string is not valid UTF-8")]
    #[diagnostic(code(A1011))]
    InvalidUtf8 {
        #[label("string starts here")]
        span: SourceSpan,
    },

    #[error("constant {index} is {found}, expected {expected}")]
    #[diagnostic(code(A1012))]
    WrongConstantKind {
        index: u32,
        expected: &'static str,
        found: String,
    },

    #[error("{count} unread byte(s) after the module slots")]
    #[diagnostic(code(A1013))]
    TrailingBytes {
        count: usize,
        #[label("unread")]
        span: SourceSpan,
    },

    #[error("invalid character code point {value:#x}")]
    #[diagnostic(code(A1014))]
    InvalidChar {
        value: i64,
        #[label("char constant")]
        span: SourceSpan,
    },

    #[error("a {child} component cannot be stored under a {parent}")]
    #[diagnostic(code(A1015))]
    MisplacedComponent {
        child: &'static str,
        parent: &'static str,
    },

    #[error("duplicate child slot '{name}'")]
    #[diagnostic(code(A1016))]
    DuplicateSlot { name: String },

    #[error("I/O failure: {message}")]
    #[diagnostic(code(A1017))]
    Io { message: String },

    #[error("unknown module type {ordinal}")]
    #[diagnostic(code(A1018))]
    UnknownModuleType {
        ordinal: u8,
        #[label("not a module type")]
        span: SourceSpan,
    },

    #[error("file does not contain its primary module '{name}'")]
    #[diagnostic(code(A1019))]
    MissingPrimaryModule { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Version(#[from] VersionError),
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        FormatError::Io {
            message: err.to_string(),
        }
    }
}
