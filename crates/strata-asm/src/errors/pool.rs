// src/errors/pool.rs
//! Constant pool errors (A2xxx).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::Diagnostic;
use strata_identity::PoolId;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("constant index {index} out of range for pool of {size}")]
    #[diagnostic(code(A2001))]
    IndexOutOfRange { index: i64, size: usize },

    #[error("constant '{constant}' of {source_pool} cannot be adopted into {target_pool}")]
    #[diagnostic(
        code(A2002),
        help("link the module that owns the constant before adopting it")
    )]
    ForeignConstant {
        constant: String,
        source_pool: PoolId,
        target_pool: PoolId,
    },

    #[error("unresolved name '{name}' is still referenced")]
    #[diagnostic(code(A2003), help("resolve every name before assembling"))]
    UnresolvedConstant { name: String },

    #[error("recursive registration is already in progress")]
    #[diagnostic(code(A2004))]
    RegistrationActive,

    #[error("no recursive registration is in progress")]
    #[diagnostic(code(A2005))]
    RegistrationInactive,

    #[error("constant {index} references a constant that was dropped")]
    #[diagnostic(code(A2006))]
    DanglingReference { index: u32 },

    #[error("expected {expected}, found '{found}'")]
    #[diagnostic(code(A2007))]
    WrongKind {
        expected: &'static str,
        found: String,
    },

    #[error("constant '{constant}' is not an unresolved name")]
    #[diagnostic(code(A2008))]
    NotUnresolved { constant: String },
}
