// src/errors/structure.rs
//! Component tree errors (A3xxx).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("'{parent}' already has a child named '{name}'")]
    #[diagnostic(
        code(A3001),
        help("give the new child a condition to add it as a conditional sibling")
    )]
    DuplicateChild { parent: String, name: String },

    #[error("a {child} cannot be a child of a {parent}")]
    #[diagnostic(code(A3002))]
    IllegalChild {
        child: &'static str,
        parent: &'static str,
    },

    #[error("'{name}' is a {found}, expected {expected}")]
    #[diagnostic(code(A3003))]
    WrongFormat {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{name}' is not a virtual child class")]
    #[diagnostic(code(A3004))]
    NotVirtualChild { name: String },

    #[error("module carries {count} version labels, expected at most one")]
    #[diagnostic(
        code(A3005),
        help("purge all but one version before relabelling the module")
    )]
    MultipleVersionLabels { count: usize },

    #[error("module has no version '{version}'")]
    #[diagnostic(code(A3006))]
    UnknownVersion { version: String },

    #[error("cannot merge '{that}' into '{this}': {reason}")]
    #[diagnostic(code(A3007))]
    IncompatibleMerge {
        this: String,
        that: String,
        reason: &'static str,
    },

    #[error("no component with identity '{identity}'")]
    #[diagnostic(code(A3008))]
    ComponentNotFound { identity: String },

    #[error("a {format} cannot have an extends contribution")]
    #[diagnostic(code(A3009))]
    IllegalExtends { format: &'static str },

    #[error("component '{name}' is not attached to a parent")]
    #[diagnostic(code(A3010))]
    Detached { name: String },

    #[error("'{name}' would need a conditional sibling, which these options disallow")]
    #[diagnostic(code(A3011))]
    SiblingsDisallowed { name: String },

    #[error("the primary module cannot be removed or replaced")]
    #[diagnostic(code(A3012))]
    PrimaryModule,
}
