// src/lib.rs
//
// Foundational identity primitives for the module assembler.
// Defines the u32 entity handles used to address constants, components and
// child slots, plus the Version label type and its ordered VersionTree.

mod entities;
mod version;
mod version_tree;

pub use entities::{ComponentId, ConstantId, PoolId, SlotId};
pub use version::{Version, VersionError, VersionParts};
pub use version_tree::VersionTree;
