//! Strata assembler: constants, constant pools, components and module files.

pub mod access;
pub mod class;
pub mod codec;
pub mod component;
pub mod constant;
pub mod diagnostics;
pub mod errors;
pub mod file;
pub mod options;
pub mod pool;

pub use access::Access;
pub use class::Relation;
pub use component::{
    ChildLookup, Component, ComponentFlags, ComponentKind, Composition, Contribution, Format, ModuleType,
    ResolutionCollector, ResolutionResult, SimpleCollector,
};
pub use constant::{ConstantKind, LinkerContext, StaticLinkerContext};
pub use diagnostics::{BlackHole, CollectingListener, Diagnostic, ErrorListener, Severity, TracingListener};
pub use errors::{AsmError, FormatError, PoolError, StructureError};
pub use file::{FileStructure, InMemoryRepository, ModuleRepository, SharedFile};
pub use options::{AssemblerOptions, DEFAULT_CORE_MODULE};
pub use pool::ConstantPool;
pub use strata_identity::{ComponentId, ConstantId, PoolId, SlotId, Version, VersionTree};
