// src/file/mod.rs
//! The file structure: one module file held in memory.
//!
//! A `FileStructure` owns the constant pool, the component arena, the child
//! slots and the version labels of its primary module. Builder calls populate
//! it, queries walk it, and `assemble`/`disassemble` move it to and from the
//! binary format.
//!
//! Submodules each add an `impl FileStructure` block:
//! - `builder`: creating components and contributions
//! - `serialize`: the binary file format
//! - `link`: resolving fingerprint modules through a repository
//! - `versions`: version labels of the primary module
//! - `dump`: indented rendering of the component tree

mod builder;
mod dump;
pub mod link;
mod serialize;
mod versions;

#[cfg(test)]
mod tests;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_identity::{ComponentId, ConstantId, SlotId, Version, VersionTree};

use crate::access::Access;
use crate::component::children::{ChildSlot, ChildState};
use crate::component::{Component, ComponentFlags, ComponentKind, Format, ModuleData, ModuleType};
use crate::diagnostics::{Diagnostic, ErrorListener, TracingListener};
use crate::options::AssemblerOptions;
use crate::pool::ConstantPool;

pub use link::{InMemoryRepository, ModuleRepository, SharedFile};

/// First four bytes of every module file.
pub const FILE_MAGIC: u32 = 0xEC57_A5EE;
/// Files with a different major version are rejected.
pub const VERSION_MAJOR: u16 = 0;
/// Files with a different minor version are rejected.
pub const VERSION_MINOR: u16 = 1;

pub struct FileStructure {
    pub(crate) pool: ConstantPool,
    pub(crate) components: Vec<Component>,
    pub(crate) slots: Vec<ChildSlot>,
    pub(crate) root: ComponentId,
    /// The primary module.
    pub(crate) module: ComponentId,
    pub(crate) options: AssemblerOptions,
    pub(crate) listener: Box<dyn ErrorListener>,
    /// Version labels of the primary module.
    pub(crate) versions: VersionTree<()>,
    /// Files that fingerprint modules were linked to in compile mode.
    pub(crate) origins: FxHashMap<ComponentId, SharedFile>,
    /// Set once runtime linking has grafted every dependency.
    pub(crate) linked: bool,
    /// Type pairs whose relation is being computed; re-entry answers IS_A.
    pub(crate) relating: FxHashSet<(ConstantId, ConstantId)>,
    /// Variance questions being answered; re-entry answers "no".
    pub(crate) scanning: FxHashSet<(ComponentId, Box<str>, bool)>,
}

impl std::fmt::Debug for FileStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStructure")
            .field("module", &self.module_name())
            .field("components", &self.components.len())
            .field("constants", &self.pool.len())
            .field("versions", &self.versions.len())
            .field("linked", &self.linked)
            .finish_non_exhaustive()
    }
}

impl FileStructure {
    /// A new file whose primary module is `module_name`.
    pub fn new(module_name: &str, options: AssemblerOptions) -> Self {
        let mut pool = ConstantPool::new(options.core_module);
        let identity = pool.ensure_module(module_name);
        let mut file = Self::empty(pool, identity, options);
        let module = Component::new(
            identity,
            ComponentFlags::new(Format::Module, Access::Public),
            ComponentKind::Module(ModuleData {
                module_type: ModuleType::Primary,
                version: None,
            }),
        );
        let module = file.alloc(module);
        let root = file.root;
        file.add_child(root, module);
        file.module = module;
        tracing::debug!(module = module_name, "created file structure");
        file
    }

    /// A file with just its root; the caller attaches the primary module.
    pub(crate) fn empty(pool: ConstantPool, identity: ConstantId, options: AssemblerOptions) -> Self {
        let root = Component::new(
            identity,
            ComponentFlags::new(Format::File, Access::Public),
            ComponentKind::File,
        );
        Self {
            pool,
            components: vec![root],
            slots: Vec::new(),
            root: ComponentId::new(0),
            module: ComponentId::new(0),
            options,
            listener: Box::new(TracingListener),
            versions: VersionTree::new(),
            origins: FxHashMap::default(),
            linked: false,
            relating: FxHashSet::default(),
            scanning: FxHashSet::default(),
        }
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// The primary module component.
    pub fn module(&self) -> ComponentId {
        self.module
    }

    /// Identity of the primary module, held by the file root as well.
    pub fn module_identity(&self) -> ConstantId {
        self.components[self.root.as_usize()].identity
    }

    pub fn module_name(&self) -> &str {
        self.pool.name_of(self.module_identity()).unwrap_or("")
    }

    /// Replace the diagnostic sink (a [`TracingListener`] by default).
    pub fn set_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.listener = listener;
    }

    /// Report a semantic diagnostic; returns whether the listener wants to abort.
    pub(crate) fn report(&mut self, diagnostic: Diagnostic) -> bool {
        self.listener.log(diagnostic)
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.as_usize()]
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id.as_usize()]
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn alloc(&mut self, component: Component) -> ComponentId {
        let id = ComponentId::new(self.components.len() as u32);
        self.components.push(component);
        id
    }

    pub(crate) fn alloc_slot(&mut self, owner: ComponentId, state: ChildState) -> SlotId {
        let id = SlotId::new(self.slots.len() as u32);
        self.slots.push(ChildSlot { owner, state });
        id
    }

    /// Version labels of the primary module, ascending.
    pub fn versions(&self) -> impl Iterator<Item = &Version> + '_ {
        self.versions.versions()
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }
}
