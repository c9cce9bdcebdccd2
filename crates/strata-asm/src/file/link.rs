// src/file/link.rs
//! Linking fingerprint modules to the files that define them.
//!
//! A file names each module it depends on with a fingerprint: an outline
//! module component. Linking asks a [`ModuleRepository`] for the real file of
//! every fingerprint, transitively.
//!
//! - Runtime linking copies the whole component tree of each dependency into
//!   this file, adopting its constants, so the result is self-contained.
//! - Compile linking only records which file each fingerprint came from and
//!   links those files in turn, so every module keeps its own pool.
//!
//! Both report the first module the repository cannot supply.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use rustc_hash::{FxHashMap, FxHashSet};
use strata_identity::{ComponentId, ConstantId, Version, VersionTree};

use super::FileStructure;
use crate::component::children::{ChildMap, ChildState};
use crate::component::{ComponentKind, Format, ModuleType};
use crate::diagnostics::{Diagnostic, Severity, VE_MODULE_MISSING};
use crate::errors::{AsmError, PoolError};

/// A file shared between the repository and the files linked to it.
pub type SharedFile = Arc<Mutex<FileStructure>>;

pub(crate) fn lock(file: &SharedFile) -> MutexGuard<'_, FileStructure> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source of module files by name.
pub trait ModuleRepository {
    /// Names of every module the repository can load.
    fn module_names(&self) -> Vec<String>;

    /// The file of module `name`; with a version, one that supports it.
    fn load_module(&self, name: &str, version: Option<&Version>) -> Option<SharedFile>;
}

#[derive(Clone)]
struct StoredModule {
    versions: VersionTree<()>,
    file: SharedFile,
}

/// Repository over files held in memory. A module stored several times keeps
/// every copy; the latest one wins when no version is asked for.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    modules: FxHashMap<String, Vec<StoredModule>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file under the name of its primary module.
    pub fn store(&mut self, file: FileStructure) -> SharedFile {
        let name = file.module_name().to_owned();
        let versions = file.versions.clone();
        let file = Arc::new(Mutex::new(file));
        self.modules.entry(name).or_default().push(StoredModule {
            versions,
            file: Arc::clone(&file),
        });
        file
    }
}

impl ModuleRepository for InMemoryRepository {
    fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    fn load_module(&self, name: &str, version: Option<&Version>) -> Option<SharedFile> {
        let stored = self.modules.get(name)?;
        let found = match version {
            None => stored.last(),
            Some(ver) => stored.iter().rev().find(|m| {
                m.versions.contains(ver) || m.versions.find_highest_version_for(ver).is_some()
            }),
        };
        found.map(|m| Arc::clone(&m.file))
    }
}

/// A dependency of a file: the module name and the version it requires.
type Dependency = (String, Option<Version>);

impl FileStructure {
    /// Link every fingerprint module of this file. Returns the name of the
    /// first module that could not be found, or `None` on success.
    #[tracing::instrument(skip(self, repository), fields(module = %self.module_name()))]
    pub fn link_modules(&mut self, repository: &dyn ModuleRepository, runtime: bool) -> Option<String> {
        if runtime && self.linked {
            return None;
        }

        let mut checked = FxHashSet::default();
        let mut missing = self.find_missing(repository, &mut checked, runtime);
        if missing.is_none() {
            missing = if runtime {
                self.link_runtime(repository)
            } else {
                self.link_compile_top(repository)
            };
        }

        match &missing {
            None => {
                self.linked = true;
                tracing::debug!(runtime, "linked modules");
            }
            Some(name) => {
                tracing::warn!(missing = %name, runtime, "module link failed");
                let source = self.module_identity();
                self.report(
                    Diagnostic::new(Severity::Error, VE_MODULE_MISSING)
                        .with_arg(name.clone())
                        .with_source(source),
                );
            }
        }
        missing
    }

    /// The module component named `name`, if this file has one.
    pub fn module_named(&mut self, name: &str) -> Option<ComponentId> {
        let root = self.root;
        self.get_child(root, name, None)
            .first()
            .filter(|&m| self.component(m).format() == Format::Module)
    }

    /// The file a fingerprint was linked to in compile mode.
    pub fn fingerprint_origin(&self, fingerprint: ComponentId) -> Option<&SharedFile> {
        self.origins.get(&fingerprint)
    }

    /// Fingerprint modules of this file with the version each requires.
    fn fingerprints(&mut self) -> Vec<(ComponentId, String, Option<Version>)> {
        let root = self.root;
        let primary = self.module;
        self.children(root)
            .into_iter()
            .filter(|&m| m != primary)
            .filter_map(|m| {
                let component = self.component(m);
                let data = component.as_module()?;
                if data.module_type != ModuleType::Fingerprint {
                    return None;
                }
                let name = self.pool.name_of(component.identity)?.to_owned();
                let version = data.version.and_then(|v| self.pool.version_of(v)).cloned();
                Some((m, name, version))
            })
            .collect()
    }

    // ========================================================================
    // Phase one: anything missing?
    // ========================================================================

    fn find_missing(
        &mut self,
        repository: &dyn ModuleRepository,
        checked: &mut FxHashSet<String>,
        runtime: bool,
    ) -> Option<String> {
        if !checked.insert(self.module_name().to_owned()) {
            return None;
        }

        let available = repository.module_names();
        let mut downstream = Vec::new();
        for (fingerprint, name, version) in self.fingerprints() {
            if self.origins.contains_key(&fingerprint) {
                continue;
            }
            if !available.contains(&name) {
                return Some(name);
            }
            // at runtime every transitive dependency has a fingerprint in the
            // top file already
            if !runtime && !checked.contains(&name) {
                match repository.load_module(&name, version.as_ref()) {
                    Some(file) => downstream.push((name, file)),
                    None => return Some(name),
                }
            }
        }

        for (name, file) in downstream {
            if checked.contains(&name) {
                continue;
            }
            if let Some(missing) = lock(&file).find_missing(repository, checked, false) {
                return Some(missing);
            }
        }
        None
    }

    // ========================================================================
    // Phase two, runtime: graft every dependency
    // ========================================================================

    fn link_runtime(&mut self, repository: &dyn ModuleRepository) -> Option<String> {
        let mut done = FxHashSet::default();
        done.insert(self.module_name().to_owned());
        let mut todo: VecDeque<Dependency> = self
            .fingerprints()
            .into_iter()
            .map(|(_, name, version)| (name, version))
            .collect();

        while let Some((name, version)) = todo.pop_front() {
            if !done.insert(name.clone()) {
                continue;
            }
            let Some(fingerprint) = self.module_named(&name) else {
                return Some(name);
            };
            if self
                .component(fingerprint)
                .as_module()
                .is_some_and(|m| m.module_type != ModuleType::Fingerprint)
            {
                continue;
            }
            let Some(file) = repository.load_module(&name, version.as_ref()) else {
                return Some(name);
            };

            let mut source = lock(&file);
            todo.extend(
                source
                    .fingerprints()
                    .into_iter()
                    .map(|(_, name, version)| (name, version)),
            );
            if let Err(err) = self.graft_module(fingerprint, &mut source) {
                tracing::error!(module = %name, error = %err, "cannot graft module");
                return Some(name);
            }
        }
        None
    }

    /// Replace `fingerprint` with a copy of the primary module of `source`
    /// and its whole subtree.
    fn graft_module(&mut self, fingerprint: ComponentId, source: &mut FileStructure) -> Result<ComponentId, AsmError> {
        source.ensure_all_children()?;
        self.pool.add_valid_pool(source.pool.id());

        let mut copied = FxHashMap::default();
        let module = self.copy_body(source, source.module, &mut copied)?;
        if let ComponentKind::Module(data) = &mut self.component_mut(module).kind {
            data.module_type = ModuleType::Embedded;
        }
        self.replace_child(fingerprint, module);
        self.component_mut(module).children = None;
        self.copy_children(source, source.module, &[module], &mut copied)?;

        tracing::debug!(
            module = %source.module_name(),
            constants = copied.len(),
            "grafted module"
        );
        Ok(module)
    }

    fn copy_body(
        &mut self,
        source: &FileStructure,
        id: ComponentId,
        copied: &mut FxHashMap<ConstantId, ConstantId>,
    ) -> Result<ComponentId, PoolError> {
        let mut body = source
            .component(id)
            .try_map_constants(&mut |c| self.pool.adopt_cached(&source.pool, c, copied))?;
        body.parent = None;
        body.next_sibling = None;
        body.children = None;
        Ok(self.alloc(body))
    }

    /// Copy the children of `from` in `source` under the sibling chain
    /// `chain` of this file.
    fn copy_children(
        &mut self,
        source: &FileStructure,
        from: ComponentId,
        chain: &[ComponentId],
        copied: &mut FxHashMap<ConstantId, ConstantId>,
    ) -> Result<(), PoolError> {
        let Some(map) = source.parsed_children(from) else {
            return Ok(());
        };
        let Some(&owner) = chain.first() else {
            return Ok(());
        };

        let mut children = ChildMap::default();
        let mut pending = Vec::with_capacity(map.len());
        for eldest in map.ids() {
            let mut copies = Vec::new();
            for sibling in source.siblings(eldest) {
                let copy = self.copy_body(source, sibling, copied)?;
                self.component_mut(copy).parent = Some(owner);
                copies.push(copy);
            }
            for pair in copies.windows(2) {
                self.component_mut(pair[0]).next_sibling = Some(pair[1]);
            }
            if let Some(&first) = copies.first() {
                children.insert(self.child_key(first), first);
            }
            pending.push((eldest, copies));
        }

        let slot = self.alloc_slot(owner, ChildState::Parsed(children));
        for &member in chain {
            self.component_mut(member).children = Some(slot);
        }
        for (eldest, copies) in pending {
            self.copy_children(source, eldest, &copies, copied)?;
        }
        Ok(())
    }

    // ========================================================================
    // Phase two, compile: record origins
    // ========================================================================

    fn link_compile_top(&mut self, repository: &dyn ModuleRepository) -> Option<String> {
        let mut done = FxHashSet::default();
        let mut required = Vec::new();
        if let Some(missing) = self.link_compile(repository, &mut done, &mut required) {
            return Some(missing);
        }

        // modules that only downstream files depend on still need a
        // fingerprint here
        for (name, version, origin) in required {
            let fingerprint = match self.module_named(&name) {
                Some(existing) => existing,
                None => match self.create_fingerprint(&name, version.as_ref()) {
                    Ok(created) => created,
                    Err(err) => {
                        tracing::error!(module = %name, error = %err, "cannot add fingerprint");
                        return Some(name);
                    }
                },
            };
            if fingerprint != self.module {
                self.origins.entry(fingerprint).or_insert(origin);
            }
        }
        self.build_valid_pool_set();
        None
    }

    /// Record the origin of every fingerprint of this file and link the
    /// files they came from. Every dependency found is pushed to `required`.
    fn link_compile(
        &mut self,
        repository: &dyn ModuleRepository,
        done: &mut FxHashSet<String>,
        required: &mut Vec<(String, Option<Version>, SharedFile)>,
    ) -> Option<String> {
        if !done.insert(self.module_name().to_owned()) {
            return None;
        }

        let mut downstream = Vec::new();
        for (fingerprint, name, version) in self.fingerprints() {
            let Some(file) = repository.load_module(&name, version.as_ref()) else {
                return Some(name);
            };
            self.origins
                .entry(fingerprint)
                .or_insert_with(|| Arc::clone(&file));
            required.push((name.clone(), version, Arc::clone(&file)));
            if !done.contains(&name) {
                downstream.push((name, file));
            }
        }

        for (name, file) in downstream {
            if done.contains(&name) {
                continue;
            }
            if let Some(missing) = lock(&file).link_compile(repository, done, required) {
                return Some(missing);
            }
        }
        None
    }

    /// Allow constants of every file this one is transitively linked to.
    pub fn build_valid_pool_set(&mut self) {
        let mut pools = FxHashSet::default();
        let mut seen = FxHashSet::default();
        let mut todo: Vec<SharedFile> = self.origins.values().cloned().collect();
        while let Some(file) = todo.pop() {
            if !seen.insert(Arc::as_ptr(&file)) {
                continue;
            }
            let guard = match file.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // held up the stack: this very file
                Err(TryLockError::WouldBlock) => continue,
            };
            pools.insert(guard.pool.id());
            todo.extend(guard.origins.values().cloned());
        }
        tracing::trace!(pools = pools.len(), "built valid pool set");
        self.pool.set_valid_pools(pools);
    }
}
