// src/pool/mod.rs
//! Per-file interning store for constants.
//!
//! Every constant used by a file lives exactly once in its pool: `register`
//! either finds a structurally equal constant or appends a new one. A position
//! is stable until `optimize` compacts the pool, which returns a
//! [`ConstantRemap`] for everything that stored the old positions.
//!
//! Submodules each add an `impl ConstantPool` block:
//! - `ensure`: typed constructors for every constant kind
//! - `optimize`: reference marking and mark-and-compact
//! - `adopt`: deep copies from another pool of a linked file
//! - `types`: structural queries over type expressions
//! - `well_known`: cached core-library classes
//! - `describe`: human-readable rendering
//! - `serialize`: the binary pool section

mod adopt;
mod describe;
mod ensure;
mod locator;
mod optimize;
mod serialize;
mod types;
mod well_known;


use std::hash::BuildHasher;

use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use strata_identity::{ConstantId, PoolId};

use crate::constant::ConstantKind;
use crate::errors::PoolError;
use crate::options::DEFAULT_CORE_MODULE;
use locator::{Locator, LocatorKey};

pub use optimize::ConstantRemap;
pub use well_known::WellKnownClasses;

#[derive(Debug, Clone)]
struct PoolEntry {
    kind: ConstantKind,
    /// Marks received during the current registration pass.
    refs: u32,
    /// Set once an unresolved name has been resolved.
    forward: Option<ConstantId>,
}

impl PoolEntry {
    fn new(kind: ConstantKind) -> Self {
        Self {
            kind,
            refs: 0,
            forward: None,
        }
    }
}

#[derive(Debug)]
pub struct ConstantPool {
    id: PoolId,
    core_module: &'static str,
    entries: Vec<PoolEntry>,
    by_value: hashbrown::HashMap<ConstantKind, ConstantId, FxBuildHasher>,
    by_locator: hashbrown::HashMap<Locator, ConstantId, FxBuildHasher>,
    /// Typedef identity to the type it names.
    typedefs: FxHashMap<ConstantId, ConstantId>,
    /// Pools whose constants may be adopted into this one.
    valid_pools: FxHashSet<PoolId>,
    recursive: bool,
    well_known: WellKnownClasses,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new(DEFAULT_CORE_MODULE)
    }
}

impl ConstantPool {
    pub fn new(core_module: &'static str) -> Self {
        let id = PoolId::next();
        let mut valid_pools = FxHashSet::default();
        valid_pools.insert(id);
        Self {
            id,
            core_module,
            entries: Vec::new(),
            by_value: hashbrown::HashMap::with_hasher(FxBuildHasher),
            by_locator: hashbrown::HashMap::with_hasher(FxBuildHasher),
            typedefs: FxHashMap::default(),
            valid_pools,
            recursive: false,
            well_known: WellKnownClasses::new(),
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn core_module(&self) -> &'static str {
        self.core_module
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstantId, &ConstantKind)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (ConstantId::new(i as u32), &e.kind))
    }

    /// Follow resolved-name forwards to the constant that actually stands at `id`.
    pub fn canonical(&self, mut id: ConstantId) -> ConstantId {
        for _ in 0..=self.entries.len() {
            match self.entries.get(id.as_usize()).and_then(|e| e.forward) {
                Some(next) => id = next,
                None => return id,
            }
        }
        id
    }

    pub fn get(&self, id: ConstantId) -> &ConstantKind {
        &self.entries[self.canonical(id).as_usize()].kind
    }

    /// Positional lookup of a serialized index; negative means "no constant".
    pub fn get_constant(&self, index: i64) -> Result<Option<&ConstantKind>, PoolError> {
        if index < 0 {
            return Ok(None);
        }
        if index as u64 >= self.entries.len() as u64 {
            return Err(PoolError::IndexOutOfRange {
                index,
                size: self.entries.len(),
            });
        }
        Ok(Some(self.get(ConstantId::new(index as u32))))
    }

    /// Marks the constant received in the current (or last) registration pass.
    pub fn refs(&self, id: ConstantId) -> u32 {
        self.entries[self.canonical(id).as_usize()].refs
    }

    pub fn find(&self, kind: &ConstantKind) -> Option<ConstantId> {
        let kind = kind.map_references(|r| self.canonical(r));
        self.by_value.get(&kind).copied()
    }

    pub(crate) fn find_by_locator(&self, key: LocatorKey<'_>) -> Option<ConstantId> {
        let hash = self.by_locator.hasher().hash_one(key);
        self.by_locator
            .raw_entry()
            .from_hash(hash, |locator| locator.key() == key)
            .map(|(_, id)| *id)
    }

    /// Intern `kind`, validating that every reference names a constant of this pool.
    pub fn register(&mut self, kind: ConstantKind) -> Result<ConstantId, PoolError> {
        let size = self.entries.len();
        if let Some(bad) = kind.references().into_iter().find(|r| r.as_usize() >= size) {
            return Err(PoolError::IndexOutOfRange {
                index: bad.index() as i64,
                size,
            });
        }
        Ok(self.intern(kind))
    }

    /// Intern a constant whose references are known to belong to this pool.
    pub(crate) fn intern(&mut self, kind: ConstantKind) -> ConstantId {
        use hashbrown::hash_map::RawEntryMut;

        let kind = kind.map_references(|r| self.canonical(r));

        if let ConstantKind::TerminalType { defining } = kind
            && let Some(target) = self.typedef_target(defining)
        {
            self.note_reference(target);
            return target;
        }

        let locator = self.locator_of(&kind);

        // Hash once, reuse for both lookup and insert.
        let hash = self.by_value.hasher().hash_one(&kind);
        let existing = match self.by_value.raw_entry_mut().from_hash(hash, |k| *k == kind) {
            RawEntryMut::Occupied(e) => Some(*e.get()),
            RawEntryMut::Vacant(e) => {
                let id = ConstantId::new(self.entries.len() as u32);
                e.insert_hashed_nocheck(hash, kind.clone(), id);
                None
            }
        };

        let id = match existing {
            Some(id) => id,
            None => {
                let id = ConstantId::new(self.entries.len() as u32);
                tracing::trace!(%id, format = kind.format().name(), "registered constant");
                if let Some(locator) = locator {
                    self.by_locator.insert(locator, id);
                }
                self.entries.push(PoolEntry::new(kind));
                id
            }
        };
        self.note_reference(id);
        id
    }

    fn locator_of(&self, kind: &ConstantKind) -> Option<Locator> {
        let key = match kind {
            ConstantKind::Int(v) => LocatorKey::Int(*v),
            ConstantKind::Byte(v) => LocatorKey::Byte(*v),
            ConstantKind::Char(v) => LocatorKey::Char(*v),
            ConstantKind::String(s) => LocatorKey::String(s),
            ConstantKind::IntLiteral(s) => LocatorKey::IntLiteral(s),
            ConstantKind::FPLiteral(s) => LocatorKey::FPLiteral(s),
            ConstantKind::Module { name } => LocatorKey::Module(self.string(*name)?),
            _ => return None,
        };
        Some(key.into())
    }

    fn note_reference(&mut self, id: ConstantId) {
        if self.recursive {
            self.mark_referenced(id);
        }
    }

    /// Drop and rebuild both lookup maps from the entry list.
    fn rebuild_indexes(&mut self) {
        self.by_value.clear();
        self.by_locator.clear();
        for i in 0..self.entries.len() {
            let id = ConstantId::new(i as u32);
            if self.entries[i].forward.is_some() {
                continue;
            }
            let kind = self.entries[i].kind.clone();
            if let Some(locator) = self.locator_of(&kind) {
                self.by_locator.entry(locator).or_insert(id);
            }
            self.by_value.entry(kind).or_insert(id);
        }
    }

    /// Text of a string constant.
    pub fn string(&self, id: ConstantId) -> Option<&str> {
        match self.get(id) {
            ConstantKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Simple name of an identity (or of a signature's method).
    pub fn name_of(&self, id: ConstantId) -> Option<&str> {
        match self.get(id) {
            ConstantKind::Method { signature, .. } => self.name_of(*signature),
            ConstantKind::UnresolvedName(name) => Some(name),
            kind => self.string(kind.name_id()?),
        }
    }

    pub fn parent_of(&self, id: ConstantId) -> Option<ConstantId> {
        self.get(id).parent_identity().map(|p| self.canonical(p))
    }

    /// The module an identity lives in.
    pub fn module_of(&self, mut id: ConstantId) -> Option<ConstantId> {
        for _ in 0..self.entries.len() {
            id = self.canonical(id);
            match self.get(id) {
                ConstantKind::Module { .. } => return Some(id),
                kind => id = kind.parent_identity()?,
            }
        }
        None
    }

    // ========================================================================
    // Unresolved names
    // ========================================================================

    /// An unresolved name that has not been forwarded yet.
    pub fn is_unresolved(&self, id: ConstantId) -> bool {
        matches!(self.get(id), ConstantKind::UnresolvedName(_))
    }

    /// Point an unresolved name at the constant it names. Later lookups through
    /// `canonical` and `get` see `target`.
    pub fn resolve_unresolved(
        &mut self,
        id: ConstantId,
        target: ConstantId,
    ) -> Result<(), PoolError> {
        let target = self.canonical(target);
        let current = self.canonical(id);
        if !self.is_unresolved(current) || current == target {
            return Err(PoolError::NotUnresolved {
                constant: self.describe(current),
            });
        }
        tracing::debug!(name = ?self.name_of(current), target = %self.describe(target), "resolved name");
        self.entries[current.as_usize()].forward = Some(target);
        self.fold_forwarded();
        Ok(())
    }

    /// Re-key every entry under its canonical references. Entries that turn
    /// out structurally equal to an earlier one forward to it, which may in
    /// turn make their users equal, so repeat until nothing folds.
    fn fold_forwarded(&mut self) {
        use hashbrown::hash_map::Entry;

        loop {
            let mut folded = 0usize;
            self.by_value.clear();
            self.by_locator.clear();
            for i in 0..self.entries.len() {
                if self.entries[i].forward.is_some() {
                    continue;
                }
                let id = ConstantId::new(i as u32);
                let kind = self.entries[i].kind.map_references(|r| self.canonical(r));
                let locator = self.locator_of(&kind);
                self.entries[i].kind = kind.clone();
                match self.by_value.entry(kind) {
                    Entry::Occupied(e) => {
                        let earlier = *e.get();
                        let refs = self.entries[i].refs;
                        self.entries[i].forward = Some(earlier);
                        self.entries[earlier.as_usize()].refs += refs;
                        folded += 1;
                    }
                    Entry::Vacant(e) => {
                        e.insert(id);
                        if let Some(locator) = locator {
                            self.by_locator.entry(locator).or_insert(id);
                        }
                    }
                }
            }
            if folded == 0 {
                break;
            }
            let typedefs = std::mem::take(&mut self.typedefs);
            self.typedefs = typedefs
                .into_iter()
                .map(|(k, v)| (self.canonical(k), self.canonical(v)))
                .collect();
            tracing::trace!(folded, "folded constants equal after a resolved name");
        }
    }

    /// Whether anything reachable from `id` is still an unresolved name.
    pub fn contains_unresolved(&self, id: ConstantId) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let next = self.canonical(next);
            if !seen.insert(next) {
                continue;
            }
            let kind = self.get(next);
            if matches!(kind, ConstantKind::UnresolvedName(_)) {
                return true;
            }
            stack.extend(kind.references());
        }
        false
    }

    /// Every unresolved name still present in the pool.
    pub fn unresolved_names(&self) -> impl Iterator<Item = ConstantId> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            (e.forward.is_none() && matches!(e.kind, ConstantKind::UnresolvedName(_)))
                .then(|| ConstantId::new(i as u32))
        })
    }

    // ========================================================================
    // Typedefs
    // ========================================================================

    /// Record what a typedef names; terminal types of the typedef registered
    /// afterwards are replaced by `target`.
    pub fn set_typedef_target(&mut self, typedef: ConstantId, target: ConstantId) {
        let typedef = self.canonical(typedef);
        let target = self.canonical(target);
        self.typedefs.insert(typedef, target);
    }

    pub fn typedef_target(&self, typedef: ConstantId) -> Option<ConstantId> {
        let mut id = self.canonical(typedef);
        let mut found = None;
        // Typedefs of typedefs resolve to the final target.
        for _ in 0..=self.typedefs.len() {
            match self.typedefs.get(&id).copied() {
                Some(target) => {
                    found = Some(target);
                    match self.get(target) {
                        ConstantKind::TerminalType { defining } => id = self.canonical(*defining),
                        _ => break,
                    }
                }
                None => break,
            }
        }
        found
    }

    // ========================================================================
    // Linked pools
    // ========================================================================

    pub fn set_valid_pools(&mut self, mut pools: FxHashSet<PoolId>) {
        pools.insert(self.id);
        self.valid_pools = pools;
    }

    /// Accept constants of `pool` for adoption from now on.
    pub fn add_valid_pool(&mut self, pool: PoolId) {
        self.valid_pools.insert(pool);
    }

    pub fn is_valid_pool(&self, pool: PoolId) -> bool {
        self.valid_pools.contains(&pool)
    }
}
