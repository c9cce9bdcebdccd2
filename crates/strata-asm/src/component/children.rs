// src/component/children.rs
//
// Child slots, sibling chains and conditional child lookup.
//
// A parent's children live in a ChildSlot. Every sibling of the parent's own
// chain points at the same slot, so a child added through any sibling is seen
// by all of them. A slot read from a file may still hold its raw bytes; it is
// parsed on first access and the parsed map replaces the bytes for every
// sibling at once.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use strata_identity::{ComponentId, ConstantId, SlotId};

use crate::access::Access;
use crate::constant::{ConstantKind, LinkerContext};
use crate::diagnostics::{Diagnostic, Severity, VE_CORRUPT_CHILDREN};
use crate::errors::FormatError;
use crate::file::FileStructure;

/// Key of a name-slot: methods are keyed by signature under their
/// multi-method, everything else by simple name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Name(Box<str>),
    Signature(ConstantId),
}

/// Children of one slot, in insertion order. Each entry is the eldest sibling
/// of its name-slot.
#[derive(Debug, Clone, Default)]
pub struct ChildMap {
    entries: Vec<(ChildKey, ComponentId)>,
    index: FxHashMap<ChildKey, usize>,
}

impl ChildMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ChildKey) -> Option<ComponentId> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChildKey, ComponentId)> + '_ {
        self.entries.iter().map(|(k, id)| (k, *id))
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    /// Add a new name-slot; false when the key is taken.
    pub(crate) fn insert(&mut self, key: ChildKey, id: ComponentId) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, id));
        true
    }

    /// Point an existing name-slot at a different eldest sibling.
    pub(crate) fn replace(&mut self, key: &ChildKey, id: ComponentId) -> bool {
        match self.index.get(key) {
            Some(&i) => {
                self.entries[i].1 = id;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, key: &ChildKey) -> Option<ComponentId> {
        let i = self.index.remove(key)?;
        let (_, id) = self.entries.remove(i);
        self.reindex();
        Some(id)
    }

    /// Rewrite signature keys, e.g. after the pool was compacted.
    pub(crate) fn map_signatures(&mut self, mut f: impl FnMut(ConstantId) -> ConstantId) {
        for (key, _) in &mut self.entries {
            if let ChildKey::Signature(sig) = key {
                *sig = f(*sig);
            }
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, (key, _)) in self.entries.iter().enumerate() {
            self.index.insert(key.clone(), i);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ChildState {
    /// Child block bytes as read from the file; `base` is their offset in it.
    Unparsed { bytes: Arc<[u8]>, base: usize },
    Parsed(ChildMap),
}

#[derive(Debug, Clone)]
pub(crate) struct ChildSlot {
    /// Sibling the children were read for; their parent.
    pub(crate) owner: ComponentId,
    pub(crate) state: ChildState,
}

/// Result of looking up a name: nothing, one body, or every body present at
/// once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChildLookup {
    #[default]
    None,
    One(ComponentId),
    Composite(SmallVec<[ComponentId; 4]>),
}

impl ChildLookup {
    fn from_matches(mut matches: SmallVec<[ComponentId; 4]>) -> Self {
        match matches.len() {
            0 => ChildLookup::None,
            1 => ChildLookup::One(matches.remove(0)),
            _ => ChildLookup::Composite(matches),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ChildLookup::None)
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// The body when exactly one is present.
    pub fn single(&self) -> Option<ComponentId> {
        match self {
            ChildLookup::One(id) => Some(*id),
            _ => None,
        }
    }

    /// The first present body in sibling order.
    pub fn first(&self) -> Option<ComponentId> {
        self.ids().first().copied()
    }

    pub fn ids(&self) -> &[ComponentId] {
        match self {
            ChildLookup::None => &[],
            ChildLookup::One(id) => std::slice::from_ref(id),
            ChildLookup::Composite(ids) => ids,
        }
    }
}

impl FileStructure {
    /// Key of the name-slot a component occupies.
    pub(crate) fn child_key(&self, id: ComponentId) -> ChildKey {
        self.key_of_identity(self.component(id).identity)
    }

    pub(crate) fn key_of_identity(&self, identity: ConstantId) -> ChildKey {
        match self.pool.get(identity) {
            ConstantKind::Method { signature, .. } => {
                ChildKey::Signature(self.pool.canonical(*signature))
            }
            _ => ChildKey::Name(self.pool.name_of(identity).unwrap_or("").into()),
        }
    }

    // ========================================================================
    // Lazy child blocks
    // ========================================================================

    /// Parse the children of `id` if they are still raw bytes.
    pub fn ensure_children(&mut self, id: ComponentId) -> Result<(), FormatError> {
        let Some(slot) = self.component(id).children else {
            return Ok(());
        };
        let (bytes, base, owner) = match &self.slots[slot.as_usize()] {
            ChildSlot {
                owner,
                state: ChildState::Unparsed { bytes, base },
            } => (Arc::clone(bytes), *base, *owner),
            _ => return Ok(()),
        };
        let map = self.read_child_block(&bytes, base, owner)?;
        tracing::trace!(%slot, children = map.len(), "materialized child block");
        self.slots[slot.as_usize()].state = ChildState::Parsed(map);
        Ok(())
    }

    /// Parse every child block of the whole tree.
    pub fn ensure_all_children(&mut self) -> Result<(), FormatError> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            self.ensure_children(id)?;
            if let Some(map) = self.parsed_children(id) {
                for child in map.ids() {
                    stack.extend(self.siblings(child));
                }
            }
        }
        Ok(())
    }

    /// Like `ensure_children`, for queries that cannot fail: a corrupt block
    /// is reported and treated as empty.
    pub(crate) fn ensure_children_reported(&mut self, id: ComponentId) {
        if let Err(err) = self.ensure_children(id) {
            let identity = self.component(id).identity;
            tracing::error!(component = %self.pool.describe(identity), error = %err, "corrupt child block");
            self.report(
                Diagnostic::new(Severity::Fatal, VE_CORRUPT_CHILDREN)
                    .with_arg(self.pool.describe(identity))
                    .with_arg(err.to_string())
                    .with_source(identity),
            );
            if let Some(slot) = self.component(id).children {
                self.slots[slot.as_usize()].state = ChildState::Parsed(ChildMap::default());
            }
        }
    }

    /// The child map of `id` if it has been parsed.
    pub(crate) fn parsed_children(&self, id: ComponentId) -> Option<&ChildMap> {
        let slot = self.component(id).children?;
        match &self.slots[slot.as_usize()].state {
            ChildState::Parsed(map) => Some(map),
            ChildState::Unparsed { .. } => None,
        }
    }

    /// Whether `id` has child bytes not parsed yet.
    pub fn has_unparsed_children(&self, id: ComponentId) -> bool {
        self.component(id)
            .children
            .is_some_and(|slot| matches!(self.slots[slot.as_usize()].state, ChildState::Unparsed { .. }))
    }

    /// The slot of `parent`, creating an empty one shared by its whole
    /// sibling chain.
    fn slot_for(&mut self, parent: ComponentId) -> SlotId {
        if let Some(slot) = self.component(parent).children {
            return slot;
        }
        let slot = self.alloc_slot(parent, ChildState::Parsed(ChildMap::default()));
        for sibling in self.siblings(parent) {
            self.component_mut(sibling).children = Some(slot);
        }
        slot
    }

    // ========================================================================
    // Linking children
    // ========================================================================

    /// Link `child` under `parent`. A taken name links the child as the last
    /// sibling of the chain (sharing the chain's children) when the options
    /// allow siblings, and fails otherwise.
    pub fn add_child(&mut self, parent: ComponentId, child: ComponentId) -> bool {
        debug_assert!(self.component(child).parent.is_none());
        debug_assert!(self.component(parent).format().can_contain(self.component(child).format()));

        self.ensure_children_reported(parent);
        let key = self.child_key(child);
        let slot = self.slot_for(parent);
        let ChildState::Parsed(map) = &mut self.slots[slot.as_usize()].state else {
            return false;
        };

        let Some(eldest) = map.get(&key) else {
            map.insert(key, child);
            self.component_mut(child).parent = Some(parent);
            return true;
        };
        if !self.options.allow_conditional_siblings {
            tracing::debug!(name = ?key, "sibling rejected");
            return false;
        }

        let mut tail = eldest;
        while let Some(next) = self.component(tail).next_sibling {
            tail = next;
        }
        self.component_mut(tail).next_sibling = Some(child);
        self.component_mut(child).parent = Some(parent);

        match (self.component(eldest).children, self.component(child).children) {
            (Some(shared), _) => {
                debug_assert!(self.component(child).children.is_none_or(|s| s == shared));
                self.component_mut(child).children = Some(shared);
            }
            (None, Some(own)) => {
                for sibling in self.siblings(eldest) {
                    self.component_mut(sibling).children = Some(own);
                }
            }
            (None, None) => {}
        }
        tracing::trace!(name = ?key, sibling = %child, "linked conditional sibling");
        true
    }

    /// Unlink `child` from its parent. The next sibling, if any, becomes the
    /// eldest of the name-slot.
    pub fn remove_child(&mut self, child: ComponentId) -> bool {
        let Some(parent) = self.component(child).parent else {
            return false;
        };
        let key = self.child_key(child);
        let eldest = self.eldest_sibling(child);
        let next = self.component(child).next_sibling;

        if eldest == child {
            let Some(slot) = self.component(parent).children else {
                return false;
            };
            let ChildState::Parsed(map) = &mut self.slots[slot.as_usize()].state else {
                return false;
            };
            match next {
                Some(next) => map.replace(&key, next),
                None => map.remove(&key).is_some(),
            };
        } else {
            let mut prev = eldest;
            while let Some(n) = self.component(prev).next_sibling {
                if n == child {
                    break;
                }
                prev = n;
            }
            self.component_mut(prev).next_sibling = next;
        }

        let removed = self.component_mut(child);
        removed.parent = None;
        removed.next_sibling = None;
        true
    }

    /// Put `replacement` in the chain position of `old`.
    pub fn replace_child(&mut self, old: ComponentId, replacement: ComponentId) -> bool {
        let Some(parent) = self.component(old).parent else {
            return false;
        };
        if self.child_key(old) != self.child_key(replacement) {
            return false;
        }
        let key = self.child_key(old);
        let eldest = self.eldest_sibling(old);
        let next = self.component(old).next_sibling;

        if eldest == old {
            let Some(slot) = self.component(parent).children else {
                return false;
            };
            if let ChildState::Parsed(map) = &mut self.slots[slot.as_usize()].state {
                map.replace(&key, replacement);
            }
        } else {
            let mut prev = eldest;
            while let Some(n) = self.component(prev).next_sibling {
                if n == old {
                    break;
                }
                prev = n;
            }
            self.component_mut(prev).next_sibling = Some(replacement);
        }

        let children = self.component(old).children;
        let new = self.component_mut(replacement);
        new.parent = Some(parent);
        new.next_sibling = next;
        if new.children.is_none() {
            new.children = children;
        }
        let old = self.component_mut(old);
        old.parent = None;
        old.next_sibling = None;
        true
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Look up the child named `name`. Without a context every sibling counts
    /// as present.
    pub fn get_child(
        &mut self,
        parent: ComponentId,
        name: &str,
        ctx: Option<&dyn LinkerContext>,
    ) -> ChildLookup {
        self.lookup(parent, &ChildKey::Name(name.into()), ctx)
    }

    /// Look up a child by identity; a method identity is looked up by its
    /// signature under its multi-method.
    pub fn get_child_by_identity(
        &mut self,
        parent: ComponentId,
        identity: ConstantId,
        ctx: Option<&dyn LinkerContext>,
    ) -> ChildLookup {
        let key = self.key_of_identity(identity);
        self.lookup(parent, &key, ctx)
    }

    pub(crate) fn lookup(
        &mut self,
        parent: ComponentId,
        key: &ChildKey,
        ctx: Option<&dyn LinkerContext>,
    ) -> ChildLookup {
        self.ensure_children_reported(parent);
        let Some(eldest) = self.parsed_children(parent).and_then(|map| map.get(key)) else {
            return ChildLookup::None;
        };
        let first = self.component(eldest);
        if first.next_sibling.is_none() && first.condition.is_none() {
            return ChildLookup::One(eldest);
        }
        let present = self
            .siblings(eldest)
            .into_iter()
            .filter(|&s| ctx.is_none_or(|ctx| self.is_present(s, ctx)))
            .collect();
        ChildLookup::from_matches(present)
    }

    /// Whether the component's condition holds in `ctx`.
    pub fn is_present(&self, id: ComponentId, ctx: &dyn LinkerContext) -> bool {
        self.component(id)
            .condition
            .is_none_or(|cond| self.pool.evaluate_condition(cond, ctx))
    }

    /// Whether something with `access` may see the component.
    pub fn can_be_seen(&self, id: ComponentId, access: Access) -> bool {
        access.can_see(self.component(id).access())
    }

    /// Eldest sibling of the name-slot `id` occupies.
    pub fn eldest_sibling(&self, id: ComponentId) -> ComponentId {
        let Some(parent) = self.component(id).parent else {
            return id;
        };
        self.parsed_children(parent)
            .and_then(|map| map.get(&self.child_key(id)))
            .unwrap_or(id)
    }

    /// Every sibling of the name-slot, eldest first.
    pub fn siblings(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut next = Some(self.eldest_sibling(id));
        while let Some(cur) = next {
            out.push(cur);
            next = self.component(cur).next_sibling;
        }
        out
    }

    /// The eldest sibling of every name-slot under `id`, in order.
    pub fn children(&mut self, id: ComponentId) -> Vec<ComponentId> {
        self.ensure_children_reported(id);
        self.parsed_children(id)
            .map(|map| map.ids().collect())
            .unwrap_or_default()
    }

    pub fn child_names(&mut self, id: ComponentId) -> Vec<String> {
        self.children(id)
            .into_iter()
            .filter_map(|c| self.pool.name_of(self.component(c).identity).map(str::to_owned))
            .collect()
    }

    /// Call `visitor` for each child of `id` (each sibling too when
    /// `siblings` is set), descending into grandchildren when `recursive`.
    pub fn visit_children(
        &mut self,
        id: ComponentId,
        siblings: bool,
        recursive: bool,
        visitor: &mut dyn FnMut(&mut FileStructure, ComponentId),
    ) {
        for child in self.children(id) {
            let chain = if siblings {
                self.siblings(child)
            } else {
                vec![child]
            };
            for member in chain {
                visitor(self, member);
                if recursive {
                    self.visit_children(member, siblings, recursive, visitor);
                }
            }
        }
    }

    /// The component an identity names in this file, taking the eldest body
    /// of every name-slot on the way.
    pub fn component_of(&mut self, identity: ConstantId) -> Option<ComponentId> {
        let mut path = Vec::new();
        let mut cur = self.pool.canonical(identity);
        loop {
            match self.pool.get(cur) {
                ConstantKind::Module { .. } => break,
                kind if kind.is_identity() => {
                    path.push(cur);
                    cur = self.pool.canonical(kind.parent_identity()?);
                }
                _ => return None,
            }
        }
        let module_name = self.pool.name_of(cur)?.to_owned();
        let mut comp = self.get_child(self.root, &module_name, None).first()?;
        for step in path.into_iter().rev() {
            comp = self.get_child_by_identity(comp, step, None).first()?;
        }
        Some(comp)
    }
}
