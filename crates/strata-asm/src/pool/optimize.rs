// src/pool/optimize.rs
//
// Reference marking and mark-and-compact.
//
// A registration pass resets every count, then the owner marks each constant it
// stores. The first mark of a constant marks everything it refers to, so after
// the pass a zero count means nothing reachable uses the constant.

use std::cmp::Reverse;

use rustc_hash::FxHashMap;
use strata_identity::ConstantId;

use super::{ConstantPool, PoolEntry, WellKnownClasses};
use crate::constant::ConstantKind;
use crate::errors::PoolError;

/// Old position to new position, produced by [`ConstantPool::optimize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRemap {
    map: Vec<Option<ConstantId>>,
}

impl ConstantRemap {
    /// The new position of `old`, or `None` if it was dropped.
    pub fn get(&self, old: ConstantId) -> Option<ConstantId> {
        self.map.get(old.as_usize()).copied().flatten()
    }

    /// The new position of a constant that is known to have survived.
    pub fn apply(&self, old: ConstantId) -> ConstantId {
        let new = self.get(old);
        debug_assert!(new.is_some(), "{old} was dropped but is still stored");
        new.unwrap_or(old)
    }

    pub fn apply_opt(&self, old: Option<ConstantId>) -> Option<ConstantId> {
        old.map(|id| self.apply(id))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.map.iter().filter(|m| m.is_none()).count()
    }
}

/// One constant of the compacted pool before its final position is known.
struct Folded {
    kind: ConstantKind,
    refs: u32,
    first: usize,
}

impl ConstantPool {
    pub fn is_registering(&self) -> bool {
        self.recursive
    }

    /// Start a registration pass: every count is reset and every constant
    /// registered until the pass ends counts as used.
    pub fn begin_recursive_registration(&mut self) -> Result<(), PoolError> {
        if self.recursive {
            return Err(PoolError::RegistrationActive);
        }
        for entry in &mut self.entries {
            entry.refs = 0;
        }
        self.recursive = true;
        Ok(())
    }

    /// Count one use of `id`; the first use also marks what it refers to.
    pub fn mark_referenced(&mut self, id: ConstantId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let next = self.canonical(next);
            let entry = &mut self.entries[next.as_usize()];
            entry.refs += 1;
            if entry.refs == 1 {
                stack.extend(entry.kind.references());
            }
        }
    }

    /// End the pass, compacting when `optimize` is set.
    pub fn end_recursive_registration(
        &mut self,
        optimize: bool,
    ) -> Result<Option<ConstantRemap>, PoolError> {
        if !self.recursive {
            return Err(PoolError::RegistrationInactive);
        }
        self.recursive = false;
        if optimize {
            self.optimize().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Drop every constant with no marks, merge constants that became equal
    /// once resolved names were substituted, and order the rest by descending
    /// use so the most used constants get the shortest indexes.
    #[tracing::instrument(skip(self), fields(pool = %self.id))]
    pub fn optimize(&mut self) -> Result<ConstantRemap, PoolError> {
        let old_len = self.entries.len();
        let mut memo: Vec<Option<u32>> = vec![None; old_len];
        let mut folded: Vec<Folded> = Vec::new();
        let mut index: FxHashMap<ConstantKind, u32> = FxHashMap::default();
        let mut expanding = vec![false; old_len];

        for root in 0..old_len {
            let entry = &self.entries[root];
            if entry.refs == 0 || entry.forward.is_some() || memo[root].is_some() {
                continue;
            }
            self.fold(root, &mut memo, &mut expanding, &mut folded, &mut index)?;
        }

        let mut order: Vec<usize> = (0..folded.len()).collect();
        order.sort_by_key(|&t| (Reverse(folded[t].refs), folded[t].first));
        let mut final_of = vec![0u32; folded.len()];
        for (pos, &t) in order.iter().enumerate() {
            final_of[t] = pos as u32;
        }

        let entries: Vec<PoolEntry> = order
            .iter()
            .map(|&t| PoolEntry {
                kind: folded[t]
                    .kind
                    .map_references(|r| ConstantId::new(final_of[r.as_usize()])),
                refs: folded[t].refs,
                forward: None,
            })
            .collect();

        let map: Vec<Option<ConstantId>> = (0..old_len)
            .map(|old| {
                let old = self.canonical(ConstantId::new(old as u32));
                memo[old.as_usize()].map(|t| ConstantId::new(final_of[t as usize]))
            })
            .collect();
        let remap = ConstantRemap { map };

        let typedefs = self
            .typedefs
            .iter()
            .filter_map(|(&k, &v)| Some((remap.get(k)?, remap.get(v)?)))
            .collect();

        self.entries = entries;
        self.typedefs = typedefs;
        self.well_known = WellKnownClasses::new();
        self.rebuild_indexes();

        tracing::debug!(
            before = old_len,
            after = self.entries.len(),
            dropped = remap.dropped(),
            "optimized constant pool"
        );
        Ok(remap)
    }

    /// Post-order walk from `root` that assigns each reachable constant its
    /// folded slot, children before parents.
    fn fold(
        &self,
        root: usize,
        memo: &mut [Option<u32>],
        expanding: &mut [bool],
        folded: &mut Vec<Folded>,
        index: &mut FxHashMap<ConstantKind, u32>,
    ) -> Result<(), PoolError> {
        let mut stack = vec![(root, false)];

        while let Some((i, expanded)) = stack.pop() {
            if memo[i].is_some() {
                continue;
            }
            let entry = &self.entries[i];
            if !expanded {
                if expanding[i] {
                    return Err(PoolError::DanglingReference { index: i as u32 });
                }
                expanding[i] = true;
                stack.push((i, true));
                for r in entry.kind.references() {
                    let r = self.canonical(r).as_usize();
                    if memo[r].is_none() {
                        stack.push((r, false));
                    }
                }
                continue;
            }

            let mut dangling = false;
            let kind = entry.kind.map_references(|r| {
                match memo[self.canonical(r).as_usize()] {
                    Some(t) => ConstantId::new(t),
                    None => {
                        dangling = true;
                        r
                    }
                }
            });
            if dangling {
                return Err(PoolError::DanglingReference { index: i as u32 });
            }

            let slot = match index.get(&kind) {
                Some(&t) => {
                    folded[t as usize].refs += entry.refs;
                    t
                }
                None => {
                    let t = folded.len() as u32;
                    index.insert(kind.clone(), t);
                    folded.push(Folded {
                        kind,
                        refs: entry.refs,
                        first: i,
                    });
                    t
                }
            };
            memo[i] = Some(slot);
        }
        Ok(())
    }
}
