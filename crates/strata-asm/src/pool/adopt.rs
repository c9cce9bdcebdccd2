// src/pool/adopt.rs
//
// Deep copies of constants out of another pool.

use rustc_hash::FxHashMap;
use strata_identity::ConstantId;

use super::ConstantPool;
use crate::errors::PoolError;

impl ConstantPool {
    /// Copy `id` and everything it refers to from `source` into this pool.
    ///
    /// Only pools in the valid set (this pool plus the pools of linked modules)
    /// may contribute constants; anything else is a cross-pool contamination.
    pub fn adopt(&mut self, source: &ConstantPool, id: ConstantId) -> Result<ConstantId, PoolError> {
        let mut copied = FxHashMap::default();
        self.adopt_cached(source, id, &mut copied)
    }

    /// Like [`adopt`](Self::adopt), reusing `copied` across calls so a subtree
    /// copy visits each source constant once.
    pub(crate) fn adopt_cached(
        &mut self,
        source: &ConstantPool,
        id: ConstantId,
        copied: &mut FxHashMap<ConstantId, ConstantId>,
    ) -> Result<ConstantId, PoolError> {
        if source.id == self.id {
            return Ok(self.canonical(id));
        }
        if !self.valid_pools.contains(&source.id) {
            return Err(PoolError::ForeignConstant {
                constant: source.describe(id),
                source_pool: source.id,
                target_pool: self.id,
            });
        }
        Ok(self.copy_from(source, id, copied))
    }

    fn copy_from(
        &mut self,
        source: &ConstantPool,
        id: ConstantId,
        copied: &mut FxHashMap<ConstantId, ConstantId>,
    ) -> ConstantId {
        let id = source.canonical(id);
        if let Some(&done) = copied.get(&id) {
            return done;
        }
        let kind = source
            .get(id)
            .map_references(|r| self.copy_from(source, r, copied));
        let local = self.intern(kind);
        if let Some(target) = source.typedefs.get(&id) {
            let target = self.copy_from(source, *target, copied);
            self.typedefs.entry(local).or_insert(target);
        }
        copied.insert(id, local);
        local
    }
}
