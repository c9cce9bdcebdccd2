//! First-class handles for assembler entities.
//!
//! Constants, components and child slots all live in index-addressed stores; these
//! newtypes keep the indexes from being mixed up with each other or with raw
//! positions read off the wire.

use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> u32 {
                self.0
            }

            /// The index widened for slice access.
            #[inline]
            pub fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_entity_id! {
    /// Position of a constant inside its owning pool.
    pub struct ConstantId;
}

define_entity_id! {
    /// Handle of a component inside a file's component arena.
    pub struct ComponentId;
}

define_entity_id! {
    /// Handle of a child map shared by every sibling of one name-slot.
    pub struct SlotId;
}

define_entity_id! {
    /// Process-unique identity of a constant pool, used for cross-pool checks.
    pub struct PoolId;
}

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

impl PoolId {
    /// Allocate a fresh pool identity.
    pub fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_copy_and_four_bytes() {
        let id = ConstantId::new(7);
        let copy = id;
        assert_eq!(id, copy);
        assert_eq!(size_of::<ConstantId>(), 4);
        assert_eq!(size_of::<Option<ComponentId>>(), 8);
    }

    #[test]
    fn pool_ids_are_unique() {
        let a = PoolId::next();
        let b = PoolId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(SlotId::new(3).to_string(), "SlotId#3");
    }
}
