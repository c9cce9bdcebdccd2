// src/pool/locator.rs
//
// Secondary lookup keys for constants that can be found from a raw value
// without building the constant first.

use std::hash::{Hash, Hasher};

/// Borrowed form used for lookups; hashes identically to the owned [`Locator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LocatorKey<'a> {
    Int(i64),
    Byte(u8),
    Char(char),
    String(&'a str),
    IntLiteral(&'a str),
    FPLiteral(&'a str),
    /// A module identity, located by its qualified name.
    Module(&'a str),
}

#[derive(Debug, Clone)]
pub(crate) enum Locator {
    Int(i64),
    Byte(u8),
    Char(char),
    String(Box<str>),
    IntLiteral(Box<str>),
    FPLiteral(Box<str>),
    Module(Box<str>),
}

impl Locator {
    pub(crate) fn key(&self) -> LocatorKey<'_> {
        match self {
            Locator::Int(v) => LocatorKey::Int(*v),
            Locator::Byte(v) => LocatorKey::Byte(*v),
            Locator::Char(v) => LocatorKey::Char(*v),
            Locator::String(s) => LocatorKey::String(s),
            Locator::IntLiteral(s) => LocatorKey::IntLiteral(s),
            Locator::FPLiteral(s) => LocatorKey::FPLiteral(s),
            Locator::Module(s) => LocatorKey::Module(s),
        }
    }
}

impl From<LocatorKey<'_>> for Locator {
    fn from(key: LocatorKey<'_>) -> Self {
        match key {
            LocatorKey::Int(v) => Locator::Int(v),
            LocatorKey::Byte(v) => Locator::Byte(v),
            LocatorKey::Char(v) => Locator::Char(v),
            LocatorKey::String(s) => Locator::String(s.into()),
            LocatorKey::IntLiteral(s) => Locator::IntLiteral(s.into()),
            LocatorKey::FPLiteral(s) => Locator::FPLiteral(s.into()),
            LocatorKey::Module(s) => Locator::Module(s.into()),
        }
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Locator {}

impl Hash for Locator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use rustc_hash::FxBuildHasher;

    use super::*;

    #[test]
    fn owned_and_borrowed_hash_alike() {
        let hasher = FxBuildHasher;
        let owned = Locator::from(LocatorKey::String("Object"));
        assert_eq!(
            hasher.hash_one(&owned),
            hasher.hash_one(LocatorKey::String("Object"))
        );
        assert_ne!(owned, Locator::Module("Object".into()));
    }
}
