// src/class/mod.rs
//! Class-level semantics over the component tree.
//!
//! Everything here is an `impl FileStructure` block working on class
//! components (including modules and packages, which are classes too):
//! - `generics`: type parameters, formal and canonical types
//! - `queries`: contribution lookups, supers, rebasing, method search
//! - `relation`: the assignability engine answering "is `right` a `left`"
//! - `variance`: whether a class produces or consumes a type parameter
//!
//! Relation queries memoize nothing across calls; they guard against
//! re-entry with sets held on the file, so they take `&mut self`.

mod generics;
mod queries;
mod relation;
mod variance;

#[cfg(test)]
mod tests;

/// How one type relates to another, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    Incompatible,
    /// Assignable, but only through a parameter used in both directions or
    /// filled in by default.
    IsAWeak,
    IsA,
}

impl Relation {
    pub fn best_of(self, other: Relation) -> Relation {
        self.max(other)
    }

    pub fn worst_of(self, other: Relation) -> Relation {
        self.min(other)
    }

    pub fn is_assignable(self) -> bool {
        self != Relation::Incompatible
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Relation::Incompatible => "incompatible",
            Relation::IsAWeak => "is-a (weak)",
            Relation::IsA => "is-a",
        })
    }
}
