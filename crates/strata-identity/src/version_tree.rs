// version_tree.rs
//
// Ordered set of version labels with an associated value per label.
//
// Labels are kept sorted by Version ordering. Lookups treat versions that differ
// only by trailing zeros as the same label, so "1.2" and "1.2.0" address the
// same entry.

use crate::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTree<V> {
    entries: Vec<(Version, V)>,
}

impl<V> Default for VersionTree<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> VersionTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, ver: &Version) -> Option<usize> {
        self.entries.iter().position(|(v, _)| v.is_same_as(ver))
    }

    pub fn contains(&self, ver: &Version) -> bool {
        self.position(ver).is_some()
    }

    pub fn get(&self, ver: &Version) -> Option<&V> {
        self.position(ver).map(|i| &self.entries[i].1)
    }

    /// Store `value` for `ver`, replacing the value of an existing same label.
    pub fn put(&mut self, ver: Version, value: V) {
        if let Some(i) = self.position(&ver) {
            self.entries[i].1 = value;
            return;
        }
        let at = self.entries.partition_point(|(v, _)| *v < ver);
        self.entries.insert(at, (ver, value));
    }

    pub fn remove(&mut self, ver: &Version) -> Option<V> {
        self.position(ver).map(|i| self.entries.remove(i).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Versions in ascending order.
    pub fn versions(&self) -> impl DoubleEndedIterator<Item = &Version> + '_ {
        self.entries.iter().map(|(v, _)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Version, &V)> + '_ {
        self.entries.iter().map(|(v, value)| (v, value))
    }

    pub fn find_lowest_version(&self) -> Option<&Version> {
        self.entries.first().map(|(v, _)| v)
    }

    /// The latest version, preferring a GA release over any pre-release.
    pub fn find_highest_version(&self) -> Option<&Version> {
        self.highest_matching(|_| true)
    }

    /// The latest version substitutable for `ver`, preferring GA releases.
    pub fn find_highest_version_for(&self, ver: &Version) -> Option<&Version> {
        self.highest_matching(|v| v.is_substitutable_for(ver))
    }

    /// The oldest version substitutable for `ver`.
    pub fn find_lowest_substitutable(&self, ver: &Version) -> Option<&Version> {
        self.versions().find(|v| v.is_substitutable_for(ver))
    }

    fn highest_matching(&self, filter: impl Fn(&Version) -> bool) -> Option<&Version> {
        let candidates = || self.versions().rev().filter(|v| filter(v));
        candidates()
            .find(|v| v.is_ga())
            .or_else(|| candidates().next())
    }
}

impl<V: Clone> VersionTree<V> {
    pub fn put_all(&mut self, that: &VersionTree<V>) {
        for (ver, value) in that.iter() {
            self.put(ver.clone(), value.clone());
        }
    }
}
