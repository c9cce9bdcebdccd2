// src/file/versions.rs
//
// Version labels of the primary module.
//
// A single label is stored as the version of the primary module. With more
// than one, the module's condition carries a `Versioned` term per label as
// well, so a linker context pinned to one version can tell them apart.

use strata_identity::Version;

use super::FileStructure;
use crate::component::ComponentKind;
use crate::errors::StructureError;

impl FileStructure {
    /// Whether the primary module carries any version label.
    pub fn is_versioned(&self) -> bool {
        !self.versions.is_empty()
    }

    pub fn contains_version(&self, version: &Version) -> bool {
        self.versions.contains(version)
    }

    /// Whether `version` is supported by this exact label or, unless `exact`,
    /// by a later label substitutable for it.
    pub fn supports_version(&self, version: &Version, exact: bool) -> bool {
        if self.contains_version(version) {
            return true;
        }
        !exact && self.versions.find_highest_version_for(version).is_some()
    }

    /// Label an unlabelled module with `version`, or replace its single
    /// label.
    pub fn label_module_version(&mut self, version: &Version) -> Result<(), StructureError> {
        let version = version.normalize();
        match self.versions.len() {
            0 => {}
            1 => {
                if self.versions.contains(&version) {
                    return Ok(());
                }
                if let Some(old) = self.versions.find_highest_version().cloned() {
                    self.purge_version(&old);
                }
            }
            count => return Err(StructureError::MultipleVersionLabels { count }),
        }

        tracing::debug!(module = %self.module_name(), %version, "labelled module version");
        self.versions.put(version, ());
        self.store_version_labels();
        Ok(())
    }

    /// Remove one version label. Returns false when the label is absent.
    pub fn purge_version(&mut self, version: &Version) -> bool {
        let version = version.normalize();
        if self.versions.remove(&version).is_none() {
            return false;
        }
        tracing::debug!(module = %self.module_name(), %version, "purged module version");
        self.store_version_labels();
        true
    }

    /// Remove every version label except `version`.
    pub fn purge_versions_except(&mut self, version: &Version) -> Result<(), StructureError> {
        let version = version.normalize();
        if !self.versions.contains(&version) {
            return Err(StructureError::UnknownVersion {
                version: version.to_string(),
            });
        }
        if self.versions.len() == 1 {
            return Ok(());
        }
        self.versions.clear();
        self.versions.put(version, ());
        self.store_version_labels();
        Ok(())
    }

    /// Add the labels of `that`, a versioned file of the same primary module,
    /// that this file lacks. Only the labels are merged; the component trees
    /// are left as they are.
    pub fn merge_versions(&mut self, that: &FileStructure) -> Result<(), StructureError> {
        let merge_error = |reason| StructureError::IncompatibleMerge {
            this: self.module_name().to_owned(),
            that: that.module_name().to_owned(),
            reason,
        };
        if !self.is_versioned() {
            return Err(merge_error("this file carries no version label"));
        }
        if self.module_name() != that.module_name() {
            return Err(merge_error("the primary modules differ"));
        }
        if !that.is_versioned() {
            return Err(merge_error("the other file carries no version label"));
        }

        let added: Vec<Version> = that
            .versions()
            .filter(|v| !self.versions.contains(v))
            .cloned()
            .collect();
        if added.is_empty() {
            return Ok(());
        }
        tracing::debug!(module = %self.module_name(), added = added.len(), "merged module versions");
        for version in added {
            self.versions.put(version, ());
        }
        self.store_version_labels();
        Ok(())
    }

    /// Write the version tree back into the primary module.
    fn store_version_labels(&mut self) {
        let module = self.module;
        let mut condition = self.component(module).condition;
        if let Some(current) = condition {
            for old in self.pool.condition_versions(current) {
                condition = condition.and_then(|c| self.pool.remove_condition_version(c, &old));
            }
        }

        let labels: Vec<Version> = self.versions.versions().cloned().collect();
        if labels.len() > 1 {
            for label in &labels {
                condition = Some(self.pool.add_condition_version(condition, label));
            }
        }
        let version = self
            .versions
            .find_highest_version()
            .cloned()
            .map(|v| self.pool.ensure_version(&v));

        let component = self.component_mut(module);
        component.condition = condition;
        if let ComponentKind::Module(data) = &mut component.kind {
            data.version = version;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AssemblerOptions;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn file() -> FileStructure {
        FileStructure::new("app.example.org", AssemblerOptions::default())
    }

    #[test]
    fn relabelling_replaces_the_single_label() {
        let mut file = file();
        file.label_module_version(&v("1.0")).unwrap();
        file.label_module_version(&v("2.0")).unwrap();
        assert_eq!(file.versions().count(), 1);
        assert!(file.contains_version(&v("2.0")));
        assert!(file.contains_version(&v("2")));
        assert!(!file.contains_version(&v("1.0")));
    }

    #[test]
    fn relabelling_with_several_labels_fails() {
        let mut a = file();
        a.label_module_version(&v("1.0")).unwrap();
        let mut b = file();
        b.label_module_version(&v("2.0")).unwrap();
        a.merge_versions(&b).unwrap();
        assert_eq!(a.versions().count(), 2);
        assert_eq!(
            a.label_module_version(&v("3.0")),
            Err(StructureError::MultipleVersionLabels { count: 2 })
        );
    }

    #[test]
    fn merge_requires_the_same_module() {
        let mut a = file();
        a.label_module_version(&v("1.0")).unwrap();
        let mut other = FileStructure::new("other.example.org", AssemblerOptions::default());
        other.label_module_version(&v("1.0")).unwrap();
        assert!(matches!(
            a.merge_versions(&other),
            Err(StructureError::IncompatibleMerge { .. })
        ));
    }

    #[test]
    fn purge_all_but_one() {
        let mut a = file();
        a.label_module_version(&v("1.0")).unwrap();
        let mut b = file();
        b.label_module_version(&v("1.1")).unwrap();
        a.merge_versions(&b).unwrap();

        assert!(matches!(
            a.purge_versions_except(&v("9.9")),
            Err(StructureError::UnknownVersion { .. })
        ));
        a.purge_versions_except(&v("1.1")).unwrap();
        let labels: Vec<String> = a.versions().map(|v| v.to_string()).collect();
        assert_eq!(labels, vec!["1.1".to_string()]);
        assert!(!a.purge_version(&v("1.0")));
        assert!(a.purge_version(&v("1.1")));
        assert!(!a.is_versioned());
    }

    #[test]
    fn unexact_support_accepts_a_later_label() {
        let mut file = file();
        file.label_module_version(&v("1.2")).unwrap();
        assert!(file.supports_version(&v("1.2"), true));
        assert!(!file.supports_version(&v("1.1"), true));
        assert!(file.supports_version(&v("1.1"), false));
        assert!(!file.supports_version(&v("2.0"), false));
    }
}
