// src/constant/condition.rs
//
// Conditional inclusion. A condition constant is evaluated against a
// LinkerContext that knows which options were specified, which identities are
// present and which module versions were linked.

use rustc_hash::{FxHashMap, FxHashSet};
use strata_identity::{ConstantId, Version};

use crate::constant::ConstantKind;
use crate::pool::ConstantPool;

/// What the linker knows while choosing among conditional components.
pub trait LinkerContext {
    /// A named option such as `debug` was specified.
    fn is_specified(&self, name: &str) -> bool;

    /// The identity with this path (`module:package.Class`) is present.
    fn is_present(&self, identity_path: &str) -> bool;

    /// The linked version of `module` satisfies `version`.
    fn is_version_match(&self, module: &str, version: &Version) -> bool;

    /// The module being linked is exactly `version`.
    fn is_version(&self, version: &Version) -> bool;
}

/// A fixed context assembled up front; what the builder-style tools and tests use.
#[derive(Debug, Clone, Default)]
pub struct StaticLinkerContext {
    names: FxHashSet<String>,
    present: FxHashSet<String>,
    modules: FxHashMap<String, Version>,
    version: Option<Version>,
}

impl StaticLinkerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn with_present(mut self, identity_path: impl Into<String>) -> Self {
        self.present.insert(identity_path.into());
        self
    }

    pub fn with_module_version(mut self, module: impl Into<String>, version: Version) -> Self {
        self.modules.insert(module.into(), version);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }
}

impl LinkerContext for StaticLinkerContext {
    fn is_specified(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn is_present(&self, identity_path: &str) -> bool {
        self.present.contains(identity_path)
    }

    fn is_version_match(&self, module: &str, version: &Version) -> bool {
        self.modules
            .get(module)
            .is_some_and(|linked| linked.is_substitutable_for(version))
    }

    fn is_version(&self, version: &Version) -> bool {
        self.version.as_ref().is_some_and(|v| v.is_same_as(version))
    }
}

impl ConstantPool {
    /// Evaluate a condition constant. Anything that is not a condition never holds.
    pub fn evaluate_condition(&self, condition: ConstantId, ctx: &dyn LinkerContext) -> bool {
        match self.get(condition) {
            ConstantKind::ConditionNot { condition } => !self.evaluate_condition(*condition, ctx),
            ConstantKind::ConditionAll { conditions } => conditions
                .iter()
                .all(|c| self.evaluate_condition(*c, ctx)),
            ConstantKind::ConditionAny { conditions } => conditions
                .iter()
                .any(|c| self.evaluate_condition(*c, ctx)),
            ConstantKind::ConditionNamed { name } => {
                self.string(*name).is_some_and(|n| ctx.is_specified(n))
            }
            ConstantKind::ConditionPresent { identity } => {
                ctx.is_present(&self.identity_path(*identity))
            }
            ConstantKind::ConditionVersionMatches { module, version } => {
                match (self.name_of(*module), self.version_of(*version)) {
                    (Some(module), Some(version)) => ctx.is_version_match(module, version),
                    _ => false,
                }
            }
            ConstantKind::ConditionVersioned { version } => {
                self.version_of(*version).is_some_and(|v| ctx.is_version(v))
            }
            other => {
                debug_assert!(false, "{:?} is not a condition", other.format());
                false
            }
        }
    }

    pub fn version_of(&self, id: ConstantId) -> Option<&Version> {
        match self.get(id) {
            ConstantKind::Version(v) => Some(v),
            _ => None,
        }
    }

    /// The version named by a `ConditionVersioned` term.
    pub fn versioned_label(&self, condition: ConstantId) -> Option<&Version> {
        match self.get(condition) {
            ConstantKind::ConditionVersioned { version } => self.version_of(*version),
            _ => None,
        }
    }

    // ========================================================================
    // Version terms
    //
    // A versioned component carries its version labels as the last term of its
    // condition: either a single `Versioned`, an `Any` of `Versioned` terms, or
    // the last element of an `All` whose other elements are ordinary conditions.
    // ========================================================================

    /// A `Versioned` term, or an `Any` made only of them.
    fn is_version_term(&self, condition: ConstantId) -> bool {
        match self.get(condition) {
            ConstantKind::ConditionVersioned { .. } => true,
            ConstantKind::ConditionAny { conditions } => conditions
                .iter()
                .all(|c| matches!(self.get(*c), ConstantKind::ConditionVersioned { .. })),
            _ => false,
        }
    }

    /// Version labels carried by a condition, in term order.
    pub fn condition_versions(&self, condition: ConstantId) -> Vec<Version> {
        match self.get(condition) {
            ConstantKind::ConditionVersioned { .. } => {
                self.versioned_label(condition).cloned().into_iter().collect()
            }
            ConstantKind::ConditionAny { conditions } if self.is_version_term(condition) => {
                conditions
                    .iter()
                    .filter_map(|c| self.versioned_label(*c).cloned())
                    .collect()
            }
            ConstantKind::ConditionAll { conditions } => match conditions.last() {
                Some(&last) if self.is_version_term(last) => self.condition_versions(last),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// `condition` extended so that it also holds for `version`. A condition
    /// that already names the version is returned unchanged.
    pub fn add_condition_version(
        &mut self,
        condition: Option<ConstantId>,
        version: &Version,
    ) -> ConstantId {
        let versioned = self.ensure_versioned_condition(version);
        let Some(condition) = condition else {
            return versioned;
        };
        if self
            .condition_versions(condition)
            .iter()
            .any(|v| v.is_same_as(version))
        {
            return condition;
        }

        match self.get(condition).clone() {
            ConstantKind::ConditionVersioned { .. } => {
                self.ensure_any_condition(&[condition, versioned])
            }
            ConstantKind::ConditionAny { mut conditions } if self.is_version_term(condition) => {
                conditions.push(versioned);
                self.ensure_any_condition(&conditions)
            }
            ConstantKind::ConditionAll { mut conditions } => {
                match conditions.last().copied() {
                    Some(last) if self.is_version_term(last) => {
                        let widened = self.add_condition_version(Some(last), version);
                        if let Some(slot) = conditions.last_mut() {
                            *slot = widened;
                        }
                    }
                    _ => conditions.push(versioned),
                }
                self.ensure_all_condition(&conditions)
            }
            _ => self.ensure_all_condition(&[condition, versioned]),
        }
    }

    /// `condition` without the `version` term. `None` means nothing is left.
    pub fn remove_condition_version(
        &mut self,
        condition: ConstantId,
        version: &Version,
    ) -> Option<ConstantId> {
        match self.get(condition).clone() {
            ConstantKind::ConditionVersioned { .. } => {
                let same = self
                    .versioned_label(condition)
                    .is_some_and(|v| v.is_same_as(version));
                (!same).then_some(condition)
            }
            ConstantKind::ConditionAny { conditions } if self.is_version_term(condition) => {
                let kept: Vec<ConstantId> = conditions
                    .iter()
                    .copied()
                    .filter(|c| !self.versioned_label(*c).is_some_and(|v| v.is_same_as(version)))
                    .collect();
                match kept.len() {
                    0 => None,
                    _ => Some(self.ensure_any_condition(&kept)),
                }
            }
            ConstantKind::ConditionAll { mut conditions } => {
                let Some(last) = conditions.last().copied() else {
                    return Some(condition);
                };
                if !self.is_version_term(last) {
                    return Some(condition);
                }
                match self.remove_condition_version(last, version) {
                    Some(narrowed) => {
                        if let Some(slot) = conditions.last_mut() {
                            *slot = narrowed;
                        }
                    }
                    None => {
                        conditions.pop();
                    }
                }
                match conditions.len() {
                    0 => None,
                    _ => Some(self.ensure_all_condition(&conditions)),
                }
            }
            _ => Some(condition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn named_and_composite_conditions() {
        let mut pool = ConstantPool::default();
        let debug = pool.ensure_named_condition("debug");
        let test = pool.ensure_named_condition("test");
        let not_debug = pool.ensure_not_condition(debug);
        let both = pool.ensure_all_condition(&[debug, test]);
        let either = pool.ensure_any_condition(&[debug, test]);

        let ctx = StaticLinkerContext::new().with_name("debug");
        assert!(pool.evaluate_condition(debug, &ctx));
        assert!(!pool.evaluate_condition(not_debug, &ctx));
        assert!(!pool.evaluate_condition(both, &ctx));
        assert!(pool.evaluate_condition(either, &ctx));
    }

    #[test]
    fn presence_uses_identity_path() {
        let mut pool = ConstantPool::default();
        let module = pool.ensure_module("lib.example.org");
        let pkg = pool.ensure_package(module, "util");
        let class = pool.ensure_class(pkg, "Cache");
        let present = pool.ensure_present_condition(class);

        let ctx = StaticLinkerContext::new().with_present("lib.example.org:util.Cache");
        assert!(pool.evaluate_condition(present, &ctx));
        assert!(!pool.evaluate_condition(present, &StaticLinkerContext::new()));
    }

    #[test]
    fn version_conditions() {
        let mut pool = ConstantPool::default();
        let module = pool.ensure_module("lib.example.org");
        let wants_two = pool.ensure_version_match_condition(module, &v("2"));
        let is_one = pool.ensure_versioned_condition(&v("1.0"));

        let ctx = StaticLinkerContext::new()
            .with_module_version("lib.example.org", v("2.1"))
            .with_version(v("1"));
        assert!(pool.evaluate_condition(wants_two, &ctx));
        assert!(pool.evaluate_condition(is_one, &ctx));
        assert_eq!(pool.versioned_label(is_one), Some(&v("1.0")));

        let old = StaticLinkerContext::new().with_module_version("lib.example.org", v("1.9"));
        assert!(!pool.evaluate_condition(wants_two, &old));
    }

    #[test]
    fn version_terms_are_added_last() {
        let mut pool = ConstantPool::default();
        let one = pool.add_condition_version(None, &v("1"));
        assert_eq!(pool.condition_versions(one), vec![v("1")]);
        assert_eq!(pool.add_condition_version(Some(one), &v("1.0")), one);

        let both = pool.add_condition_version(Some(one), &v("2"));
        assert_eq!(pool.condition_versions(both), vec![v("1"), v("2")]);

        let debug = pool.ensure_named_condition("debug");
        let gated = pool.add_condition_version(Some(debug), &v("3"));
        assert_eq!(pool.condition_versions(gated), vec![v("3")]);
        let wider = pool.add_condition_version(Some(gated), &v("4"));
        assert_eq!(pool.condition_versions(wider), vec![v("3"), v("4")]);

        let ctx = StaticLinkerContext::new().with_name("debug").with_version(v("4"));
        assert!(pool.evaluate_condition(wider, &ctx));
        assert!(!pool.evaluate_condition(gated, &ctx));
    }

    #[test]
    fn removing_the_last_version_term() {
        let mut pool = ConstantPool::default();
        let one = pool.add_condition_version(None, &v("1"));
        assert_eq!(pool.remove_condition_version(one, &v("1")), None);

        let both = pool.add_condition_version(Some(one), &v("2"));
        let left = pool.remove_condition_version(both, &v("2")).unwrap();
        assert_eq!(left, one);

        let debug = pool.ensure_named_condition("debug");
        let gated = pool.add_condition_version(Some(debug), &v("3"));
        assert_eq!(pool.remove_condition_version(gated, &v("3")), Some(debug));
        assert_eq!(pool.remove_condition_version(debug, &v("3")), Some(debug));
    }
}
