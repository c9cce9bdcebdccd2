// src/component/resolve.rs
//
// Resolution of a simple name against a component: its own visible children
// first, then whatever its contributions bring in.

use rustc_hash::FxHashSet;
use strata_identity::{ComponentId, ConstantId};

use super::children::ChildLookup;
use super::contribution::Composition;
use super::flags::Format;
use crate::access::Access;
use crate::constant::ConstantKind;
use crate::diagnostics::{Diagnostic, Severity, VE_CYCLICAL_CONTRIBUTION};
use crate::file::FileStructure;

/// Outcome of a name resolution, ordered so that combining two outcomes is
/// taking the larger: an indeterminate or failed part dominates a found one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionResult {
    /// Definitely not there.
    Unknown,
    Resolved,
    /// Something the answer depends on is still unresolved; retry later.
    Possible,
    /// A cyclical contribution chain was found.
    Error,
}

impl ResolutionResult {
    pub fn combine(self, other: ResolutionResult) -> ResolutionResult {
        self.max(other)
    }
}

/// Receives whatever a resolution found.
pub trait ResolutionCollector {
    /// The name is a child (or set of conditional siblings).
    fn resolved_component(&mut self, lookup: &ChildLookup) -> ResolutionResult;

    /// The name is a constant, e.g. the formal type of an enclosing class.
    fn resolved_constant(&mut self, constant: ConstantId) -> ResolutionResult;
}

/// Keeps the last thing resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCollector {
    pub component: Option<ChildLookup>,
    pub constant: Option<ConstantId>,
}

impl SimpleCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResolutionCollector for SimpleCollector {
    fn resolved_component(&mut self, lookup: &ChildLookup) -> ResolutionResult {
        self.component = Some(lookup.clone());
        ResolutionResult::Resolved
    }

    fn resolved_constant(&mut self, constant: ConstantId) -> ResolutionResult {
        self.constant = Some(constant);
        ResolutionResult::Resolved
    }
}

impl FileStructure {
    /// Resolve `name` as seen from inside component `id` with `access`.
    pub fn resolve_name(
        &mut self,
        id: ComponentId,
        name: &str,
        access: Access,
        collector: &mut dyn ResolutionCollector,
    ) -> ResolutionResult {
        let mut visiting = FxHashSet::default();
        self.resolve_contributed_name(id, name, access, collector, true, &mut visiting)
    }

    fn resolve_contributed_name(
        &mut self,
        id: ComponentId,
        name: &str,
        mut access: Access,
        collector: &mut dyn ResolutionCollector,
        mut allow_into: bool,
        visiting: &mut FxHashSet<(ComponentId, bool)>,
    ) -> ResolutionResult {
        let lookup = self.get_child(id, name, None);
        if let Some(first) = lookup.first()
            && self.can_be_seen(first, access)
        {
            let format = self.component(first).format();
            return match format {
                Format::Property
                | Format::Module
                | Format::Package
                | Format::Typedef
                | Format::MultiMethod => collector.resolved_component(&lookup),
                f if f.is_nested_class() => collector.resolved_component(&lookup),
                _ => ResolutionResult::Unknown,
            };
        }

        let contributions = self.component(id).contributions.clone();
        for contrib in contributions {
            let ty = contrib.type_constant();
            if self.pool.contains_unresolved(ty) {
                return ResolutionResult::Possible;
            }
            match contrib.composition() {
                Composition::Into => {
                    if !allow_into {
                        continue;
                    }
                    access = access.most_visible(Access::Protected);
                }
                Composition::Delegates | Composition::Implements => access = Access::Public,
                Composition::Extends => access = access.most_visible(Access::Protected),
                Composition::Annotation | Composition::Incorporates => {
                    allow_into = false;
                    access = access.most_visible(Access::Protected);
                }
                _ => continue,
            }

            let result = self.resolve_in_type(
                id,
                ty,
                contrib.composition(),
                name,
                access,
                collector,
                allow_into,
                visiting,
            );
            if result != ResolutionResult::Unknown {
                return result;
            }
        }
        ResolutionResult::Unknown
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_in_type(
        &mut self,
        id: ComponentId,
        ty: ConstantId,
        composition: Composition,
        name: &str,
        access: Access,
        collector: &mut dyn ResolutionCollector,
        allow_into: bool,
        visiting: &mut FxHashSet<(ComponentId, bool)>,
    ) -> ResolutionResult {
        let ty = self.pool.strip_modifiers(ty);
        match self.pool.get(ty).clone() {
            ConstantKind::UnionType { first, second }
            | ConstantKind::IntersectionType { first, second } => {
                let a = self.resolve_in_type(
                    id, first, composition, name, access, collector, allow_into, visiting,
                );
                let b = self.resolve_in_type(
                    id, second, composition, name, access, collector, allow_into, visiting,
                );
                return a.combine(b);
            }
            ConstantKind::DifferenceType { first, .. } => {
                return self.resolve_in_type(
                    id, first, composition, name, access, collector, allow_into, visiting,
                );
            }
            _ => {}
        }

        // A virtual child type sees the type parameters of its parent type.
        if let Some(parent_ty) = self.pool.virtual_parent_type(ty)
            && let Some(parent_class) = self.pool.underlying_class(parent_ty)
            && let Some(parent) = self.component_of(parent_class)
            && self.index_of_generic_parameter(parent, name).is_some()
        {
            let formal = self.pool.ensure_property(parent_class, name);
            return collector.resolved_constant(formal);
        }

        if self.pool.is_object_type(ty) || !self.pool.is_explicit_class_identity(ty) {
            return ResolutionResult::Unknown;
        }
        let Some(class) = self.pool.underlying_class(ty) else {
            return ResolutionResult::Unknown;
        };
        let Some(contrib) = self.component_of(class) else {
            // not loaded yet; linking may still bring it in
            return ResolutionResult::Possible;
        };

        // a component re-entered with a different `into` allowance is no cycle
        if !visiting.insert((id, allow_into)) {
            let identity = self.component(id).identity;
            let described = self.pool.describe(identity);
            tracing::warn!(class = %described, via = composition.keyword(), "cyclical contribution");
            self.report(
                Diagnostic::new(Severity::Fatal, VE_CYCLICAL_CONTRIBUTION)
                    .with_arg(described)
                    .with_arg(composition.keyword())
                    .with_source(identity),
            );
            return ResolutionResult::Error;
        }
        let result = self.resolve_contributed_name(contrib, name, access, collector, allow_into, visiting);
        visiting.remove(&(id, allow_into));
        result
    }
}
