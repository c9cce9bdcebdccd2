// src/class/queries.rs
//
// Structural questions about classes: their supers, what they contribute,
// what they rebase onto and which methods they declare.

use rustc_hash::FxHashSet;
use strata_identity::{ComponentId, ConstantId};

use super::Relation;
use crate::component::{ChildKey, Composition, Contribution, Format};
use crate::constant::ConstantKind;
use crate::errors::StructureError;
use crate::file::FileStructure;

impl FileStructure {
    /// A non-static class nested in another class (directly or through
    /// properties). Its type is relative to the type of the enclosing class.
    pub fn is_virtual_child(&self, id: ComponentId) -> bool {
        let component = self.component(id);
        if !matches!(
            component.format(),
            Format::Interface | Format::Mixin | Format::Class | Format::Const | Format::Service
        ) || component.is_synthetic()
            || component.is_static()
        {
            return false;
        }
        self.containing_class(id).is_some_and(|parent| {
            let format = self.component(parent).format();
            format.is_class() && !matches!(format, Format::Module | Format::Package)
        })
    }

    /// The class an `extends` contribution names.
    pub fn super_class(&mut self, id: ComponentId) -> Option<ComponentId> {
        let ty = self.component(id).find_contribution(Composition::Extends)?.type_constant();
        let class = self.pool.underlying_class(ty)?;
        self.component_of(class)
    }

    /// Whether the class is `class_identity` or extends it, directly or not.
    pub fn extends_class(&mut self, id: ComponentId, class_identity: ConstantId) -> bool {
        if self.component(id).format() == Format::Interface {
            return false;
        }
        let target = self.pool.canonical(class_identity);
        let mut visited = FxHashSet::default();
        let mut current = id;
        loop {
            if self.component(current).identity == target {
                return true;
            }
            match self.super_class(current) {
                Some(next) if visited.insert(next) => current = next,
                _ => return false,
            }
        }
    }

    /// Whether `class_identity` is the class itself or anything it is
    /// composed of. Everything has `Object`.
    pub fn has_contribution(&mut self, id: ComponentId, class_identity: ConstantId) -> bool {
        let target = self.pool.canonical(class_identity);
        if target == self.pool.object_class() || target == self.component(id).identity {
            return true;
        }
        self.find_contribution_by_identity(id, target).is_some()
    }

    /// The contribution through which the class gets `class_identity`; for
    /// the class itself an `equal` contribution of its formal type.
    pub fn find_contribution_by_identity(
        &mut self,
        id: ComponentId,
        class_identity: ConstantId,
    ) -> Option<Contribution> {
        let target = self.pool.canonical(class_identity);
        if target == self.component(id).identity {
            let formal = self.formal_type(id);
            return Some(Contribution::new(Composition::Equal, formal));
        }
        let mut visited = FxHashSet::default();
        self.find_contribution_impl(id, target, true, &mut visited)
    }

    fn find_contribution_impl(
        &mut self,
        id: ComponentId,
        target: ConstantId,
        mut allow_into: bool,
        visited: &mut FxHashSet<ComponentId>,
    ) -> Option<Contribution> {
        if !visited.insert(id) {
            return None;
        }
        for contrib in self.component(id).contributions.clone() {
            match contrib.composition() {
                Composition::Into if !allow_into => continue,
                Composition::Into
                | Composition::Annotation
                | Composition::Delegates
                | Composition::Implements => allow_into = false,
                Composition::Incorporates | Composition::Extends => {}
                _ => continue,
            }
            for part in self.class_parts(contrib.type_constant()) {
                let Some(class) = self.pool.underlying_class(part) else {
                    continue;
                };
                if class == target {
                    return Some(contrib);
                }
                if let Some(component) = self.component_of(class)
                    && let Some(found) = self.find_contribution_impl(component, target, allow_into, visited)
                {
                    return Some(found);
                }
            }
        }
        None
    }

    /// The explicit class types a contribution type stands for: itself, or
    /// every part of an intersection.
    fn class_parts(&mut self, ty: ConstantId) -> Vec<ConstantId> {
        let ty = self.pool.strip_modifiers(ty);
        match self.pool.get(ty).clone() {
            ConstantKind::IntersectionType { first, second } => {
                let mut parts = self.class_parts(first);
                parts.extend(self.class_parts(second));
                parts
            }
            _ if self.pool.is_explicit_class_identity(ty) => vec![ty],
            _ => Vec::new(),
        }
    }

    /// What a mixin applies to: its `into` type, inherited from its super
    /// mixin, or `Object`.
    pub fn type_into(&mut self, id: ComponentId) -> Result<ConstantId, StructureError> {
        if self.component(id).format() != Format::Mixin {
            return Err(StructureError::WrongFormat {
                name: self.pool.describe(self.component(id).identity),
                expected: "mixin",
                found: self.component(id).format().name(),
            });
        }
        let mut visited = FxHashSet::default();
        let mut current = id;
        loop {
            if let Some(into) = self.component(current).find_contribution(Composition::Into) {
                return Ok(into.type_constant());
            }
            match self.super_class(current) {
                Some(next) if self.component(next).format() == Format::Mixin && visited.insert(next) => {
                    current = next;
                }
                _ => return Ok(self.pool.object_type()),
            }
        }
    }

    /// Whether `ty` (an annotation on component `id`) names a mixin that
    /// applies to classes rather than to instances.
    pub fn is_into_class_mixin(&mut self, id: ComponentId, ty: ConstantId) -> bool {
        if !self.pool.is_explicit_class_identity(ty) {
            return false;
        }
        let Some(class) = self.pool.underlying_class(ty) else {
            return false;
        };
        if class == self.component(id).identity {
            return false;
        }
        let Some(mixin) = self.component_of(class) else {
            return false;
        };
        if self.component(mixin).format() != Format::Mixin {
            return false;
        }
        let Ok(into) = self.type_into(mixin) else {
            return false;
        };
        let class_class = self.pool.class_class();
        self.pool.underlying_class(into) == Some(class_class)
    }

    /// The native type the class implicitly rebases onto: modules, packages
    /// and enums always do; a const or service does when its super is not
    /// of the same format.
    pub fn rebase_type(&mut self, id: ComponentId) -> Option<ConstantId> {
        let format = self.component(id).format();
        let native = match format {
            Format::Module => self.pool.module_class(),
            Format::Package => self.pool.package_class(),
            Format::Enum => self.pool.enum_class(),
            Format::Const | Format::Service => {
                if let Some(sup) = self.super_class(id)
                    && self.component(sup).format() == format
                {
                    return None;
                }
                if format == Format::Const {
                    self.pool.const_class()
                } else {
                    self.pool.service_class()
                }
            }
            _ => return None,
        };
        let native = self.pool.ensure_native_class(native);
        Some(self.pool.ensure_terminal_type(native))
    }

    /// `Tuple` itself, or a mixin into a tuple.
    pub fn is_tuple(&mut self, id: ComponentId) -> bool {
        let tuple = self.pool.tuple_class();
        if self.component(id).identity == tuple {
            return true;
        }
        let Some(into) = self.component(id).find_contribution(Composition::Into) else {
            return false;
        };
        let ty = into.type_constant();
        self.pool.underlying_class(ty) == Some(tuple)
    }

    /// First method named `name` under the class that accepts `arity`
    /// arguments, counting defaulted parameters as optional.
    pub fn find_method(&mut self, class: ComponentId, name: &str, arity: usize) -> Option<ComponentId> {
        let multi = self.get_child(class, name, None).first()?;
        if self.component(multi).format() != Format::MultiMethod {
            return None;
        }
        for method in self.children(multi) {
            for body in self.siblings(method) {
                let Some(params) = self.method_param_count(body) else {
                    continue;
                };
                let defaults = self
                    .component(body)
                    .as_method()
                    .map_or(0, |m| m.default_count as usize);
                if arity <= params && arity + defaults >= params {
                    return Some(body);
                }
            }
        }
        None
    }

    /// The method of the class with exactly this signature.
    pub fn find_method_by_signature(&mut self, class: ComponentId, signature: ConstantId) -> Option<ComponentId> {
        let signature = self.pool.canonical(signature);
        let ConstantKind::Signature { name, .. } = self.pool.get(signature) else {
            return None;
        };
        let name = self.pool.string(*name)?.to_owned();
        let multi = self.get_child(class, &name, None).first()?;
        self.lookup(multi, &ChildKey::Signature(signature), None).first()
    }

    /// Parameter and return types of a method component.
    pub(crate) fn method_signature(&self, method: ComponentId) -> Option<(Vec<ConstantId>, Vec<ConstantId>)> {
        let ConstantKind::Method { signature, .. } = self.pool.get(self.component(method).identity) else {
            return None;
        };
        match self.pool.get(self.pool.canonical(*signature)) {
            ConstantKind::Signature { params, returns, .. } => Some((params.to_vec(), returns.to_vec())),
            _ => None,
        }
    }

    fn method_param_count(&self, method: ComponentId) -> Option<usize> {
        self.method_signature(method).map(|(params, _)| params.len())
    }

    /// The type a contribution of the class stands for once the class's
    /// parameters are bound to `actuals`. `None` when a conditional
    /// incorporation does not apply to these actuals.
    pub fn contribution_resolve_type(
        &mut self,
        id: ComponentId,
        contribution: &Contribution,
        actuals: &[ConstantId],
    ) -> Option<ConstantId> {
        let ty = contribution.type_constant();
        if contribution.is_conditional_incorporate()
            && !self.check_conditional_incorporate(id, contribution, actuals)
        {
            return None;
        }
        if !self.pool.contains_formal_type(ty) {
            return Some(self.pool.canonical(ty));
        }
        let map = self.actuals_map(id, actuals);
        Some(self.pool.substitute_formals(ty, &map))
    }

    /// Whether every constrained parameter of a conditional incorporation is
    /// bound to a type satisfying its constraint. An unbound parameter is
    /// judged by its declared constraint.
    pub fn check_conditional_incorporate(
        &mut self,
        id: ComponentId,
        contribution: &Contribution,
        actuals: &[ConstantId],
    ) -> bool {
        for constraint in contribution.constraints().to_vec() {
            let Some(required) = constraint.constraint else {
                continue;
            };
            let Some(name) = self.pool.string(constraint.name).map(str::to_owned) else {
                return false;
            };
            let Some(index) = self.index_of_generic_parameter(id, &name) else {
                return false;
            };
            let actual = match actuals.get(index) {
                Some(&actual) => actual,
                None => self.own_type_params(id)[index].constraint,
            };
            if !self.is_a(actual, required) {
                return false;
            }
        }
        true
    }

    /// For a class standing for the right side of an assignment to a union,
    /// the best relation any of its contributions has to the union.
    pub fn find_union_contribution(
        &mut self,
        id: ComponentId,
        union: ConstantId,
        right_params: &[ConstantId],
    ) -> Relation {
        let mut best = Relation::Incompatible;
        for contrib in self.component(id).contributions.clone() {
            if !matches!(
                contrib.composition(),
                Composition::Into
                    | Composition::Incorporates
                    | Composition::Delegates
                    | Composition::Implements
                    | Composition::Extends
            ) {
                continue;
            }
            let Some(resolved) = self.contribution_resolve_type(id, &contrib, right_params) else {
                continue;
            };
            best = best.best_of(self.calculate_type_relation(union, resolved));
            if best == Relation::IsA {
                break;
            }
        }
        best
    }
}
