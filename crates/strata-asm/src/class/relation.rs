// src/class/relation.rs
//
// The assignability engine.
//
// `calculate_type_relation(left, right)` answers whether a value of type
// `right` may be assigned to a variable of type `left`. Relational and
// modified types are taken apart first; once the right side names a single
// class, `calculate_relation` asks that class whether it is, or is composed
// of, the class on the left, and `calculate_assignability` compares the type
// parameters when both sides name the same class.
//
// A pair of types already being related higher up the stack is assumed to
// relate; recursive type definitions would otherwise never terminate.

use strata_identity::{ComponentId, ConstantId};

use super::Relation;
use crate::access::Access;
use crate::component::Composition;
use crate::constant::{ConstantIdVec, ConstantKind};
use crate::diagnostics::{Diagnostic, Severity, VE_TOO_MANY_TYPE_PARAMS};
use crate::file::FileStructure;

impl FileStructure {
    /// Whether `ty` is assignable to `other`.
    pub fn is_a(&mut self, ty: ConstantId, other: ConstantId) -> bool {
        self.calculate_type_relation(other, ty).is_assignable()
    }

    /// How a value of type `right` relates to a variable of type `left`.
    pub fn calculate_type_relation(&mut self, left: ConstantId, right: ConstantId) -> Relation {
        let left = self.pool.canonical(left);
        let right = self.pool.canonical(right);
        if left == right {
            return Relation::IsA;
        }
        if !self.relating.insert((left, right)) {
            return Relation::IsA;
        }
        let relation = self.type_relation(left, right);
        self.relating.remove(&(left, right));
        tracing::trace!(
            left = %self.pool.describe(left),
            right = %self.pool.describe(right),
            %relation,
            "type relation"
        );
        relation
    }

    fn type_relation(&mut self, left: ConstantId, right: ConstantId) -> Relation {
        // right side: take apart everything that is not a single class
        match self.pool.get(right).clone() {
            ConstantKind::ImmutableType { ty } => {
                if let ConstantKind::ImmutableType { ty: inner } = self.pool.get(left).clone() {
                    return self.calculate_type_relation(inner, ty);
                }
                return self.calculate_type_relation(left, ty);
            }
            ConstantKind::AccessType { ty, .. } | ConstantKind::AnnotatedType { ty, .. } => {
                return self.calculate_type_relation(left, ty);
            }
            ConstantKind::UnionType { first, second } => {
                let a = self.calculate_type_relation(left, first);
                if a == Relation::Incompatible {
                    return a;
                }
                return a.worst_of(self.calculate_type_relation(left, second));
            }
            ConstantKind::IntersectionType { first, second } => {
                let a = self.calculate_type_relation(left, first);
                if a == Relation::IsA {
                    return a;
                }
                return a.best_of(self.calculate_type_relation(left, second));
            }
            ConstantKind::DifferenceType { first, .. } => {
                return self.calculate_type_relation(left, first);
            }
            ConstantKind::TerminalType { defining } => {
                let defining = self.pool.canonical(defining);
                match self.pool.get(defining).clone() {
                    ConstantKind::Property { .. } => {
                        // a formal type is whatever its constraint allows
                        let constraint = match self.formal_constraint(defining) {
                            Some(c) => c,
                            None => self.pool.object_type(),
                        };
                        return self.calculate_type_relation(left, constraint);
                    }
                    ConstantKind::Typedef { .. } => {
                        return match self.pool.typedef_target(defining) {
                            Some(target) => self.calculate_type_relation(left, target),
                            None => Relation::Incompatible,
                        };
                    }
                    ConstantKind::UnresolvedName(_) => return Relation::Incompatible,
                    ConstantKind::ThisClass { class } => {
                        let ty = self.pool.ensure_terminal_type(class);
                        return self.calculate_type_relation(left, ty);
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        // left side
        match self.pool.get(left).clone() {
            ConstantKind::AccessType { ty, .. } | ConstantKind::AnnotatedType { ty, .. } => {
                return self.calculate_type_relation(ty, right);
            }
            ConstantKind::ImmutableType { .. } => {
                // only an immutable right side gets here by unwrapping above
                return Relation::Incompatible;
            }
            ConstantKind::UnionType { first, second } => {
                let a = self.calculate_type_relation(first, right);
                if a == Relation::IsA {
                    return a;
                }
                let best = a.best_of(self.calculate_type_relation(second, right));
                if best != Relation::Incompatible {
                    return best;
                }
                return match self.right_class(right) {
                    Some(class) => {
                        let params = self.pool.type_param_types(right);
                        self.find_union_contribution(class, left, &params)
                    }
                    None => Relation::Incompatible,
                };
            }
            ConstantKind::IntersectionType { first, second } => {
                let a = self.calculate_type_relation(first, right);
                if a == Relation::Incompatible {
                    return a;
                }
                return a.worst_of(self.calculate_type_relation(second, right));
            }
            ConstantKind::DifferenceType { first, second } => {
                if self.calculate_type_relation(second, right) != Relation::Incompatible {
                    return Relation::Incompatible;
                }
                return self.calculate_type_relation(first, right);
            }
            _ => {}
        }
        if self.pool.is_object_type(left) {
            return Relation::IsA;
        }

        match self.right_class(right) {
            Some(class) => self.calculate_relation(class, left, right, true),
            None => Relation::Incompatible,
        }
    }

    /// The component of the single class a right-hand type names.
    fn right_class(&mut self, right: ConstantId) -> Option<ComponentId> {
        let class = self.pool.underlying_class(right)?;
        self.component_of(class)
    }

    /// How `right`, a type of class `id`, relates to `left`. Contributions
    /// are searched when `left` is not the class itself; `into` contributions
    /// only while `allow_into` holds.
    pub fn calculate_relation(
        &mut self,
        id: ComponentId,
        left: ConstantId,
        right: ConstantId,
        allow_into: bool,
    ) -> Relation {
        let access = self.access_of(left);
        let left = self.pool.strip_modifiers(left);
        let left_class = match self.pool.get(left).clone() {
            ConstantKind::VirtualChildType { .. } => self.pool.underlying_class(left),
            _ => match self.pool.defining_constant(left) {
                None => None,
                Some(defining) => match self.pool.get(defining).clone() {
                    ConstantKind::Module { .. } | ConstantKind::Package { .. } => {
                        // modules and packages only ever match themselves
                        return if defining == self.component(id).identity {
                            Relation::IsA
                        } else {
                            Relation::Incompatible
                        };
                    }
                    ConstantKind::Class { .. } => Some(defining),
                    ConstantKind::NativeClass { class } => Some(self.pool.canonical(class)),
                    ConstantKind::ThisClass { class } => {
                        let base = self.pool.ensure_terminal_type(class);
                        let params = self.own_param_types(left);
                        let narrowed = self.pool.ensure_parameterized_type(base, &params);
                        return self.calculate_relation(id, narrowed, right, allow_into);
                    }
                    ConstantKind::Typedef { .. } => {
                        return match self.pool.typedef_target(defining) {
                            Some(target) => self.calculate_type_relation(target, right),
                            None => Relation::Incompatible,
                        };
                    }
                    _ => return Relation::Incompatible,
                },
            },
        };
        let Some(left_class) = left_class else {
            return Relation::Incompatible;
        };

        if left_class == self.pool.object_class() {
            return Relation::IsA;
        }

        let identity = self.component(id).identity;
        let left_params = self.own_param_types(left);
        let right_params = self.own_param_types(right);

        if left_class == identity {
            let mut relation = self.calculate_assignability(id, &left_params, access, &right_params);
            // a virtual child also needs its enclosing types to match
            if relation != Relation::Incompatible
                && let (Some(left_parent), Some(right_parent)) =
                    (self.pool.virtual_parent_type(left), self.pool.virtual_parent_type(right))
            {
                relation = relation.worst_of(self.calculate_type_relation(left_parent, right_parent));
            }
            return relation;
        }

        // same-named virtual children of related enclosing classes
        if self.is_virtual_child(id)
            && let Some(left_parent) = self.pool.virtual_parent_type(left)
            && self.pool.name_of(left_class) == self.pool.name_of(identity)
        {
            let right_parent = match self.pool.virtual_parent_type(right) {
                Some(parent) => Some(parent),
                None => self.containing_class(id).map(|p| self.formal_type(p)),
            };
            if let Some(right_parent) = right_parent
                && self.calculate_type_relation(left_parent, right_parent) != Relation::Incompatible
            {
                return self.calculate_assignability(id, &left_params, access, &right_params);
            }
        }

        let mut best = Relation::Incompatible;
        if let Some(rebase) = self.rebase_type(id)
            && let Some(native) = self.right_class(rebase)
            && native != id
        {
            best = self.calculate_relation(native, left, rebase, allow_into);
            if best == Relation::IsA {
                return best;
            }
        }

        let all_right_params = self.pool.type_param_types(right);
        let mut allow_into = allow_into;
        for contrib in self.component(id).contributions.clone() {
            let relation = match contrib.composition() {
                Composition::Into if !allow_into => continue,
                Composition::Into | Composition::Delegates | Composition::Implements => {
                    if self.pool.is_object_type(contrib.type_constant()) {
                        continue;
                    }
                    let Some(resolved) = self.contribution_resolve_type(id, &contrib, &all_right_params)
                    else {
                        continue;
                    };
                    self.calculate_type_relation(left, resolved)
                }
                Composition::Annotation | Composition::Incorporates => {
                    if contrib.composition() == Composition::Annotation
                        && self.is_into_class_mixin(id, contrib.type_constant())
                    {
                        continue;
                    }
                    allow_into = false;
                    let Some(resolved) = self.contribution_resolve_type(id, &contrib, &all_right_params)
                    else {
                        continue;
                    };
                    match self.right_class(resolved) {
                        Some(mixin) => self.calculate_relation(mixin, left, resolved, false),
                        None => Relation::Incompatible,
                    }
                }
                Composition::Extends => {
                    let Some(resolved) = self.contribution_resolve_type(id, &contrib, &all_right_params)
                    else {
                        continue;
                    };
                    match self.right_class(resolved) {
                        Some(sup) if sup != id => self.calculate_relation(sup, left, resolved, allow_into),
                        _ => Relation::Incompatible,
                    }
                }
                _ => continue,
            };
            best = best.best_of(relation);
            if best == Relation::IsA {
                break;
            }
        }
        best
    }

    /// Whether `C<right_params>` may be assigned to `C<left_params>` for the
    /// class `C` with component `id`, looking only at members visible with
    /// `left_access`.
    ///
    /// Extra parameters on the right are ignored. For each parameter on the
    /// left that differs from the right one:
    /// - a left type assignable to the right type is fine when the class
    ///   never produces the parameter;
    /// - a right type assignable to the left type is fine when the class
    ///   produces it, but weak when it also consumes it;
    /// - anything else is incompatible.
    ///
    /// A missing right parameter stands for the parameter's constraint
    /// (`Object` for tuples). Tuples produce and consume every position.
    pub fn calculate_assignability(
        &mut self,
        id: ComponentId,
        left_params: &[ConstantId],
        left_access: Access,
        right_params: &[ConstantId],
    ) -> Relation {
        let is_tuple = self.is_tuple(id);
        let formals = self.own_type_params(id).to_vec();
        let count = left_params.len().max(right_params.len());

        if !is_tuple && count > formals.len() {
            let described = self.pool.describe(self.component(id).identity);
            tracing::warn!(
                class = %described,
                required = formals.len(),
                provided = count,
                "invalid number of type arguments"
            );
            self.report(
                Diagnostic::new(Severity::Warning, VE_TOO_MANY_TYPE_PARAMS)
                    .with_arg(described)
                    .with_arg(formals.len().to_string())
                    .with_arg(count.to_string())
                    .with_source(self.component(id).identity),
            );
            return Relation::Incompatible;
        }

        let mut weak = false;
        for (i, &left) in left_params.iter().enumerate() {
            let left = self.pool.canonical(left);
            let (name, canonical) = if is_tuple {
                (None, self.pool.object_type())
            } else {
                let param = formals[i];
                (self.pool.string(param.name).map(str::to_owned), param.constraint)
            };

            let produces =
                is_tuple || name.as_deref().is_some_and(|n| self.produces_formal_type(id, n, left_access));
            let mut left_is_right = false;
            let right = match right_params.get(i) {
                Some(&right) => {
                    let right = self.pool.canonical(right);
                    if left == right {
                        continue;
                    }
                    left_is_right = self.is_a(left, right);
                    if left_is_right && !produces {
                        // only consumed: contravariant
                        continue;
                    }
                    right
                }
                None => canonical,
            };

            if self.is_a(right, left) {
                if left_is_right {
                    // congruent
                    continue;
                }
                if produces {
                    if is_tuple
                        || name.as_deref().is_some_and(|n| self.consumes_formal_type(id, n, left_access))
                    {
                        weak = true;
                    }
                    continue;
                }
            }
            return Relation::Incompatible;
        }
        if weak { Relation::IsAWeak } else { Relation::IsA }
    }

    /// Parameters of the outermost parameterization of a type; a virtual
    /// child type's own parameters without those of its parent.
    pub(crate) fn own_param_types(&self, ty: ConstantId) -> ConstantIdVec {
        let ty = self.pool.strip_modifiers(ty);
        match self.pool.get(ty) {
            ConstantKind::ParameterizedType { params, .. } => {
                params.iter().map(|p| self.pool.canonical(*p)).collect()
            }
            _ => ConstantIdVec::new(),
        }
    }

    /// Access a type is viewed with; public unless it says otherwise.
    fn access_of(&self, ty: ConstantId) -> Access {
        let mut ty = self.pool.canonical(ty);
        loop {
            match self.pool.get(ty) {
                ConstantKind::AccessType { access, .. } => return *access,
                ConstantKind::ImmutableType { ty: inner } | ConstantKind::AnnotatedType { ty: inner, .. } => {
                    ty = self.pool.canonical(*inner);
                }
                _ => return Access::Public,
            }
        }
    }
}
