// src/pool/types.rs
//
// Structural queries over type expressions that need only the pool, not the
// component tree.

use rustc_hash::FxHashMap;
use strata_identity::ConstantId;

use super::ConstantPool;
use crate::constant::{ConstantIdVec, ConstantKind};

impl ConstantPool {
    /// Peel access, annotation and immutability modifiers.
    pub fn strip_modifiers(&self, mut ty: ConstantId) -> ConstantId {
        loop {
            ty = self.canonical(ty);
            match self.get(ty) {
                ConstantKind::AccessType { ty: inner, .. }
                | ConstantKind::AnnotatedType { ty: inner, .. }
                | ConstantKind::ImmutableType { ty: inner } => ty = *inner,
                _ => return ty,
            }
        }
    }

    /// The constant a single-defining type is built on: the class, module,
    /// package, property (formal type), typedef or pseudo class of a terminal
    /// type, looking through parameterization and modifiers.
    pub fn defining_constant(&self, ty: ConstantId) -> Option<ConstantId> {
        let ty = self.strip_modifiers(ty);
        match self.get(ty) {
            ConstantKind::TerminalType { defining } => Some(self.canonical(*defining)),
            ConstantKind::ParameterizedType { base, .. } => self.defining_constant(*base),
            _ => None,
        }
    }

    /// Union, intersection or difference.
    pub fn is_relational(&self, ty: ConstantId) -> bool {
        matches!(
            self.get(self.strip_modifiers(ty)),
            ConstantKind::UnionType { .. }
                | ConstantKind::IntersectionType { .. }
                | ConstantKind::DifferenceType { .. }
        )
    }

    /// Actual type parameters of a type. A virtual child type carries the
    /// parameters of its parent first, then its own.
    pub fn type_param_types(&self, ty: ConstantId) -> ConstantIdVec {
        let ty = self.strip_modifiers(ty);
        match self.get(ty) {
            ConstantKind::ParameterizedType { base, params } => {
                let mut all = self.type_param_types(*base);
                all.extend(params.iter().map(|p| self.canonical(*p)));
                all
            }
            ConstantKind::VirtualChildType { parent, .. } => self.type_param_types(*parent),
            _ => ConstantIdVec::new(),
        }
    }

    pub fn is_parameterized_type(&self, ty: ConstantId) -> bool {
        !self.type_param_types(ty).is_empty()
    }

    /// Parent type of a virtual child type.
    pub fn virtual_parent_type(&self, ty: ConstantId) -> Option<ConstantId> {
        let ty = self.strip_modifiers(ty);
        match self.get(ty) {
            ConstantKind::ParameterizedType { base, .. } => self.virtual_parent_type(*base),
            ConstantKind::VirtualChildType { parent, .. } => Some(self.canonical(*parent)),
            _ => None,
        }
    }

    /// The unparameterized form of a type: `Map<K, V>` becomes `Map`.
    pub fn raw_type(&self, ty: ConstantId) -> ConstantId {
        let ty = self.strip_modifiers(ty);
        match self.get(ty) {
            ConstantKind::ParameterizedType { base, .. } => self.raw_type(*base),
            _ => ty,
        }
    }

    /// Class identity (or module/package identity) a type is an instance of,
    /// when the type names exactly one. Virtual child types resolve to the
    /// nested class identity under their parent's class.
    pub fn underlying_class(&mut self, ty: ConstantId) -> Option<ConstantId> {
        let ty = self.strip_modifiers(ty);
        match self.get(ty).clone() {
            ConstantKind::TerminalType { defining } => {
                let defining = self.canonical(defining);
                match self.get(defining) {
                    ConstantKind::Class { .. }
                    | ConstantKind::Module { .. }
                    | ConstantKind::Package { .. } => Some(defining),
                    ConstantKind::NativeClass { class } | ConstantKind::ThisClass { class } => {
                        Some(self.canonical(*class))
                    }
                    ConstantKind::Typedef { .. } => {
                        let target = self.typedef_target(defining)?;
                        self.underlying_class(target)
                    }
                    _ => None,
                }
            }
            ConstantKind::ParameterizedType { base, .. } => self.underlying_class(base),
            ConstantKind::VirtualChildType { parent, name } => {
                let parent_class = self.underlying_class(parent)?;
                let name = self.string(name)?.to_owned();
                Some(self.ensure_class(parent_class, &name))
            }
            _ => None,
        }
    }

    /// Whether the type names one explicit class (as opposed to a relational
    /// type, a formal type or an unresolved name).
    pub fn is_explicit_class_identity(&mut self, ty: ConstantId) -> bool {
        self.underlying_class(ty)
            .is_some_and(|id| matches!(self.get(id), ConstantKind::Class { .. }))
    }

    /// The formal type parameter a type names directly, as its property
    /// identity.
    pub fn formal_property(&self, ty: ConstantId) -> Option<ConstantId> {
        let ty = self.strip_modifiers(ty);
        match self.get(ty) {
            ConstantKind::TerminalType { defining } => {
                let defining = self.canonical(*defining);
                matches!(self.get(defining), ConstantKind::Property { .. }).then_some(defining)
            }
            _ => None,
        }
    }

    /// Whether a formal type parameter appears anywhere in the type.
    pub fn contains_formal_type(&self, ty: ConstantId) -> bool {
        let ty = self.canonical(ty);
        match self.get(ty) {
            ConstantKind::TerminalType { .. } => self.formal_property(ty).is_some(),
            kind if kind.is_type() => kind
                .references()
                .into_iter()
                .any(|r| self.get(self.canonical(r)).is_type() && self.contains_formal_type(r)),
            _ => false,
        }
    }

    /// Rebuild `ty` with every formal type found in `actuals` (keyed by the
    /// formal's property identity) replaced by its actual type.
    pub fn substitute_formals(
        &mut self,
        ty: ConstantId,
        actuals: &FxHashMap<ConstantId, ConstantId>,
    ) -> ConstantId {
        let ty = self.canonical(ty);
        if actuals.is_empty() {
            return ty;
        }
        match self.get(ty).clone() {
            ConstantKind::TerminalType { defining } => {
                actuals.get(&self.canonical(defining)).copied().unwrap_or(ty)
            }
            ConstantKind::ParameterizedType { base, params } => {
                let new_base = self.substitute_formals(base, actuals);
                let mut new_params = ConstantIdVec::with_capacity(params.len());
                for p in &params {
                    new_params.push(self.substitute_formals(*p, actuals));
                }
                if new_base == self.canonical(base) && new_params.iter().zip(&params).all(|(a, b)| *a == self.canonical(*b)) {
                    return ty;
                }
                self.ensure_parameterized_type(new_base, &new_params)
            }
            ConstantKind::VirtualChildType { parent, name } => {
                let new_parent = self.substitute_formals(parent, actuals);
                if new_parent == self.canonical(parent) {
                    return ty;
                }
                let name = self.string(name).unwrap_or("").to_owned();
                self.ensure_virtual_child_type(new_parent, &name)
            }
            ConstantKind::UnionType { first, second } => {
                let (a, b) = (self.substitute_formals(first, actuals), self.substitute_formals(second, actuals));
                self.ensure_union_type(a, b)
            }
            ConstantKind::IntersectionType { first, second } => {
                let (a, b) = (self.substitute_formals(first, actuals), self.substitute_formals(second, actuals));
                self.ensure_intersection_type(a, b)
            }
            ConstantKind::DifferenceType { first, second } => {
                let (a, b) = (self.substitute_formals(first, actuals), self.substitute_formals(second, actuals));
                self.ensure_difference_type(a, b)
            }
            ConstantKind::ImmutableType { ty: inner } => {
                let inner = self.substitute_formals(inner, actuals);
                self.ensure_immutable_type(inner)
            }
            ConstantKind::AccessType { ty: inner, access } => {
                let inner = self.substitute_formals(inner, actuals);
                self.ensure_access_type(inner, access)
            }
            ConstantKind::AnnotatedType { annotation, ty: inner } => {
                let inner = self.substitute_formals(inner, actuals);
                self.ensure_annotated_type(annotation, inner)
            }
            _ => ty,
        }
    }
}
