// src/class/generics.rs
//
// Type parameters of classes and the types built from them.
//
// A type parameter `T` of class `C` is addressed by the property identity
// `C.T`; the formal type `T` is the terminal type of that identity. Actual
// parameter lists are positional. For a virtual child the list carries the
// enclosing class's parameters first, then its own.

use rustc_hash::FxHashMap;
use strata_identity::{ComponentId, ConstantId};

use crate::component::{Format, TypeParam};
use crate::file::FileStructure;

impl FileStructure {
    /// Type parameters declared by the class itself.
    pub fn own_type_params(&self, id: ComponentId) -> &[TypeParam] {
        self.component(id)
            .as_class()
            .map(|class| class.type_params.as_slice())
            .unwrap_or(&[])
    }

    /// Every type parameter in scope of the class: the enclosing class's
    /// first when the class is a virtual child.
    pub fn type_params(&self, id: ComponentId) -> Vec<TypeParam> {
        let mut all = Vec::new();
        if self.is_virtual_child(id)
            && let Some(parent) = self.containing_class(id)
        {
            all = self.type_params(parent);
        }
        all.extend_from_slice(self.own_type_params(id));
        all
    }

    pub fn is_parameterized(&self, id: ComponentId) -> bool {
        !self.type_params(id).is_empty()
    }

    /// Position of the class's own type parameter `name`.
    pub fn index_of_generic_parameter(&self, id: ComponentId, name: &str) -> Option<usize> {
        self.own_type_params(id)
            .iter()
            .position(|p| self.pool.string(p.name) == Some(name))
    }

    /// Closest enclosing component that is not a property.
    pub(crate) fn containing_class(&self, id: ComponentId) -> Option<ComponentId> {
        let mut parent = self.component(id).parent;
        while let Some(p) = parent {
            if self.component(p).format() != Format::Property {
                return Some(p);
            }
            parent = self.component(p).parent;
        }
        None
    }

    /// `(formal identity, constraint)` of the class's own parameters.
    fn own_formals(&mut self, id: ComponentId) -> Vec<(ConstantId, ConstantId)> {
        let identity = self.component(id).identity;
        let params = self.own_type_params(id).to_vec();
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let name = self.pool.string(param.name).unwrap_or("").to_owned();
            out.push((self.pool.ensure_property(identity, &name), param.constraint));
        }
        out
    }

    /// `(formal identity, constraint)` of every parameter in scope, in the
    /// order of [`type_params`](Self::type_params).
    fn scoped_formals(&mut self, id: ComponentId) -> Vec<(ConstantId, ConstantId)> {
        let mut all = Vec::new();
        if self.is_virtual_child(id)
            && let Some(parent) = self.containing_class(id)
        {
            all = self.scoped_formals(parent);
        }
        all.extend(self.own_formals(id));
        all
    }

    /// The formal types of the class's own parameters, e.g. `[K, V]` for
    /// `Map<K, V>`.
    pub fn own_formal_params(&mut self, id: ComponentId) -> Vec<ConstantId> {
        self.own_formals(id)
            .into_iter()
            .map(|(formal, _)| self.pool.ensure_terminal_type(formal))
            .collect()
    }

    /// The class's type expressed with its own parameters: `Map<K, V>`, or
    /// `Outer<T>.Inner<U>` for a virtual child.
    pub fn formal_type(&mut self, id: ComponentId) -> ConstantId {
        if let Some(cached) = self.component(id).as_class().and_then(|c| c.formal_type) {
            return cached;
        }
        let identity = self.component(id).identity;
        let base = match self.virtual_parent(id) {
            Some(parent) => {
                let parent_ty = self.formal_type(parent);
                let name = self.pool.name_of(identity).unwrap_or("").to_owned();
                self.pool.ensure_virtual_child_type(parent_ty, &name)
            }
            None => self.pool.ensure_terminal_type(identity),
        };
        let own = self.own_formal_params(id);
        let ty = self.pool.ensure_parameterized_type(base, &own);
        if let Some(class) = self.component_mut(id).as_class_mut() {
            class.formal_type = Some(ty);
        }
        ty
    }

    /// The class's type with every parameter replaced by its constraint.
    /// A tuple's canonical type is the bare `Tuple`.
    pub fn canonical_type(&mut self, id: ComponentId) -> ConstantId {
        if let Some(cached) = self.component(id).as_class().and_then(|c| c.canonical_type) {
            return cached;
        }
        let identity = self.component(id).identity;
        let ty = if identity == self.pool.tuple_class() {
            self.pool.ensure_terminal_type(identity)
        } else {
            let base = match self.virtual_parent(id) {
                Some(parent) => {
                    let parent_ty = self.canonical_type(parent);
                    let name = self.pool.name_of(identity).unwrap_or("").to_owned();
                    self.pool.ensure_virtual_child_type(parent_ty, &name)
                }
                None => self.pool.ensure_terminal_type(identity),
            };
            let formals = self.own_formals(id);
            // constraints naming the class's own parameters see their raw bounds
            let mut bounds = FxHashMap::default();
            for &(formal, constraint) in &formals {
                bounds.insert(formal, self.pool.raw_type(constraint));
            }
            let mut params = Vec::with_capacity(formals.len());
            for (_, constraint) in formals {
                params.push(self.pool.substitute_formals(constraint, &bounds));
            }
            self.pool.ensure_parameterized_type(base, &params)
        };
        if let Some(class) = self.component_mut(id).as_class_mut() {
            class.canonical_type = Some(ty);
        }
        ty
    }

    fn virtual_parent(&self, id: ComponentId) -> Option<ComponentId> {
        if self.is_virtual_child(id) {
            self.containing_class(id)
        } else {
            None
        }
    }

    /// Map every formal in `formals` to its actual. Missing actuals become
    /// the constraint, itself resolved against the actuals known so far.
    fn bind_actuals(
        &mut self,
        formals: &[(ConstantId, ConstantId)],
        actuals: &[ConstantId],
    ) -> (FxHashMap<ConstantId, ConstantId>, Vec<ConstantId>) {
        let mut map = FxHashMap::default();
        let mut ordered = Vec::with_capacity(formals.len().max(actuals.len()));
        for (i, &(formal, _)) in formals.iter().enumerate() {
            if let Some(&actual) = actuals.get(i) {
                let actual = self.pool.canonical(actual);
                map.insert(formal, actual);
                ordered.push(actual);
            }
        }
        for &(formal, constraint) in formals.iter().skip(actuals.len()) {
            let resolved = if self.pool.contains_formal_type(constraint) {
                self.pool.substitute_formals(constraint, &map)
            } else {
                self.pool.canonical(constraint)
            };
            map.insert(formal, resolved);
            ordered.push(resolved);
        }
        ordered.extend(actuals.iter().skip(formals.len()).map(|&a| self.pool.canonical(a)));
        (map, ordered)
    }

    /// Formal-to-actual map for the parameters in scope of the class.
    pub(crate) fn actuals_map(&mut self, id: ComponentId, actuals: &[ConstantId]) -> FxHashMap<ConstantId, ConstantId> {
        let formals = self.scoped_formals(id);
        self.bind_actuals(&formals, actuals).0
    }

    /// The class's own parameter list completed with defaults for every
    /// missing trailing actual. Longer lists are returned as they are.
    pub fn normalize_parameters(&mut self, id: ComponentId, actuals: &[ConstantId]) -> Vec<ConstantId> {
        let formals = self.own_formals(id);
        if actuals.len() >= formals.len() {
            return actuals.iter().map(|&a| self.pool.canonical(a)).collect();
        }
        self.bind_actuals(&formals, actuals).1
    }

    /// The formal type of the class with its parameters (all parameters in
    /// scope) replaced by `actuals`, defaulting the missing ones.
    pub fn resolve_generics(&mut self, id: ComponentId, actuals: &[ConstantId]) -> ConstantId {
        let formal = self.formal_type(id);
        let map = self.actuals_map(id, actuals);
        self.pool.substitute_formals(formal, &map)
    }

    /// Constraint of the type parameter a formal identity names.
    pub(crate) fn formal_constraint(&mut self, formal: ConstantId) -> Option<ConstantId> {
        let owner = self.pool.parent_of(formal)?;
        let name = self.pool.name_of(formal)?.to_owned();
        let class = self.component_of(owner)?;
        let index = self.index_of_generic_parameter(class, &name)?;
        Some(self.own_type_params(class)[index].constraint)
    }
}
