// src/class/variance.rs
//
// Producer/consumer analysis of type parameters.
//
// A class produces its parameter `T` when a visible member hands out a `T`
// (a method returning one, a property getter) and consumes it when a
// visible member takes one in (a method parameter, a property setter).
// Nested generic types flip the direction through the variance of the
// class they parameterize: returning a `Consumer<T>` consumes `T`.
// Contributions pass their variance up through whatever the class binds
// their parameters to.

use strata_identity::{ComponentId, ConstantId};

use crate::access::Access;
use crate::component::{Composition, Format};
use crate::constant::ConstantKind;
use crate::file::FileStructure;

impl FileStructure {
    /// Whether the class consumes its type parameter `name` through members
    /// visible with `access`.
    pub fn consumes_formal_type(&mut self, id: ComponentId, name: &str, access: Access) -> bool {
        self.scan_formal_type(id, name, access, false, true)
    }

    /// Whether the class produces its type parameter `name` through members
    /// visible with `access`.
    pub fn produces_formal_type(&mut self, id: ComponentId, name: &str, access: Access) -> bool {
        self.scan_formal_type(id, name, access, true, true)
    }

    fn scan_formal_type(
        &mut self,
        id: ComponentId,
        name: &str,
        access: Access,
        produces: bool,
        allow_into: bool,
    ) -> bool {
        let key = (id, Box::<str>::from(name), produces);
        if !self.scanning.insert(key.clone()) {
            return false;
        }
        let found = self.scan_members(id, name, access, produces)
            || self.scan_contributions(id, name, access, produces, allow_into);
        self.scanning.remove(&key);
        found
    }

    fn scan_members(&mut self, id: ComponentId, name: &str, access: Access, produces: bool) -> bool {
        for child in self.children(id) {
            match self.component(child).format() {
                Format::MultiMethod => {
                    for method in self.children(child) {
                        for body in self.siblings(method) {
                            let component = self.component(body);
                            if component.is_static() || !access.can_see(component.access()) {
                                continue;
                            }
                            let Some((params, returns)) = self.method_signature(body) else {
                                continue;
                            };
                            // a parameter flips the direction, a return keeps it
                            let hit = params.iter().any(|&p| self.type_scan(p, name, access, !produces))
                                || returns.iter().any(|&r| self.type_scan(r, name, access, produces));
                            if hit {
                                return true;
                            }
                        }
                    }
                }
                Format::Property => {
                    let component = self.component(child);
                    let declared = component.access();
                    let Some(prop) = component.as_property().cloned() else {
                        continue;
                    };
                    if prop.is_type_param {
                        continue;
                    }
                    if access.can_see(declared) && self.type_scan(prop.ty, name, access, produces) {
                        return true;
                    }
                    // a read-only property has no setter to look at
                    if prop.read_only {
                        continue;
                    }
                    let setter = prop.var_access.unwrap_or(declared);
                    if access.can_see(setter) && self.type_scan(prop.ty, name, access, !produces) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn scan_contributions(
        &mut self,
        id: ComponentId,
        name: &str,
        access: Access,
        produces: bool,
        allow_into: bool,
    ) -> bool {
        for contrib in self.component(id).contributions.clone() {
            match contrib.composition() {
                Composition::Into if !allow_into => continue,
                Composition::Into
                | Composition::Delegates
                | Composition::Implements
                | Composition::Annotation
                | Composition::Incorporates
                | Composition::Extends => {}
                _ => continue,
            }
            let ty = contrib.type_constant();
            if self.pool.is_relational(ty) {
                if self.type_scan(ty, name, access, produces) {
                    return true;
                }
                continue;
            }
            if contrib.is_conditional_incorporate() && !self.check_conditional_incorporate(id, &contrib, &[]) {
                continue;
            }
            let Some(class) = self.pool.underlying_class(ty) else {
                continue;
            };
            let Some(contributed) = self.component_of(class) else {
                continue;
            };
            if contributed == id {
                continue;
            }
            let params = self.own_param_types(ty);
            let params = self.normalize_parameters(contributed, &params);
            let formals = self.own_type_params(contributed).to_vec();
            for (param, formal) in params.into_iter().zip(formals) {
                let Some(formal) = self.pool.string(formal.name).map(str::to_owned) else {
                    continue;
                };
                // our parameter used as the contributed class's parameter
                // goes wherever that one goes
                if self.type_scan(param, name, access, true)
                    && self.scan_formal_type(contributed, &formal, access, produces, false)
                {
                    return true;
                }
                if self.type_scan(param, name, access, false)
                    && self.scan_formal_type(contributed, &formal, access, !produces, false)
                {
                    return true;
                }
            }
        }
        false
    }

    /// Whether type `ty` produces (or consumes, when `produces` is false)
    /// the formal type named `name`.
    fn type_scan(&mut self, ty: ConstantId, name: &str, access: Access, produces: bool) -> bool {
        let ty = self.pool.strip_modifiers(ty);
        match self.pool.get(ty).clone() {
            ConstantKind::TerminalType { .. } => {
                produces
                    && self
                        .pool
                        .formal_property(ty)
                        .is_some_and(|formal| self.pool.name_of(formal) == Some(name))
            }
            ConstantKind::UnionType { first, second }
            | ConstantKind::IntersectionType { first, second }
            | ConstantKind::DifferenceType { first, second } => {
                self.type_scan(first, name, access, produces) || self.type_scan(second, name, access, produces)
            }
            ConstantKind::ParameterizedType { base, params } => {
                let Some(class) = self.pool.underlying_class(base) else {
                    return false;
                };
                let Some(component) = self.component_of(class) else {
                    return false;
                };
                let formals = self.own_type_params(component).to_vec();
                for (&param, formal) in params.iter().zip(formals) {
                    let Some(formal) = self.pool.string(formal.name).map(str::to_owned) else {
                        continue;
                    };
                    if self.type_scan(param, name, access, produces)
                        && self.produces_formal_type(component, &formal, access)
                    {
                        return true;
                    }
                    if self.type_scan(param, name, access, !produces)
                        && self.consumes_formal_type(component, &formal, access)
                    {
                        return true;
                    }
                }
                false
            }
            ConstantKind::VirtualChildType { parent, .. } => self.type_scan(parent, name, access, produces),
            _ => false,
        }
    }
}
