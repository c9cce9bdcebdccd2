// src/file/builder.rs
//
// Creating components and contributions. This is the surface a compiler
// front end populates a file through.

use strata_identity::{ComponentId, ConstantId, Version};

use super::FileStructure;
use crate::access::Access;
use crate::component::contribution::insert_ordered;
use crate::component::{
    ClassData, Component, ComponentFlags, ComponentKind, Composition, Contribution, Format,
    IncorporateConstraint, MethodData, ModuleData, ModuleType, PropertyData, TypeParam,
};
use crate::constant::ConstantKind;
use crate::errors::StructureError;

impl FileStructure {
    // ========================================================================
    // Linking new components
    // ========================================================================

    /// Link a new component under `parent`. A taken name is only accepted
    /// for a conditional component, which joins the name-slot as a sibling.
    fn attach(
        &mut self,
        parent: ComponentId,
        mut component: Component,
        condition: Option<ConstantId>,
    ) -> Result<ComponentId, StructureError> {
        let parent_format = self.component(parent).format();
        let format = component.format();
        if !parent_format.can_contain(format) {
            return Err(StructureError::IllegalChild {
                child: format.name(),
                parent: parent_format.name(),
            });
        }

        let key = self.key_of_identity(component.identity);
        if self.lookup(parent, &key, None).is_some() {
            let name = self.pool.describe(component.identity);
            if condition.is_none() {
                return Err(StructureError::DuplicateChild {
                    parent: self.pool.describe(self.component(parent).identity),
                    name,
                });
            }
            if !self.options.allow_conditional_siblings {
                return Err(StructureError::SiblingsDisallowed { name });
            }
        }

        component.condition = condition;
        let identity = component.identity;
        let id = self.alloc(component);
        if !self.add_child(parent, id) {
            return Err(StructureError::DuplicateChild {
                parent: self.pool.describe(self.component(parent).identity),
                name: self.pool.describe(identity),
            });
        }
        tracing::trace!(component = %self.pool.describe(identity), format = %format, "created component");
        Ok(id)
    }

    fn identity_of(&self, id: ComponentId) -> ConstantId {
        self.component(id).identity
    }

    fn expect_class(&self, id: ComponentId, expected: &'static str) -> Result<(), StructureError> {
        if self.component(id).is_class() {
            Ok(())
        } else {
            Err(self.wrong_format(id, expected))
        }
    }

    fn wrong_format(&self, id: ComponentId, expected: &'static str) -> StructureError {
        StructureError::WrongFormat {
            name: self.pool.describe(self.identity_of(id)),
            expected,
            found: self.component(id).format().name(),
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// A module other than the primary one: a fingerprint of a dependency
    /// or an embedded copy of one.
    pub fn create_module(&mut self, name: &str, module_type: ModuleType) -> Result<ComponentId, StructureError> {
        let identity = self.pool.ensure_module(name);
        let module = Component::new(
            identity,
            ComponentFlags::new(Format::Module, Access::Public),
            ComponentKind::Module(ModuleData {
                module_type,
                version: None,
            }),
        );
        let root = self.root;
        self.attach(root, module, None)
    }

    /// Fingerprint of a module this file depends on, optionally pinned to a
    /// required version.
    pub fn create_fingerprint(
        &mut self,
        name: &str,
        required: Option<&Version>,
    ) -> Result<ComponentId, StructureError> {
        let id = self.create_module(name, ModuleType::Fingerprint)?;
        let version = required.map(|v| self.pool.ensure_version(v));
        if let ComponentKind::Module(data) = &mut self.component_mut(id).kind {
            data.version = version;
        }
        Ok(id)
    }

    pub fn create_package(&mut self, parent: ComponentId, name: &str, access: Access) -> Result<ComponentId, StructureError> {
        let identity = self.pool.ensure_package(self.identity_of(parent), name);
        let package = Component::new(identity, ComponentFlags::new(Format::Package, access), ComponentKind::Package);
        self.attach(parent, package, None)
    }

    /// A class of any nested format (interface, class, const, enum, enum
    /// value, mixin or service).
    pub fn create_class(
        &mut self,
        parent: ComponentId,
        format: Format,
        name: &str,
        access: Access,
    ) -> Result<ComponentId, StructureError> {
        let class = self.new_class(parent, format, name, access)?;
        self.attach(parent, class, None)
    }

    /// A class present only while `condition` holds. A class of the same
    /// name may already exist; the new one becomes its sibling.
    pub fn create_conditional_class(
        &mut self,
        parent: ComponentId,
        format: Format,
        name: &str,
        access: Access,
        condition: ConstantId,
    ) -> Result<ComponentId, StructureError> {
        let class = self.new_class(parent, format, name, access)?;
        self.attach(parent, class, Some(condition))
    }

    fn new_class(
        &mut self,
        parent: ComponentId,
        format: Format,
        name: &str,
        access: Access,
    ) -> Result<Component, StructureError> {
        if !format.is_nested_class() {
            return Err(StructureError::WrongFormat {
                name: name.to_owned(),
                expected: "class format",
                found: format.name(),
            });
        }
        let identity = self.pool.ensure_class(self.identity_of(parent), name);
        Ok(Component::new(
            identity,
            ComponentFlags::new(format, access),
            ComponentKind::Class(ClassData::default()),
        ))
    }

    pub fn create_property(
        &mut self,
        parent: ComponentId,
        name: &str,
        ty: ConstantId,
        access: Access,
    ) -> Result<ComponentId, StructureError> {
        let identity = self.pool.ensure_property(self.identity_of(parent), name);
        let property = Component::new(
            identity,
            ComponentFlags::new(Format::Property, access),
            ComponentKind::Property(PropertyData {
                ty,
                is_type_param: false,
                read_only: false,
                var_access: None,
            }),
        );
        self.attach(parent, property, None)
    }

    /// Mark a property read-only, or give its setter a narrower access.
    pub fn set_property_access(
        &mut self,
        property: ComponentId,
        read_only: bool,
        var_access: Option<Access>,
    ) -> Result<(), StructureError> {
        match &mut self.component_mut(property).kind {
            ComponentKind::Property(data) => {
                data.read_only = read_only;
                data.var_access = var_access;
                Ok(())
            }
            _ => Err(self.wrong_format(property, "property")),
        }
    }

    /// Declare type parameter `name` on a class. The parameter is also a
    /// synthetic read-only property of type `Type<constraint>`.
    pub fn add_type_param(
        &mut self,
        class: ComponentId,
        name: &str,
        constraint: ConstantId,
    ) -> Result<ComponentId, StructureError> {
        if self.component(class).as_class().is_none() {
            return Err(self.wrong_format(class, "class"));
        }
        let identity = self.pool.ensure_property(self.identity_of(class), name);
        let type_class = self.pool.type_class();
        let ty = self.pool.ensure_class_type(type_class, &[constraint]);
        let property = Component::new(
            identity,
            ComponentFlags::new(Format::Property, Access::Public),
            ComponentKind::Property(PropertyData {
                ty,
                is_type_param: true,
                read_only: true,
                var_access: None,
            }),
        );
        let id = self.attach(class, property, None)?;

        let name = self.pool.ensure_string(name);
        if let Some(data) = self.component_mut(class).as_class_mut() {
            data.type_params.push(TypeParam { name, constraint });
            data.invalidate_types();
        }
        Ok(id)
    }

    /// A method, created under the multi-method of its name (made on
    /// demand). `params` are names and types.
    pub fn create_method(
        &mut self,
        parent: ComponentId,
        name: &str,
        params: &[(&str, ConstantId)],
        returns: &[ConstantId],
        access: Access,
    ) -> Result<ComponentId, StructureError> {
        let multi = match self.get_child(parent, name, None).first() {
            Some(existing) if self.component(existing).format() == Format::MultiMethod => existing,
            Some(existing) => return Err(self.wrong_format(existing, "multi-method")),
            None => {
                let identity = self.pool.ensure_multi_method(self.identity_of(parent), name);
                let multi = Component::new(
                    identity,
                    ComponentFlags::new(Format::MultiMethod, Access::Public),
                    ComponentKind::MultiMethod,
                );
                self.attach(parent, multi, None)?
            }
        };

        let types: Vec<ConstantId> = params.iter().map(|(_, ty)| *ty).collect();
        let signature = self.pool.ensure_signature(name, &types, returns);
        let identity = self.pool.ensure_method(self.identity_of(multi), signature);
        let param_names = params.iter().map(|(n, _)| self.pool.ensure_string(n)).collect();
        let method = Component::new(
            identity,
            ComponentFlags::new(Format::Method, access),
            ComponentKind::Method(MethodData {
                param_names,
                default_count: 0,
            }),
        );
        self.attach(multi, method, None)
    }

    /// Number of trailing parameters of a method that have defaults.
    pub fn set_default_count(&mut self, method: ComponentId, count: u16) -> Result<(), StructureError> {
        if let ComponentKind::Method(data) = &mut self.component_mut(method).kind
            && usize::from(count) <= data.param_names.len()
        {
            data.default_count = count;
            return Ok(());
        }
        Err(self.wrong_format(method, "method"))
    }

    pub fn create_typedef(
        &mut self,
        parent: ComponentId,
        name: &str,
        referred: ConstantId,
        access: Access,
    ) -> Result<ComponentId, StructureError> {
        let identity = self.pool.ensure_typedef(self.identity_of(parent), name);
        self.pool.set_typedef_target(identity, referred);
        let typedef = Component::new(
            identity,
            ComponentFlags::new(Format::Typedef, access),
            ComponentKind::Typedef { referred },
        );
        self.attach(parent, typedef, None)
    }

    /// Set or clear the condition of a component. Clearing it on a
    /// component with siblings would make the name-slot ambiguous.
    pub fn set_condition(&mut self, id: ComponentId, condition: Option<ConstantId>) -> Result<(), StructureError> {
        if condition.is_none() && self.component(id).parent.is_some() && self.siblings(id).len() > 1 {
            return Err(StructureError::DuplicateChild {
                parent: self
                    .component(id)
                    .parent
                    .map(|p| self.pool.describe(self.identity_of(p)))
                    .unwrap_or_default(),
                name: self.pool.describe(self.identity_of(id)),
            });
        }
        self.component_mut(id).condition = condition;
        Ok(())
    }

    /// Swap a component for a copy of its body, e.g. so a pass can mutate
    /// the copy and throw it away. The copy shares the original's children.
    /// Returns the copy; the original is detached.
    pub fn replace_with_temporary(&mut self, id: ComponentId) -> Result<ComponentId, StructureError> {
        if id == self.module {
            return Err(StructureError::PrimaryModule);
        }
        if self.component(id).parent.is_none() {
            return Err(StructureError::Detached {
                name: self.pool.describe(self.identity_of(id)),
            });
        }
        let mut copy = self.component(id).clone();
        copy.parent = None;
        copy.next_sibling = None;
        if let Some(class) = copy.as_class_mut() {
            class.invalidate_types();
        }
        let copy = self.alloc(copy);
        self.replace_child(id, copy);
        Ok(copy)
    }

    // ========================================================================
    // Contributions
    // ========================================================================

    /// Add a contribution to a class. `into` contributions go first and
    /// `extends` right behind them. An `extends` whose target class is
    /// known is checked against the class formats.
    pub fn add_contribution(
        &mut self,
        id: ComponentId,
        composition: Composition,
        ty: ConstantId,
    ) -> Result<(), StructureError> {
        self.push_contribution(id, Contribution::new(composition, ty))
    }

    /// Apply an annotation constant to a class.
    pub fn add_annotation(&mut self, id: ComponentId, annotation: ConstantId) -> Result<(), StructureError> {
        let annotation = self.pool.canonical(annotation);
        let ConstantKind::Annotation { class, .. } = self.pool.get(annotation).clone() else {
            return Err(StructureError::WrongFormat {
                name: self.pool.describe(annotation),
                expected: "annotation",
                found: self.pool.get(annotation).format().name(),
            });
        };
        let ty = self.pool.ensure_terminal_type(class);
        self.push_contribution(id, Contribution::annotation(ty, annotation))
    }

    /// Incorporate a mixin, conditionally when `constraints` is non-empty.
    pub fn add_incorporates(
        &mut self,
        id: ComponentId,
        ty: ConstantId,
        constraints: Vec<IncorporateConstraint>,
    ) -> Result<(), StructureError> {
        self.push_contribution(id, Contribution::incorporates(ty, constraints))
    }

    /// Delegate the interface `ty` to the value of `property`.
    pub fn add_delegation(&mut self, id: ComponentId, ty: ConstantId, property: ConstantId) -> Result<(), StructureError> {
        self.push_contribution(id, Contribution::delegates(ty, property))
    }

    /// Record that a module imports `module_identity`.
    pub fn add_import(
        &mut self,
        module: ComponentId,
        composition: Composition,
        module_identity: ConstantId,
    ) -> Result<(), StructureError> {
        if self.component(module).format() != Format::Module {
            return Err(self.wrong_format(module, "module"));
        }
        if !composition.is_import() {
            return Err(StructureError::WrongFormat {
                name: composition.keyword().to_owned(),
                expected: "import",
                found: "contribution",
            });
        }
        let contribution = Contribution::new(composition, module_identity);
        let component = self.component_mut(module);
        if !component.contributions.contains(&contribution) {
            component.contributions.push(contribution);
        }
        Ok(())
    }

    fn push_contribution(&mut self, id: ComponentId, contribution: Contribution) -> Result<(), StructureError> {
        self.expect_class(id, "class")?;
        if contribution.composition().is_import() {
            return self.add_import(id, contribution.composition(), contribution.type_constant());
        }
        if contribution.composition() == Composition::Extends {
            self.check_extends(id, contribution.type_constant())?;
        }
        let component = self.component_mut(id);
        if !component.contributions.contains(&contribution) {
            insert_ordered(&mut component.contributions, contribution);
        }
        Ok(())
    }

    fn check_extends(&mut self, id: ComponentId, ty: ConstantId) -> Result<(), StructureError> {
        let format = self.component(id).format();
        if format == Format::Interface {
            return Err(StructureError::IllegalExtends { format: format.name() });
        }
        let Some(class) = self.pool.underlying_class(ty) else {
            return Ok(());
        };
        let Some(sup) = self.component_of(class) else {
            return Ok(());
        };
        if format.is_extends_legal(self.component(sup).format()) {
            Ok(())
        } else {
            Err(StructureError::IllegalExtends { format: format.name() })
        }
    }
}
