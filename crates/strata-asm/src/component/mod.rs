// src/component/mod.rs
//! Components: the named nodes of a module file.
//!
//! Every component of a file lives in the owning [`FileStructure`]'s arena and
//! is addressed by [`ComponentId`]. Same-named alternates (conditional
//! siblings) are chained through `next_sibling`, and every sibling of a chain
//! holds the same [`SlotId`], so they share one child map.
//!
//! Submodules each add an `impl FileStructure` block:
//! - `children`: slots, sibling chains and conditional child lookup
//! - `resolve`: contributed-name resolution
//! - `virtual_super`: implicit supers of virtual child classes
//! - `serialize`: component bodies and child blocks
//!
//! [`FileStructure`]: crate::file::FileStructure

pub mod children;
pub mod contribution;
pub mod flags;
pub mod resolve;
pub(crate) mod serialize;
pub mod virtual_super;

use strata_identity::{ComponentId, ConstantId, SlotId};

use crate::access::Access;

pub use children::{ChildKey, ChildLookup, ChildMap};
pub use contribution::{Composition, Contribution, ContributionDetail, IncorporateConstraint};
pub use flags::{ComponentFlags, Format};
pub use resolve::{ResolutionCollector, ResolutionResult, SimpleCollector};
pub use virtual_super::VirtualSuperResult;

/// Role of a module component within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModuleType {
    /// The module the file is about.
    Primary = 0,
    /// Outline of a module the primary one depends on.
    Fingerprint = 1,
    /// A full dependency carried inside the file.
    Embedded = 2,
}

impl ModuleType {
    pub fn from_ordinal(ordinal: u8) -> Option<ModuleType> {
        match ordinal {
            0 => Some(ModuleType::Primary),
            1 => Some(ModuleType::Fingerprint),
            2 => Some(ModuleType::Embedded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleData {
    pub module_type: ModuleType,
    /// Version constant: the version a fingerprint requires, or the version
    /// of a labelled primary module.
    pub version: Option<ConstantId>,
}

/// A declared type parameter of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeParam {
    /// String constant with the parameter name.
    pub name: ConstantId,
    /// Type the actual argument must be assignable to.
    pub constraint: ConstantId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassData {
    pub type_params: Vec<TypeParam>,
    pub(crate) formal_type: Option<ConstantId>,
    pub(crate) canonical_type: Option<ConstantId>,
}

impl ClassData {
    pub(crate) fn invalidate_types(&mut self) {
        self.formal_type = None;
        self.canonical_type = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyData {
    pub ty: ConstantId,
    /// The synthetic property standing for a class type parameter.
    pub is_type_param: bool,
    pub read_only: bool,
    /// Setter access when it differs from the getter.
    pub var_access: Option<Access>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodData {
    /// String constants naming each parameter.
    pub param_names: Vec<ConstantId>,
    /// Number of trailing parameters that have default values.
    pub default_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    File,
    Module(ModuleData),
    Package,
    /// Interface, class, const, enum, enum value, mixin or service.
    Class(ClassData),
    Property(PropertyData),
    MultiMethod,
    Method(MethodData),
    Typedef { referred: ConstantId },
}

#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) identity: ConstantId,
    pub(crate) flags: ComponentFlags,
    pub(crate) condition: Option<ConstantId>,
    pub(crate) contributions: Vec<Contribution>,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) next_sibling: Option<ComponentId>,
    pub(crate) children: Option<SlotId>,
    pub(crate) kind: ComponentKind,
}

impl Component {
    pub(crate) fn new(identity: ConstantId, flags: ComponentFlags, kind: ComponentKind) -> Self {
        Self {
            identity,
            flags,
            condition: None,
            contributions: Vec::new(),
            parent: None,
            next_sibling: None,
            children: None,
            kind,
        }
    }

    pub fn identity(&self) -> ConstantId {
        self.identity
    }

    pub fn flags(&self) -> ComponentFlags {
        self.flags
    }

    pub fn format(&self) -> Format {
        self.flags.format()
    }

    pub fn access(&self) -> Access {
        self.flags.access()
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.is_abstract()
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags.is_synthetic()
    }

    pub fn condition(&self) -> Option<ConstantId> {
        self.condition
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn next_sibling(&self) -> Option<ComponentId> {
        self.next_sibling
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ComponentKind::Class(_))
            || matches!(self.format(), Format::Module | Format::Package)
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.kind {
            ComponentKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_class_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.kind {
            ComponentKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match &self.kind {
            ComponentKind::Module(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyData> {
        match &self.kind {
            ComponentKind::Property(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodData> {
        match &self.kind {
            ComponentKind::Method(data) => Some(data),
            _ => None,
        }
    }

    /// First contribution of the given composition, in contribution order.
    pub fn find_contribution(&self, composition: Composition) -> Option<&Contribution> {
        self.contributions
            .iter()
            .find(|c| c.composition() == composition)
    }

    /// Constants stored by this component body, excluding its children.
    pub(crate) fn constants(&self) -> Vec<ConstantId> {
        let mut out = vec![self.identity];
        out.extend(self.condition);
        for c in &self.contributions {
            out.extend(c.constants());
        }
        match &self.kind {
            ComponentKind::File | ComponentKind::Package | ComponentKind::MultiMethod => {}
            ComponentKind::Module(m) => out.extend(m.version),
            ComponentKind::Class(c) => {
                for p in &c.type_params {
                    out.push(p.name);
                    out.push(p.constraint);
                }
            }
            ComponentKind::Property(p) => out.push(p.ty),
            ComponentKind::Method(m) => out.extend(m.param_names.iter().copied()),
            ComponentKind::Typedef { referred } => out.push(*referred),
        }
        out
    }

    /// Rebuild the body's constant references through `f`. Graph links are
    /// kept as they are.
    pub(crate) fn try_map_constants<E>(
        &self,
        f: &mut impl FnMut(ConstantId) -> Result<ConstantId, E>,
    ) -> Result<Component, E> {
        let kind = match &self.kind {
            ComponentKind::File => ComponentKind::File,
            ComponentKind::Package => ComponentKind::Package,
            ComponentKind::MultiMethod => ComponentKind::MultiMethod,
            ComponentKind::Module(m) => ComponentKind::Module(ModuleData {
                module_type: m.module_type,
                version: m.version.map(&mut *f).transpose()?,
            }),
            ComponentKind::Class(c) => {
                let mut type_params = Vec::with_capacity(c.type_params.len());
                for p in &c.type_params {
                    type_params.push(TypeParam {
                        name: f(p.name)?,
                        constraint: f(p.constraint)?,
                    });
                }
                ComponentKind::Class(ClassData {
                    type_params,
                    ..ClassData::default()
                })
            }
            ComponentKind::Property(p) => ComponentKind::Property(PropertyData {
                ty: f(p.ty)?,
                ..p.clone()
            }),
            ComponentKind::Method(m) => ComponentKind::Method(MethodData {
                param_names: m.param_names.iter().map(|n| f(*n)).collect::<Result<_, E>>()?,
                default_count: m.default_count,
            }),
            ComponentKind::Typedef { referred } => ComponentKind::Typedef {
                referred: f(*referred)?,
            },
        };
        let mut contributions = Vec::with_capacity(self.contributions.len());
        for c in &self.contributions {
            contributions.push(c.try_map_constants(f)?);
        }
        Ok(Component {
            identity: f(self.identity)?,
            flags: self.flags,
            condition: self.condition.map(&mut *f).transpose()?,
            contributions,
            parent: self.parent,
            next_sibling: self.next_sibling,
            children: self.children,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_list_every_stored_reference() {
        let mut comp = Component::new(
            ConstantId::new(1),
            ComponentFlags::new(Format::Property, Access::Public),
            ComponentKind::Property(PropertyData {
                ty: ConstantId::new(2),
                is_type_param: false,
                read_only: true,
                var_access: None,
            }),
        );
        comp.condition = Some(ConstantId::new(3));
        assert_eq!(
            comp.constants(),
            vec![ConstantId::new(1), ConstantId::new(3), ConstantId::new(2)]
        );
        let mapped = comp
            .try_map_constants(&mut |c| Ok::<_, ()>(ConstantId::new(c.index() * 10)))
            .unwrap();
        assert_eq!(mapped.identity(), ConstantId::new(10));
        assert_eq!(mapped.as_property().map(|p| p.ty), Some(ConstantId::new(20)));
        assert!(mapped.as_property().is_some_and(|p| p.read_only));
    }
}
