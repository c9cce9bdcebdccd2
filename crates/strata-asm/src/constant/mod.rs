// src/constant/mod.rs
//! The constant catalogue.
//!
//! A [`ConstantKind`] is a structural value: two constants are the same constant
//! exactly when their kinds compare equal. Composite constants refer to other
//! constants of the same pool by [`ConstantId`], so equality and hashing stay
//! shallow once children are interned.

pub mod condition;
pub mod format;

use std::convert::Infallible;

use smallvec::SmallVec;
use strata_identity::{ConstantId, Version};

use crate::access::Access;

pub use condition::{LinkerContext, StaticLinkerContext};
pub use format::ConstantFormat;

/// Inline storage for constant references; most composites have few.
pub type ConstantIdVec = SmallVec<[ConstantId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    // Values
    Int(i64),
    Byte(u8),
    Char(char),
    String(Box<str>),
    IntLiteral(Box<str>),
    FPLiteral(Box<str>),
    Version(Version),

    // Identities
    Module { name: ConstantId },
    Package { parent: ConstantId, name: ConstantId },
    Class { parent: ConstantId, name: ConstantId },
    Typedef { parent: ConstantId, name: ConstantId },
    Property { parent: ConstantId, name: ConstantId },
    MultiMethod { parent: ConstantId, name: ConstantId },
    Method { parent: ConstantId, signature: ConstantId },
    Signature {
        name: ConstantId,
        params: ConstantIdVec,
        returns: ConstantIdVec,
    },

    // Indirections and auto-narrowing pseudo classes
    UnresolvedName(Box<str>),
    NativeClass { class: ConstantId },
    ThisClass { class: ConstantId },
    ParentClass { child: ConstantId },
    ChildClass { parent: ConstantId, name: ConstantId },

    // Types
    TerminalType { defining: ConstantId },
    ImmutableType { ty: ConstantId },
    AccessType { ty: ConstantId, access: Access },
    AnnotatedType { annotation: ConstantId, ty: ConstantId },
    ParameterizedType { base: ConstantId, params: ConstantIdVec },
    VirtualChildType { parent: ConstantId, name: ConstantId },
    UnionType { first: ConstantId, second: ConstantId },
    IntersectionType { first: ConstantId, second: ConstantId },
    DifferenceType { first: ConstantId, second: ConstantId },
    Annotation { class: ConstantId, args: ConstantIdVec },

    // Conditions
    ConditionNot { condition: ConstantId },
    ConditionAll { conditions: ConstantIdVec },
    ConditionAny { conditions: ConstantIdVec },
    ConditionNamed { name: ConstantId },
    ConditionPresent { identity: ConstantId },
    ConditionVersionMatches { module: ConstantId, version: ConstantId },
    ConditionVersioned { version: ConstantId },
}

impl ConstantKind {
    pub fn format(&self) -> ConstantFormat {
        use ConstantKind as K;
        match self {
            K::Int(_) => ConstantFormat::Int,
            K::Byte(_) => ConstantFormat::Byte,
            K::Char(_) => ConstantFormat::Char,
            K::String(_) => ConstantFormat::String,
            K::IntLiteral(_) => ConstantFormat::IntLiteral,
            K::FPLiteral(_) => ConstantFormat::FPLiteral,
            K::Version(_) => ConstantFormat::Version,
            K::Module { .. } => ConstantFormat::Module,
            K::Package { .. } => ConstantFormat::Package,
            K::Class { .. } => ConstantFormat::Class,
            K::Typedef { .. } => ConstantFormat::Typedef,
            K::Property { .. } => ConstantFormat::Property,
            K::MultiMethod { .. } => ConstantFormat::MultiMethod,
            K::Method { .. } => ConstantFormat::Method,
            K::Signature { .. } => ConstantFormat::Signature,
            K::UnresolvedName(_) => ConstantFormat::UnresolvedName,
            K::NativeClass { .. } => ConstantFormat::NativeClass,
            K::ThisClass { .. } => ConstantFormat::ThisClass,
            K::ParentClass { .. } => ConstantFormat::ParentClass,
            K::ChildClass { .. } => ConstantFormat::ChildClass,
            K::TerminalType { .. } => ConstantFormat::TerminalType,
            K::ImmutableType { .. } => ConstantFormat::ImmutableType,
            K::AccessType { .. } => ConstantFormat::AccessType,
            K::AnnotatedType { .. } => ConstantFormat::AnnotatedType,
            K::ParameterizedType { .. } => ConstantFormat::ParameterizedType,
            K::VirtualChildType { .. } => ConstantFormat::VirtualChildType,
            K::UnionType { .. } => ConstantFormat::UnionType,
            K::IntersectionType { .. } => ConstantFormat::IntersectionType,
            K::DifferenceType { .. } => ConstantFormat::DifferenceType,
            K::Annotation { .. } => ConstantFormat::Annotation,
            K::ConditionNot { .. } => ConstantFormat::ConditionNot,
            K::ConditionAll { .. } => ConstantFormat::ConditionAll,
            K::ConditionAny { .. } => ConstantFormat::ConditionAny,
            K::ConditionNamed { .. } => ConstantFormat::ConditionNamed,
            K::ConditionPresent { .. } => ConstantFormat::ConditionPresent,
            K::ConditionVersionMatches { .. } => ConstantFormat::ConditionVersionMatches,
            K::ConditionVersioned { .. } => ConstantFormat::ConditionVersioned,
        }
    }

    /// Identity of something that can own a component: module, package, class,
    /// typedef, property, multi-method or method.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            ConstantKind::Module { .. }
                | ConstantKind::Package { .. }
                | ConstantKind::Class { .. }
                | ConstantKind::Typedef { .. }
                | ConstantKind::Property { .. }
                | ConstantKind::MultiMethod { .. }
                | ConstantKind::Method { .. }
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            ConstantKind::TerminalType { .. }
                | ConstantKind::ImmutableType { .. }
                | ConstantKind::AccessType { .. }
                | ConstantKind::AnnotatedType { .. }
                | ConstantKind::ParameterizedType { .. }
                | ConstantKind::VirtualChildType { .. }
                | ConstantKind::UnionType { .. }
                | ConstantKind::IntersectionType { .. }
                | ConstantKind::DifferenceType { .. }
        )
    }

    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            ConstantKind::ConditionNot { .. }
                | ConstantKind::ConditionAll { .. }
                | ConstantKind::ConditionAny { .. }
                | ConstantKind::ConditionNamed { .. }
                | ConstantKind::ConditionPresent { .. }
                | ConstantKind::ConditionVersionMatches { .. }
                | ConstantKind::ConditionVersioned { .. }
        )
    }

    /// `this:class`, `parent:class` and `child:class`, which narrow to the
    /// class that uses them.
    pub fn is_auto_narrowing(&self) -> bool {
        matches!(
            self,
            ConstantKind::ThisClass { .. }
                | ConstantKind::ParentClass { .. }
                | ConstantKind::ChildClass { .. }
        )
    }

    /// Parent identity of a nested identity.
    pub fn parent_identity(&self) -> Option<ConstantId> {
        match *self {
            ConstantKind::Package { parent, .. }
            | ConstantKind::Class { parent, .. }
            | ConstantKind::Typedef { parent, .. }
            | ConstantKind::Property { parent, .. }
            | ConstantKind::MultiMethod { parent, .. }
            | ConstantKind::Method { parent, .. } => Some(parent),
            _ => None,
        }
    }

    /// The string constant naming an identity.
    pub fn name_id(&self) -> Option<ConstantId> {
        match *self {
            ConstantKind::Module { name }
            | ConstantKind::Package { name, .. }
            | ConstantKind::Class { name, .. }
            | ConstantKind::Typedef { name, .. }
            | ConstantKind::Property { name, .. }
            | ConstantKind::MultiMethod { name, .. }
            | ConstantKind::ChildClass { name, .. }
            | ConstantKind::VirtualChildType { name, .. }
            | ConstantKind::Signature { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Every constant this one refers to, in serialization order.
    pub fn references(&self) -> ConstantIdVec {
        let mut refs = ConstantIdVec::new();
        let _ = self.try_map_references(&mut |id| {
            refs.push(id);
            Ok::<_, Infallible>(id)
        });
        refs
    }

    pub fn map_references(&self, mut f: impl FnMut(ConstantId) -> ConstantId) -> ConstantKind {
        match self.try_map_references(&mut |id| Ok::<_, Infallible>(f(id))) {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }

    /// Rebuild this constant with every reference passed through `f`.
    pub fn try_map_references<E>(
        &self,
        f: &mut impl FnMut(ConstantId) -> Result<ConstantId, E>,
    ) -> Result<ConstantKind, E> {
        use ConstantKind as K;
        fn list<E>(
            ids: &ConstantIdVec,
            f: &mut impl FnMut(ConstantId) -> Result<ConstantId, E>,
        ) -> Result<ConstantIdVec, E> {
            ids.iter().map(|&id| f(id)).collect()
        }
        Ok(match self {
            K::Int(_)
            | K::Byte(_)
            | K::Char(_)
            | K::String(_)
            | K::IntLiteral(_)
            | K::FPLiteral(_)
            | K::Version(_)
            | K::UnresolvedName(_) => self.clone(),

            K::Module { name } => K::Module { name: f(*name)? },
            K::Package { parent, name } => K::Package {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::Class { parent, name } => K::Class {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::Typedef { parent, name } => K::Typedef {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::Property { parent, name } => K::Property {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::MultiMethod { parent, name } => K::MultiMethod {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::Method { parent, signature } => K::Method {
                parent: f(*parent)?,
                signature: f(*signature)?,
            },
            K::Signature {
                name,
                params,
                returns,
            } => {
                let name = f(*name)?;
                let params = list(params, f)?;
                let returns = list(returns, f)?;
                K::Signature {
                    name,
                    params,
                    returns,
                }
            }

            K::NativeClass { class } => K::NativeClass { class: f(*class)? },
            K::ThisClass { class } => K::ThisClass { class: f(*class)? },
            K::ParentClass { child } => K::ParentClass { child: f(*child)? },
            K::ChildClass { parent, name } => K::ChildClass {
                parent: f(*parent)?,
                name: f(*name)?,
            },

            K::TerminalType { defining } => K::TerminalType {
                defining: f(*defining)?,
            },
            K::ImmutableType { ty } => K::ImmutableType { ty: f(*ty)? },
            K::AccessType { ty, access } => K::AccessType {
                ty: f(*ty)?,
                access: *access,
            },
            K::AnnotatedType { annotation, ty } => K::AnnotatedType {
                annotation: f(*annotation)?,
                ty: f(*ty)?,
            },
            K::ParameterizedType { base, params } => {
                let base = f(*base)?;
                K::ParameterizedType {
                    base,
                    params: list(params, f)?,
                }
            }
            K::VirtualChildType { parent, name } => K::VirtualChildType {
                parent: f(*parent)?,
                name: f(*name)?,
            },
            K::UnionType { first, second } => K::UnionType {
                first: f(*first)?,
                second: f(*second)?,
            },
            K::IntersectionType { first, second } => K::IntersectionType {
                first: f(*first)?,
                second: f(*second)?,
            },
            K::DifferenceType { first, second } => K::DifferenceType {
                first: f(*first)?,
                second: f(*second)?,
            },
            K::Annotation { class, args } => {
                let class = f(*class)?;
                K::Annotation {
                    class,
                    args: list(args, f)?,
                }
            }

            K::ConditionNot { condition } => K::ConditionNot {
                condition: f(*condition)?,
            },
            K::ConditionAll { conditions } => K::ConditionAll {
                conditions: list(conditions, f)?,
            },
            K::ConditionAny { conditions } => K::ConditionAny {
                conditions: list(conditions, f)?,
            },
            K::ConditionNamed { name } => K::ConditionNamed { name: f(*name)? },
            K::ConditionPresent { identity } => K::ConditionPresent {
                identity: f(*identity)?,
            },
            K::ConditionVersionMatches { module, version } => K::ConditionVersionMatches {
                module: f(*module)?,
                version: f(*version)?,
            },
            K::ConditionVersioned { version } => K::ConditionVersioned {
                version: f(*version)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    fn id(n: u32) -> ConstantId {
        ConstantId::new(n)
    }

    #[test]
    fn references_follow_field_order() {
        let sig = ConstantKind::Signature {
            name: id(1),
            params: smallvec![id(2), id(3)],
            returns: smallvec![id(4)],
        };
        assert_eq!(sig.references().as_slice(), &[id(1), id(2), id(3), id(4)]);
        assert!(ConstantKind::Int(9).references().is_empty());
    }

    #[test]
    fn mapping_rewrites_every_reference() {
        let ty = ConstantKind::ParameterizedType {
            base: id(10),
            params: smallvec![id(11), id(12)],
        };
        let shifted = ty.map_references(|r| ConstantId::new(r.index() - 10));
        assert_eq!(
            shifted,
            ConstantKind::ParameterizedType {
                base: id(0),
                params: smallvec![id(1), id(2)],
            }
        );
    }

    #[test]
    fn fallible_mapping_stops_at_first_error() {
        let union = ConstantKind::UnionType {
            first: id(1),
            second: id(2),
        };
        let result = union.try_map_references(&mut |r| if r == id(2) { Err(r) } else { Ok(r) });
        assert_eq!(result, Err(id(2)));
    }

    #[test]
    fn structural_equality_ignores_construction() {
        let a = ConstantKind::String("Object".into());
        let b = ConstantKind::String(String::from("Object").into_boxed_str());
        assert_eq!(a, b);
        assert_ne!(
            ConstantKind::IntLiteral("1".into()),
            ConstantKind::FPLiteral("1".into())
        );
    }

    #[test]
    fn categories() {
        assert!(ConstantKind::Class { parent: id(0), name: id(1) }.is_identity());
        assert!(ConstantKind::TerminalType { defining: id(0) }.is_type());
        assert!(ConstantKind::ConditionNamed { name: id(0) }.is_condition());
        assert!(ConstantKind::ThisClass { class: id(0) }.is_auto_narrowing());
        assert_eq!(
            ConstantKind::Method { parent: id(3), signature: id(4) }.parent_identity(),
            Some(id(3))
        );
    }
}
