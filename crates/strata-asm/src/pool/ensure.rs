// src/pool/ensure.rs
//
// Typed constructors: each returns the existing constant when an equal one is
// already interned. Value constants go through the locator map first so a hit
// never allocates.

use strata_identity::{ConstantId, Version};

use super::ConstantPool;
use super::locator::LocatorKey;
use crate::access::Access;
use crate::constant::{ConstantIdVec, ConstantKind};

impl ConstantPool {
    fn ensure_located(&mut self, key: LocatorKey<'_>, make: impl FnOnce() -> ConstantKind) -> ConstantId {
        if let Some(id) = self.find_by_locator(key) {
            self.note_reference(id);
            return id;
        }
        self.intern(make())
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    pub fn ensure_int(&mut self, value: i64) -> ConstantId {
        self.ensure_located(LocatorKey::Int(value), || ConstantKind::Int(value))
    }

    pub fn ensure_byte(&mut self, value: u8) -> ConstantId {
        self.ensure_located(LocatorKey::Byte(value), || ConstantKind::Byte(value))
    }

    pub fn ensure_char(&mut self, value: char) -> ConstantId {
        self.ensure_located(LocatorKey::Char(value), || ConstantKind::Char(value))
    }

    pub fn ensure_string(&mut self, value: &str) -> ConstantId {
        self.ensure_located(LocatorKey::String(value), || ConstantKind::String(value.into()))
    }

    pub fn ensure_int_literal(&mut self, text: &str) -> ConstantId {
        self.ensure_located(LocatorKey::IntLiteral(text), || {
            ConstantKind::IntLiteral(text.into())
        })
    }

    pub fn ensure_fp_literal(&mut self, text: &str) -> ConstantId {
        self.ensure_located(LocatorKey::FPLiteral(text), || ConstantKind::FPLiteral(text.into()))
    }

    pub fn ensure_version(&mut self, version: &Version) -> ConstantId {
        self.intern(ConstantKind::Version(version.clone()))
    }

    // ------------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------------

    /// A module identity located by its qualified name.
    pub fn ensure_module(&mut self, name: &str) -> ConstantId {
        if let Some(id) = self.find_by_locator(LocatorKey::Module(name)) {
            self.note_reference(id);
            return id;
        }
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Module { name })
    }

    pub fn ensure_package(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Package { parent, name })
    }

    pub fn ensure_class(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Class { parent, name })
    }

    pub fn ensure_typedef(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Typedef { parent, name })
    }

    pub fn ensure_property(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Property { parent, name })
    }

    pub fn ensure_multi_method(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::MultiMethod { parent, name })
    }

    pub fn ensure_signature(
        &mut self,
        name: &str,
        params: &[ConstantId],
        returns: &[ConstantId],
    ) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::Signature {
            name,
            params: params.iter().copied().collect(),
            returns: returns.iter().copied().collect(),
        })
    }

    /// A method identity; `parent` is the owning multi-method.
    pub fn ensure_method(&mut self, parent: ConstantId, signature: ConstantId) -> ConstantId {
        self.intern(ConstantKind::Method { parent, signature })
    }

    /// Identity of a child named `name` under `parent`, shaped like `like`
    /// (a class stays a class, a package stays a package).
    pub(crate) fn ensure_child_identity(
        &mut self,
        parent: ConstantId,
        name: &str,
        like: ConstantId,
    ) -> ConstantId {
        match self.get(like) {
            ConstantKind::Package { .. } => self.ensure_package(parent, name),
            ConstantKind::Typedef { .. } => self.ensure_typedef(parent, name),
            ConstantKind::Property { .. } => self.ensure_property(parent, name),
            ConstantKind::MultiMethod { .. } => self.ensure_multi_method(parent, name),
            _ => self.ensure_class(parent, name),
        }
    }

    // ------------------------------------------------------------------------
    // Indirections and pseudo classes
    // ------------------------------------------------------------------------

    pub fn ensure_unresolved(&mut self, name: &str) -> ConstantId {
        self.intern(ConstantKind::UnresolvedName(name.into()))
    }

    pub fn ensure_native_class(&mut self, class: ConstantId) -> ConstantId {
        self.intern(ConstantKind::NativeClass { class })
    }

    pub fn ensure_this_class(&mut self, class: ConstantId) -> ConstantId {
        self.intern(ConstantKind::ThisClass { class })
    }

    pub fn ensure_parent_class(&mut self, child: ConstantId) -> ConstantId {
        self.intern(ConstantKind::ParentClass { child })
    }

    pub fn ensure_child_class(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::ChildClass { parent, name })
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    pub fn ensure_terminal_type(&mut self, defining: ConstantId) -> ConstantId {
        self.intern(ConstantKind::TerminalType { defining })
    }

    /// The type of a class, parameterized when `params` is non-empty.
    pub fn ensure_class_type(&mut self, class: ConstantId, params: &[ConstantId]) -> ConstantId {
        let base = self.ensure_terminal_type(class);
        self.ensure_parameterized_type(base, params)
    }

    /// `base<params>`; returns `base` itself for an empty list.
    pub fn ensure_parameterized_type(&mut self, base: ConstantId, params: &[ConstantId]) -> ConstantId {
        if params.is_empty() {
            return base;
        }
        self.intern(ConstantKind::ParameterizedType {
            base,
            params: params.iter().copied().collect::<ConstantIdVec>(),
        })
    }

    pub fn ensure_immutable_type(&mut self, ty: ConstantId) -> ConstantId {
        if matches!(self.get(ty), ConstantKind::ImmutableType { .. }) {
            return ty;
        }
        self.intern(ConstantKind::ImmutableType { ty })
    }

    pub fn ensure_access_type(&mut self, ty: ConstantId, access: Access) -> ConstantId {
        self.intern(ConstantKind::AccessType { ty, access })
    }

    pub fn ensure_annotated_type(&mut self, annotation: ConstantId, ty: ConstantId) -> ConstantId {
        self.intern(ConstantKind::AnnotatedType { annotation, ty })
    }

    pub fn ensure_virtual_child_type(&mut self, parent: ConstantId, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::VirtualChildType { parent, name })
    }

    pub fn ensure_union_type(&mut self, first: ConstantId, second: ConstantId) -> ConstantId {
        self.intern(ConstantKind::UnionType { first, second })
    }

    pub fn ensure_intersection_type(&mut self, first: ConstantId, second: ConstantId) -> ConstantId {
        self.intern(ConstantKind::IntersectionType { first, second })
    }

    pub fn ensure_difference_type(&mut self, first: ConstantId, second: ConstantId) -> ConstantId {
        self.intern(ConstantKind::DifferenceType { first, second })
    }

    pub fn ensure_annotation(&mut self, class: ConstantId, args: &[ConstantId]) -> ConstantId {
        self.intern(ConstantKind::Annotation {
            class,
            args: args.iter().copied().collect(),
        })
    }

    // ------------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------------

    pub fn ensure_not_condition(&mut self, condition: ConstantId) -> ConstantId {
        self.intern(ConstantKind::ConditionNot { condition })
    }

    pub fn ensure_all_condition(&mut self, conditions: &[ConstantId]) -> ConstantId {
        if let [single] = conditions {
            return *single;
        }
        self.intern(ConstantKind::ConditionAll {
            conditions: conditions.iter().copied().collect(),
        })
    }

    pub fn ensure_any_condition(&mut self, conditions: &[ConstantId]) -> ConstantId {
        if let [single] = conditions {
            return *single;
        }
        self.intern(ConstantKind::ConditionAny {
            conditions: conditions.iter().copied().collect(),
        })
    }

    pub fn ensure_named_condition(&mut self, name: &str) -> ConstantId {
        let name = self.ensure_string(name);
        self.intern(ConstantKind::ConditionNamed { name })
    }

    pub fn ensure_present_condition(&mut self, identity: ConstantId) -> ConstantId {
        self.intern(ConstantKind::ConditionPresent { identity })
    }

    pub fn ensure_version_match_condition(&mut self, module: ConstantId, version: &Version) -> ConstantId {
        let version = self.ensure_version(version);
        self.intern(ConstantKind::ConditionVersionMatches { module, version })
    }

    pub fn ensure_versioned_condition(&mut self, version: &Version) -> ConstantId {
        let version = self.ensure_version(version);
        self.intern(ConstantKind::ConditionVersioned { version })
    }
}
