// src/pool/well_known.rs
//
// Core-library classes the relation engine needs by identity. Each accessor
// builds the identity under the pool's core module on first use and caches it
// until the next compaction.

use strata_identity::ConstantId;

use super::ConstantPool;

macro_rules! define_well_known_classes {
    ($(($field:ident, [$($segment:expr),+ $(,)?])),* $(,)?) => {
        /// Cached identities of core-library classes.
        #[derive(Debug, Clone, Default)]
        pub struct WellKnownClasses {
            $(
                pub $field: Option<ConstantId>,
            )*
        }

        impl WellKnownClasses {
            /// Create an empty cache
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl ConstantPool {
            $(
                pub fn $field(&mut self) -> ConstantId {
                    if let Some(id) = self.well_known.$field {
                        return id;
                    }
                    let id = self.ensure_core_class(&[$($segment),+]);
                    self.well_known.$field = Some(id);
                    id
                }
            )*
        }
    };
}

// Single source of truth for well-known class paths under the core module.
define_well_known_classes!(
    (object_class, ["Object"]),
    (tuple_class, ["collections", "Tuple"]),
    (enum_class, ["Enum"]),
    (const_class, ["Const"]),
    (service_class, ["Service"]),
    (module_class, ["Module"]),
    (package_class, ["Package"]),
    (class_class, ["Class"]),
    (type_class, ["Type"]),
);

impl ConstantPool {
    /// `path` is package names followed by the class name.
    fn ensure_core_class(&mut self, path: &[&str]) -> ConstantId {
        let mut parent = self.ensure_module(self.core_module);
        let (class, packages) = path.split_last().unwrap_or((&"Object", &[]));
        for package in packages {
            parent = self.ensure_package(parent, package);
        }
        self.ensure_class(parent, class)
    }

    pub fn object_type(&mut self) -> ConstantId {
        let class = self.object_class();
        self.ensure_terminal_type(class)
    }

    pub fn is_object_type(&mut self, ty: ConstantId) -> bool {
        let ty = self.canonical(ty);
        ty == self.object_type()
    }
}
