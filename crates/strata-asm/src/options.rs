// src/options.rs
//
// Knobs for loading and assembling module files.

/// Qualified name of the module that defines `Object` and `collections.Tuple`.
pub const DEFAULT_CORE_MODULE: &str = "ecstasy.xtclang.org";

/// Options for assembling and disassembling a file structure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Keep child blocks as raw bytes on load and parse them on first access
    pub lazy_children: bool,
    /// Allow a same-named child with a different condition to be linked as a sibling
    pub allow_conditional_siblings: bool,
    /// Drop unreferenced constants and order the rest by use count before writing
    pub optimize_on_assemble: bool,
    /// Module whose classes are treated as well-known by the relation engine
    pub core_module: &'static str,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            lazy_children: true,
            allow_conditional_siblings: true,
            optimize_on_assemble: true,
            core_module: DEFAULT_CORE_MODULE,
        }
    }
}

impl AssemblerOptions {
    /// Parse every child block while loading
    pub fn eager() -> Self {
        Self {
            lazy_children: false,
            ..Self::default()
        }
    }

    /// Reject conditional siblings; one component per name
    pub fn strict() -> Self {
        Self {
            allow_conditional_siblings: false,
            ..Self::default()
        }
    }

    pub fn with_core_module(self, core_module: &'static str) -> Self {
        Self {
            core_module,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lazy_and_permissive() {
        let opts = AssemblerOptions::default();
        assert!(opts.lazy_children);
        assert!(opts.allow_conditional_siblings);
        assert!(opts.optimize_on_assemble);
        assert_eq!(opts.core_module, DEFAULT_CORE_MODULE);
    }

    #[test]
    fn named_constructors_flip_one_knob() {
        assert!(!AssemblerOptions::eager().lazy_children);
        assert!(AssemblerOptions::eager().allow_conditional_siblings);
        assert!(!AssemblerOptions::strict().allow_conditional_siblings);
        assert_eq!(
            AssemblerOptions::strict().with_core_module("core.test").core_module,
            "core.test"
        );
    }
}
