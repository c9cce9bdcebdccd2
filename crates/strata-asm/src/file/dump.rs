// src/file/dump.rs
//
// Indented text rendering of the component tree, for logs and tests.

use std::fmt::Write;

use strata_identity::ComponentId;

use super::FileStructure;
use crate::component::children::ChildState;
use crate::component::{Component, ComponentKind, ModuleType};

const INDENT: &str = "  ";

impl FileStructure {
    /// Render the whole tree. Child blocks that were not parsed yet are shown
    /// by size only.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_component(self.root, 0, &mut out);
        out
    }

    /// Render one component and everything below it.
    pub fn dump_subtree(&self, id: ComponentId) -> String {
        let mut out = String::new();
        self.dump_component(id, 0, &mut out);
        out
    }

    fn dump_component(&self, id: ComponentId, depth: usize, out: &mut String) {
        let component = self.component(id);
        push_indent(out, depth);
        self.dump_header(component, out);
        out.push('\n');

        for contribution in &component.contributions {
            push_indent(out, depth + 1);
            let _ = writeln!(
                out,
                "{} {}",
                contribution.composition(),
                self.pool.describe(contribution.type_constant())
            );
        }

        let Some(slot) = component.children else {
            return;
        };
        // only the eldest sibling renders the shared children
        if self.eldest_sibling(id) != id {
            return;
        }
        match &self.slots[slot.as_usize()].state {
            ChildState::Unparsed { bytes, .. } => {
                push_indent(out, depth + 1);
                let _ = writeln!(out, "<{} bytes not loaded>", bytes.len());
            }
            ChildState::Parsed(map) => {
                for eldest in map.ids() {
                    for sibling in self.siblings(eldest) {
                        self.dump_component(sibling, depth + 1, out);
                    }
                }
            }
        }
    }

    fn dump_header(&self, component: &Component, out: &mut String) {
        let name = self.pool.name_of(component.identity).unwrap_or("?");
        let _ = write!(out, "{} {}", component.format(), name);

        match &component.kind {
            ComponentKind::Module(data) => {
                match data.module_type {
                    ModuleType::Primary => {}
                    ModuleType::Fingerprint => out.push_str(" (fingerprint)"),
                    ModuleType::Embedded => out.push_str(" (embedded)"),
                }
                if let Some(version) = data.version {
                    let _ = write!(out, " v{}", self.pool.describe(version));
                }
            }
            ComponentKind::Class(data) if !data.type_params.is_empty() => {
                out.push('<');
                for (i, param) in data.type_params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(
                        out,
                        "{}: {}",
                        self.pool.string(param.name).unwrap_or("?"),
                        self.pool.describe(param.constraint)
                    );
                }
                out.push('>');
            }
            ComponentKind::Property(data) => {
                let _ = write!(out, ": {}", self.pool.describe(data.ty));
            }
            ComponentKind::Method(data) => {
                let _ = write!(out, "/{}", data.param_names.len());
            }
            ComponentKind::Typedef { referred } => {
                let _ = write!(out, " = {}", self.pool.describe(*referred));
            }
            _ => {}
        }

        let _ = write!(out, " [{}", component.access());
        if component.is_abstract() {
            out.push_str(" abstract");
        }
        if component.is_static() {
            out.push_str(" static");
        }
        if component.is_synthetic() {
            out.push_str(" synthetic");
        }
        if let ComponentKind::Property(data) = &component.kind {
            if data.is_type_param {
                out.push_str(" type-param");
            }
            if data.read_only {
                out.push_str(" read-only");
            }
        }
        out.push(']');

        if let Some(condition) = component.condition {
            let _ = write!(out, " if {}", self.pool.describe(condition));
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use crate::access::Access;
    use crate::component::Format;
    use crate::file::FileStructure;
    use crate::options::AssemblerOptions;

    #[test]
    fn dump_indents_children_under_their_parent() {
        let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
        let module = file.module();
        let class = file.create_class(module, Format::Class, "Widget", Access::Public).unwrap();
        let object = file.pool_mut().object_type();
        file.create_property(class, "size", object, Access::Protected).unwrap();

        let dump = file.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert!(lines[0].starts_with("file app.example.org"));
        assert!(lines[1].starts_with("  module app.example.org [public]"));
        assert!(lines[2].starts_with("    class Widget [public]"));
        assert!(lines[3].starts_with("      property size: "));
        assert!(lines[3].ends_with("[protected]"));
    }
}
