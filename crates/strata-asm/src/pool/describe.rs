// src/pool/describe.rs
//
// Human-readable rendering of constants for dumps, logs and error messages.

use std::fmt::Write;

use strata_identity::ConstantId;

use super::ConstantPool;
use crate::constant::ConstantKind;

impl ConstantPool {
    /// Render a constant, e.g. `lib.example.org:collections.Map<Key, Value>`.
    pub fn describe(&self, id: ConstantId) -> String {
        let mut out = String::new();
        self.describe_into(id, &mut out);
        out
    }

    /// Path of an identity: module name, then `:`, then dotted nested names.
    pub fn identity_path(&self, id: ConstantId) -> String {
        self.describe(id)
    }

    fn describe_list(&self, ids: &[ConstantId], out: &mut String) {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.describe_into(id, out);
        }
    }

    fn describe_nested(&self, parent: ConstantId, name: ConstantId, out: &mut String) {
        self.describe_into(parent, out);
        let separator = if matches!(self.get(parent), ConstantKind::Module { .. }) {
            ':'
        } else {
            '.'
        };
        out.push(separator);
        out.push_str(self.string(name).unwrap_or("?"));
    }

    fn describe_into(&self, id: ConstantId, out: &mut String) {
        use ConstantKind as K;

        let Some(kind) = self.entries.get(self.canonical(id).as_usize()).map(|e| &e.kind) else {
            let _ = write!(out, "<{id}>");
            return;
        };

        match kind {
            K::Int(v) => {
                let _ = write!(out, "{v}");
            }
            K::Byte(v) => {
                let _ = write!(out, "{v:#04x}");
            }
            K::Char(c) => {
                let _ = write!(out, "{c:?}");
            }
            K::String(s) => {
                let _ = write!(out, "{s:?}");
            }
            K::IntLiteral(s) | K::FPLiteral(s) => out.push_str(s),
            K::Version(v) => {
                let _ = write!(out, "v:{v}");
            }

            K::Module { name } => out.push_str(self.string(*name).unwrap_or("?")),
            K::Package { parent, name }
            | K::Class { parent, name }
            | K::Typedef { parent, name }
            | K::Property { parent, name }
            | K::MultiMethod { parent, name } => self.describe_nested(*parent, *name, out),
            K::Method { parent, signature } => {
                self.describe_into(*parent, out);
                if let K::Signature { params, .. } = self.get(*signature) {
                    out.push('(');
                    self.describe_list(params, out);
                    out.push(')');
                }
            }
            K::Signature {
                name,
                params,
                returns,
            } => {
                out.push_str(self.string(*name).unwrap_or("?"));
                out.push('(');
                self.describe_list(params, out);
                out.push(')');
                if !returns.is_empty() {
                    out.push_str(" -> ");
                    self.describe_list(returns, out);
                }
            }

            K::UnresolvedName(name) => {
                let _ = write!(out, "?{name}");
            }
            K::NativeClass { class } => {
                out.push_str("native:");
                self.describe_into(*class, out);
            }
            K::ThisClass { class } => {
                out.push_str("this:");
                self.describe_into(*class, out);
            }
            K::ParentClass { child } => {
                out.push_str("parent:");
                self.describe_into(*child, out);
            }
            K::ChildClass { parent, name } => {
                out.push_str("child:");
                self.describe_into(*parent, out);
                out.push('.');
                out.push_str(self.string(*name).unwrap_or("?"));
            }

            K::TerminalType { defining } => match self.get(*defining) {
                // Formal types read as the bare parameter name.
                K::Property { name, .. } => out.push_str(self.string(*name).unwrap_or("?")),
                _ => self.describe_into(*defining, out),
            },
            K::ImmutableType { ty } => {
                out.push_str("immutable ");
                self.describe_into(*ty, out);
            }
            K::AccessType { ty, access } => {
                self.describe_into(*ty, out);
                let _ = write!(out, ":{access}");
            }
            K::AnnotatedType { annotation, ty } => {
                self.describe_into(*annotation, out);
                out.push(' ');
                self.describe_into(*ty, out);
            }
            K::ParameterizedType { base, params } => {
                self.describe_into(*base, out);
                out.push('<');
                self.describe_list(params, out);
                out.push('>');
            }
            K::VirtualChildType { parent, name } => {
                self.describe_into(*parent, out);
                out.push('.');
                out.push_str(self.string(*name).unwrap_or("?"));
            }
            K::UnionType { first, second } => self.describe_binary(*first, " | ", *second, out),
            K::IntersectionType { first, second } => {
                self.describe_binary(*first, " + ", *second, out)
            }
            K::DifferenceType { first, second } => self.describe_binary(*first, " - ", *second, out),
            K::Annotation { class, args } => {
                out.push('@');
                self.describe_into(*class, out);
                if !args.is_empty() {
                    out.push('(');
                    self.describe_list(args, out);
                    out.push(')');
                }
            }

            K::ConditionNot { condition } => {
                out.push('!');
                self.describe_into(*condition, out);
            }
            K::ConditionAll { conditions } => {
                out.push_str("all(");
                self.describe_list(conditions, out);
                out.push(')');
            }
            K::ConditionAny { conditions } => {
                out.push_str("any(");
                self.describe_list(conditions, out);
                out.push(')');
            }
            K::ConditionNamed { name } => {
                let _ = write!(out, "named({})", self.string(*name).unwrap_or("?"));
            }
            K::ConditionPresent { identity } => {
                out.push_str("present(");
                self.describe_into(*identity, out);
                out.push(')');
            }
            K::ConditionVersionMatches { module, version } => {
                out.push_str("version(");
                self.describe_into(*module, out);
                out.push_str(", ");
                self.describe_into(*version, out);
                out.push(')');
            }
            K::ConditionVersioned { version } => self.describe_into(*version, out),
        }
    }

    fn describe_binary(&self, first: ConstantId, op: &str, second: ConstantId, out: &mut String) {
        self.describe_into(first, out);
        out.push_str(op);
        self.describe_into(second, out);
    }
}
