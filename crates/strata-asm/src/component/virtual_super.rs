// src/component/virtual_super.rs
//
// Implicit supers of virtual child classes.
//
// A virtual child `Outer.Inner` inherits from every same-named nested class
// reachable through the contributions of its enclosing classes: if `Outer`
// extends `Base` and `Base` declares `Inner`, then `Outer.Inner` extends
// `Base.Inner`. The search climbs the enclosing chain one level at a time and
// stops after the first enclosing class that is not itself a virtual child.

use rustc_hash::FxHashSet;
use strata_identity::{ComponentId, ConstantId};

use super::contribution::{Composition, Contribution, insert_ordered};
use super::flags::Format;
use crate::diagnostics::{Diagnostic, Severity, VE_VIRTUAL_SUPER_UNRESOLVED};
use crate::errors::StructureError;
use crate::file::FileStructure;

/// Outcome of deriving the implicit supers of a virtual child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualSuperResult {
    /// Contributions that were derived and added to the child.
    Found(Vec<Contribution>),
    /// The child definitely has no virtual super.
    Nothing,
    /// Something on the way is unresolved; ask again later.
    Retry,
}

/// What a search below one contributor turned up.
enum SuperSearch {
    Found(ComponentId),
    Retry,
}

impl FileStructure {
    /// Derive the implicit `extends`/`implements` contributions of the
    /// virtual child `id` and add them to it.
    pub fn resolve_virtual_super(&mut self, id: ComponentId) -> Result<VirtualSuperResult, StructureError> {
        if !self.is_virtual_child(id) {
            return Err(StructureError::NotVirtualChild {
                name: self.pool.describe(self.component(id).identity),
            });
        }

        let this_identity = self.component(id).identity;
        let mut visited = FxHashSet::default();
        visited.insert(this_identity);

        let mut found = Vec::new();
        let mut parent = self.component(id).parent;
        let mut depth = 1;
        while let Some(level) = parent {
            if visited.insert(self.component(level).identity) {
                let Some(contributors) = self.potential_virtual_child_contributors(level) else {
                    return Ok(self.virtual_super_retry(this_identity));
                };
                for contributor in contributors {
                    if self.pool.contains_unresolved(contributor) {
                        return Ok(self.virtual_super_retry(this_identity));
                    }
                    let Some(component) = self.component_of(contributor) else {
                        continue;
                    };
                    match self.find_virtual_child_super(component, this_identity, depth, &mut visited) {
                        None => {}
                        Some(SuperSearch::Retry) => return Ok(self.virtual_super_retry(this_identity)),
                        Some(SuperSearch::Found(sup)) => {
                            let contribution = self.virtual_super_contribution(
                                this_identity,
                                contributor,
                                component,
                                sup,
                                depth,
                            );
                            if !found.contains(&contribution) {
                                found.push(contribution);
                            }
                        }
                    }
                }
            }

            let component = self.component(level);
            if component.format().is_class() && !self.is_virtual_child(level) {
                break;
            }
            parent = component.parent;
            depth += 1;
        }

        if found.is_empty() {
            return Ok(VirtualSuperResult::Nothing);
        }
        let child = self.component_mut(id);
        for contribution in &found {
            if !child.contributions.contains(contribution) {
                insert_ordered(&mut child.contributions, contribution.clone());
            }
        }
        tracing::debug!(
            class = %self.pool.describe(this_identity),
            supers = found.len(),
            "resolved virtual super"
        );
        Ok(VirtualSuperResult::Found(found))
    }

    fn virtual_super_retry(&mut self, child: ConstantId) -> VirtualSuperResult {
        let described = self.pool.describe(child);
        tracing::debug!(class = %described, "virtual super depends on an unresolved type");
        self.report(
            Diagnostic::new(Severity::Info, VE_VIRTUAL_SUPER_UNRESOLVED)
                .with_arg(described)
                .with_source(child),
        );
        VirtualSuperResult::Retry
    }

    /// Identities of the classes a component's contributions could inherit
    /// virtual children from. `None` when one of them is still unresolved.
    fn potential_virtual_child_contributors(&mut self, id: ComponentId) -> Option<Vec<ConstantId>> {
        let component = self.component(id);
        let is_class = component.format().is_class();
        if !is_class && component.format() != Format::Property {
            return Some(Vec::new());
        }

        let mut out = Vec::new();
        for contrib in component.contributions.clone() {
            let ty = contrib.type_constant();
            match contrib.composition() {
                Composition::Annotation if is_class && self.is_into_class_mixin(id, ty) => continue,
                Composition::Annotation
                | Composition::Extends
                | Composition::Incorporates
                | Composition::Implements => {}
                _ => continue,
            }
            if self.pool.contains_unresolved(ty) {
                return None;
            }
            if self.pool.is_explicit_class_identity(ty)
                && let Some(class) = self.pool.underlying_class(ty)
            {
                out.push(class);
            }
        }
        Some(out)
    }

    /// Search below `id` for the class standing `depth` levels above the
    /// virtual child `target` in the nesting.
    fn find_virtual_child_super(
        &mut self,
        id: ComponentId,
        target: ConstantId,
        depth: usize,
        visited: &mut FxHashSet<ConstantId>,
    ) -> Option<SuperSearch> {
        let result = self.find_in_component(id, target, depth, visited);
        if result.is_none()
            && self.component(id).format().is_nested_class()
            && self.is_virtual_child(id)
            && let Some(parent) = self.component(id).parent
        {
            return self.find_virtual_child_super(parent, target, depth + 1, visited);
        }
        result
    }

    fn find_in_component(
        &mut self,
        id: ComponentId,
        target: ConstantId,
        depth: usize,
        visited: &mut FxHashSet<ConstantId>,
    ) -> Option<SuperSearch> {
        if !visited.insert(self.component(id).identity) {
            return None;
        }
        if depth == 0 {
            return Some(SuperSearch::Found(id));
        }

        // navigate down toward the child named by the path of `target`
        let mut step = target;
        for _ in 1..depth {
            step = self.pool.parent_of(step)?;
        }
        let name = self.pool.name_of(step)?.to_owned();
        if let Some(child) = self.get_child(id, &name, None).first()
            && let Some(found) = self.find_virtual_child_super(child, target, depth - 1, visited)
        {
            return Some(found);
        }

        let Some(contributors) = self.potential_virtual_child_contributors(id) else {
            return Some(SuperSearch::Retry);
        };
        let mut result = None;
        for contributor in contributors {
            if self.pool.contains_unresolved(contributor) {
                result = Some(SuperSearch::Retry);
                continue;
            }
            if let Some(component) = self.component_of(contributor)
                && let Some(found) = self.find_virtual_child_super(component, target, depth, visited)
            {
                return Some(found);
            }
        }
        result
    }

    /// The implicit contribution for a virtual super found through
    /// `contributor` at `depth` levels above the child.
    fn virtual_super_contribution(
        &mut self,
        child: ConstantId,
        contributor: ConstantId,
        contributor_component: ComponentId,
        found: ComponentId,
        depth: usize,
    ) -> Contribution {
        let super_identity = self.append_trailing_path(child, contributor, depth);
        let (super_class, ty) = match self.component_of(super_identity) {
            Some(existing) => (existing, self.formal_type(existing)),
            None => {
                // the super only exists through the contributor's own supers
                let parent_ty = self.formal_type(contributor_component);
                let name = self.pool.name_of(child).unwrap_or("").to_owned();
                let mut ty = self.pool.ensure_virtual_child_type(parent_ty, &name);
                let own = self.own_formal_params(found);
                if !own.is_empty() {
                    ty = self.pool.ensure_parameterized_type(ty, &own);
                }
                (found, ty)
            }
        };
        let composition = if self.component(super_class).format() == Format::Interface {
            Composition::Implements
        } else {
            Composition::Extends
        };
        Contribution::new(composition, ty)
    }

    /// `base` extended by the last `segments` names of `path`.
    fn append_trailing_path(&mut self, path: ConstantId, base: ConstantId, segments: usize) -> ConstantId {
        let mut tail = Vec::with_capacity(segments);
        let mut cur = Some(path);
        for _ in 0..segments {
            let Some(id) = cur else { break };
            tail.push(id);
            cur = self.pool.parent_of(id);
        }
        let mut out = base;
        for id in tail.into_iter().rev() {
            let name = self.pool.name_of(id).unwrap_or("").to_owned();
            out = self.pool.ensure_child_identity(out, &name, id);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Access;
    use crate::diagnostics::CollectingListener;
    use crate::options::AssemblerOptions;

    fn file() -> FileStructure {
        FileStructure::new("lib.example.org", AssemblerOptions::default())
    }

    #[test]
    fn top_level_class_is_not_a_virtual_child() {
        let mut file = file();
        let module = file.module();
        let base = file.create_class(module, Format::Class, "Base", Access::Public).unwrap();
        assert!(matches!(
            file.resolve_virtual_super(base),
            Err(StructureError::NotVirtualChild { .. })
        ));
    }

    #[test]
    fn nested_class_of_unrelated_parent_has_nothing() {
        let mut file = file();
        let module = file.module();
        let outer = file.create_class(module, Format::Class, "Outer", Access::Public).unwrap();
        let inner = file.create_class(outer, Format::Class, "Inner", Access::Public).unwrap();
        assert_eq!(file.resolve_virtual_super(inner).unwrap(), VirtualSuperResult::Nothing);
    }

    #[test]
    fn interface_super_is_implemented() {
        let mut file = file();
        let module = file.module();
        let base = file.create_class(module, Format::Interface, "Base", Access::Public).unwrap();
        file.create_class(base, Format::Interface, "Node", Access::Public).unwrap();
        let outer = file.create_class(module, Format::Class, "Outer", Access::Public).unwrap();
        let base_type = file.formal_type(base);
        file.add_contribution(outer, Composition::Implements, base_type).unwrap();
        let node = file.create_class(outer, Format::Class, "Node", Access::Public).unwrap();

        let VirtualSuperResult::Found(found) = file.resolve_virtual_super(node).unwrap() else {
            panic!("expected a virtual super");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].composition(), Composition::Implements);
        assert_eq!(file.pool().describe(found[0].type_constant()), "lib.example.org:Base.Node");
        assert!(file.component(node).contributions().contains(&found[0]));
    }

    #[test]
    fn unresolved_contribution_asks_for_retry() {
        let mut file = file();
        let module = file.module();
        let outer = file.create_class(module, Format::Class, "Outer", Access::Public).unwrap();
        let pending = file.pool_mut().ensure_unresolved("Base");
        let pending = file.pool_mut().ensure_terminal_type(pending);
        file.add_contribution(outer, Composition::Extends, pending).unwrap();
        let inner = file.create_class(outer, Format::Class, "Inner", Access::Public).unwrap();
        let handle = CollectingListener::default();
        file.set_error_listener(Box::new(handle.clone()));
        assert_eq!(file.resolve_virtual_super(inner).unwrap(), VirtualSuperResult::Retry);
        assert!(handle.has_code(VE_VIRTUAL_SUPER_UNRESOLVED));
    }
}
