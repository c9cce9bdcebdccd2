// src/component/serialize.rs
//
// Component bodies and child blocks.
//
// A child block is a packed count of name-slots followed by one record per
// slot. A slot with a single unconditional body is written as that body; a
// slot with a condition or several siblings starts with 0x80, a packed
// sibling count, then a packed condition index (-1 for none) and a body per
// sibling. Every slot record ends with the packed byte length of the
// children block its siblings share, followed by that block (length 0 means
// no children). The length lets a reader keep the block as raw bytes.
//
// Body: flags word, packed identity, packed contribution count and the
// contributions, then the payload of the component kind.

use std::sync::Arc;

use strata_identity::ComponentId;

use super::children::{ChildMap, ChildState};
use super::contribution::Contribution;
use super::flags::{ComponentFlags, Format};
use super::{ClassData, Component, ComponentKind, MethodData, ModuleData, ModuleType, PropertyData, TypeParam};
use crate::access::Access;
use crate::codec::{ByteReader, ByteWriter};
use crate::errors::FormatError;
use crate::errors::format::at;
use crate::file::FileStructure;

const PROP_TYPE_PARAM: u8 = 0x01;
const PROP_READ_ONLY: u8 = 0x02;
const PROP_VAR_ACCESS_SHIFT: u8 = 2;

impl FileStructure {
    // ========================================================================
    // Writing
    // ========================================================================

    /// Write the children block of `parent`, length prefix included.
    pub(crate) fn write_child_block(&self, parent: ComponentId, out: &mut ByteWriter) {
        let Some(slot) = self.component(parent).children else {
            out.write_magnitude(0);
            return;
        };
        match &self.slots[slot.as_usize()].state {
            ChildState::Unparsed { bytes, .. } => {
                debug_assert!(false, "writing an unparsed child block");
                out.write_magnitude(bytes.len());
                out.write_bytes(bytes);
            }
            ChildState::Parsed(map) if map.is_empty() => out.write_magnitude(0),
            ChildState::Parsed(map) => {
                let mut block = ByteWriter::new();
                block.write_magnitude(map.len());
                for eldest in map.ids() {
                    self.write_name_slot(eldest, &mut block);
                }
                out.write_magnitude(block.len());
                out.write_bytes(block.as_slice());
            }
        }
    }

    fn write_name_slot(&self, eldest: ComponentId, out: &mut ByteWriter) {
        let chain = self.siblings(eldest);
        if chain.len() == 1 && self.component(eldest).condition.is_none() {
            self.write_body(eldest, out);
        } else {
            out.write_u8(ComponentFlags::CONDITIONAL_BIT);
            out.write_magnitude(chain.len());
            for &sibling in &chain {
                out.write_opt_id(self.component(sibling).condition);
                self.write_body(sibling, out);
            }
        }
        self.write_child_block(eldest, out);
    }

    fn write_body(&self, id: ComponentId, out: &mut ByteWriter) {
        let component = self.component(id);
        out.write_u16(component.flags.bits());
        out.write_id(component.identity);
        out.write_magnitude(component.contributions.len());
        for contribution in &component.contributions {
            contribution.write(out);
        }

        match &component.kind {
            ComponentKind::File | ComponentKind::Package | ComponentKind::MultiMethod => {}
            ComponentKind::Module(module) => {
                out.write_u8(module.module_type as u8);
                out.write_opt_id(module.version);
            }
            ComponentKind::Class(class) => {
                out.write_magnitude(class.type_params.len());
                for param in &class.type_params {
                    out.write_id(param.name);
                    out.write_id(param.constraint);
                }
            }
            ComponentKind::Property(prop) => {
                let mut bits = 0;
                if prop.is_type_param {
                    bits |= PROP_TYPE_PARAM;
                }
                if prop.read_only {
                    bits |= PROP_READ_ONLY;
                }
                if let Some(access) = prop.var_access {
                    bits |= access.bits() << PROP_VAR_ACCESS_SHIFT;
                }
                out.write_u8(bits);
                out.write_id(prop.ty);
            }
            ComponentKind::Method(method) => {
                out.write_magnitude(method.param_names.len());
                for &name in &method.param_names {
                    out.write_id(name);
                }
                out.write_packed(method.default_count as i64);
            }
            ComponentKind::Typedef { referred } => out.write_id(*referred),
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Parse a child block (without its length prefix) whose children belong
    /// to `owner`. `base` is the offset of `bytes` in the file.
    pub(crate) fn read_child_block(
        &mut self,
        bytes: &[u8],
        base: usize,
        owner: ComponentId,
    ) -> Result<ChildMap, FormatError> {
        let mut input = ByteReader::with_base(bytes, base);
        let map = self.read_name_slots(&mut input, owner)?;
        if !input.is_empty() {
            return Err(FormatError::TrailingBytes {
                count: input.remaining(),
                span: at(input.position()),
            });
        }
        Ok(map)
    }

    fn read_name_slots(
        &mut self,
        input: &mut ByteReader<'_>,
        owner: ComponentId,
    ) -> Result<ChildMap, FormatError> {
        let count = input.read_magnitude()?;
        let mut map = ChildMap::default();
        for _ in 0..count {
            let chain = if input.peek_u8()? & ComponentFlags::CONDITIONAL_BIT != 0 {
                input.read_u8()?;
                let siblings = input.read_magnitude()?;
                let mut chain = Vec::with_capacity(siblings.min(input.remaining()));
                for _ in 0..siblings {
                    let condition = self.pool.read_opt_ref(input)?;
                    let id = self.read_body(input, owner)?;
                    self.component_mut(id).condition = condition;
                    chain.push(id);
                }
                chain
            } else {
                vec![self.read_body(input, owner)?]
            };

            let length = input.read_magnitude()?;
            let start = input.position();
            let block = input.read_bytes(length)?;
            let Some(&eldest) = chain.first() else {
                continue;
            };
            for pair in chain.windows(2) {
                self.component_mut(pair[0]).next_sibling = Some(pair[1]);
            }

            let key = self.child_key(eldest);
            if !map.insert(key.clone(), eldest) {
                return Err(FormatError::DuplicateSlot {
                    name: format!("{key:?}"),
                });
            }

            if length > 0 {
                let state = if self.options.lazy_children {
                    ChildState::Unparsed {
                        bytes: Arc::from(block),
                        base: start,
                    }
                } else {
                    ChildState::Parsed(self.read_child_block(block, start, eldest)?)
                };
                let slot = self.alloc_slot(eldest, state);
                for &sibling in &chain {
                    self.component_mut(sibling).children = Some(slot);
                }
            }
        }
        tracing::trace!(owner = %owner, slots = map.len(), "read child block");
        Ok(map)
    }

    fn read_body(&mut self, input: &mut ByteReader<'_>, parent: ComponentId) -> Result<ComponentId, FormatError> {
        let start = input.position();
        let flags = ComponentFlags::from_bits(input.read_u16()?, start)?;
        let format = flags.format();
        let parent_format = self.component(parent).format();
        if !parent_format.can_contain(format) {
            return Err(FormatError::MisplacedComponent {
                child: format.name(),
                parent: parent_format.name(),
            });
        }

        let identity = self.pool.read_ref(input)?;
        let found = self.pool.get(identity);
        if !found.is_identity() {
            return Err(FormatError::WrongConstantKind {
                index: identity.index(),
                expected: "identity",
                found: found.format().name().to_string(),
            });
        }

        let count = input.read_magnitude()?;
        let mut contributions = Vec::with_capacity(count.min(input.remaining()));
        for _ in 0..count {
            contributions.push(Contribution::read(input, &self.pool)?);
        }

        let kind = match format {
            Format::File => {
                return Err(FormatError::MisplacedComponent {
                    child: format.name(),
                    parent: parent_format.name(),
                });
            }
            Format::Package => ComponentKind::Package,
            Format::MultiMethod => ComponentKind::MultiMethod,
            Format::Module => {
                let at_type = input.position();
                let ordinal = input.read_u8()?;
                let module_type = ModuleType::from_ordinal(ordinal).ok_or(FormatError::UnknownModuleType {
                    ordinal,
                    span: at(at_type),
                })?;
                ComponentKind::Module(ModuleData {
                    module_type,
                    version: self.pool.read_opt_ref(input)?,
                })
            }
            Format::Property => {
                let at_bits = input.position();
                let bits = input.read_u8()?;
                let var_bits = (bits >> PROP_VAR_ACCESS_SHIFT) & 0x03;
                let var_access = match var_bits {
                    0 => None,
                    b => Some(Access::from_bits(b).ok_or(FormatError::InvalidAccess {
                        bits: b as u16,
                        span: at(at_bits),
                    })?),
                };
                ComponentKind::Property(PropertyData {
                    ty: self.pool.read_ref(input)?,
                    is_type_param: bits & PROP_TYPE_PARAM != 0,
                    read_only: bits & PROP_READ_ONLY != 0,
                    var_access,
                })
            }
            Format::Method => {
                let count = input.read_magnitude()?;
                let mut param_names = Vec::with_capacity(count.min(input.remaining()));
                for _ in 0..count {
                    param_names.push(self.pool.read_ref(input)?);
                }
                let default_count = input.read_magnitude()?;
                ComponentKind::Method(MethodData {
                    param_names,
                    default_count: u16::try_from(default_count).unwrap_or(u16::MAX),
                })
            }
            Format::Typedef => ComponentKind::Typedef {
                referred: self.pool.read_ref(input)?,
            },
            _ => {
                let count = input.read_magnitude()?;
                let mut type_params = Vec::with_capacity(count.min(input.remaining()));
                for _ in 0..count {
                    type_params.push(TypeParam {
                        name: self.pool.read_ref(input)?,
                        constraint: self.pool.read_ref(input)?,
                    });
                }
                ComponentKind::Class(ClassData {
                    type_params,
                    ..ClassData::default()
                })
            }
        };

        let mut component = Component::new(identity, flags, kind);
        component.contributions = contributions;
        component.parent = Some(parent);
        Ok(self.alloc(component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AssemblerOptions;

    #[test]
    fn method_cannot_sit_under_a_module() {
        let mut file = FileStructure::new("lib.example.org", AssemblerOptions::default());
        let module = file.module();
        // one slot: a public method flags word, then identity 0
        let bytes = [0x01, 0x01, 0x0B, 0x00];
        let err = file.read_child_block(&bytes, 0, module).unwrap_err();
        assert!(matches!(
            err,
            FormatError::MisplacedComponent {
                child: "method",
                parent: "module"
            }
        ));
    }

    #[test]
    fn unread_bytes_after_the_slots_are_rejected() {
        let mut file = FileStructure::new("lib.example.org", AssemblerOptions::default());
        let module = file.module();
        let bytes = [0x00, 0xFF];
        let err = file.read_child_block(&bytes, 10, module).unwrap_err();
        match err {
            FormatError::TrailingBytes { count, span } => {
                assert_eq!(count, 1);
                assert_eq!(span.offset(), 11);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn body_round_trips_through_a_block() {
        let mut file = FileStructure::new("lib.example.org", AssemblerOptions::eager());
        let module = file.module();
        let class = file
            .create_class(module, Format::Class, "Widget", Access::Public)
            .unwrap();
        let object = file.pool_mut().object_type();
        file.create_property(class, "size", object, Access::Protected).unwrap();

        let mut out = ByteWriter::new();
        file.write_child_block(module, &mut out);
        let bytes = out.into_bytes();
        let mut input = ByteReader::new(&bytes);
        let length = input.read_magnitude().unwrap();
        let start = input.position();
        let block = input.read_bytes(length).unwrap().to_vec();

        let map = file.read_child_block(&block, start, module).unwrap();
        assert_eq!(map.len(), 1);
        let copy = map.ids().next().unwrap();
        assert_eq!(file.component(copy).identity(), file.component(class).identity());
        assert_eq!(file.child_names(copy), vec!["size".to_string()]);
    }
}
