// src/pool/serialize.rs
//
// The pool section of a module file: a packed count, then one
// `{tag byte}{payload}` record per constant in position order. Payload indexes
// may point forward, so references are checked only after the whole section
// has been read.

use strata_identity::{ConstantId, Version};

use super::{ConstantPool, PoolEntry};
use crate::access::Access;
use crate::codec::{ByteReader, ByteWriter};
use crate::constant::{ConstantFormat, ConstantIdVec, ConstantKind};
use crate::errors::format::at;
use crate::errors::{FormatError, PoolError};

impl ConstantPool {
    /// Write every constant. A referenced unresolved name cannot be written.
    pub fn write_to(&self, out: &mut ByteWriter) -> Result<(), PoolError> {
        out.write_magnitude(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let kind = self.get(ConstantId::new(i as u32));
            if let ConstantKind::UnresolvedName(name) = kind
                && entry.refs > 0
            {
                return Err(PoolError::UnresolvedConstant {
                    name: name.to_string(),
                });
            }
            out.write_u8(kind.format().tag());
            let kind = kind.map_references(|r| self.canonical(r));
            write_payload(&kind, out);
        }
        Ok(())
    }

    /// Read a pool section, validating every cross-reference.
    pub fn read_from(
        input: &mut ByteReader<'_>,
        core_module: &'static str,
    ) -> Result<ConstantPool, FormatError> {
        let count = input.read_magnitude()?;
        let mut entries = Vec::with_capacity(count.min(input.remaining()));
        for _ in 0..count {
            let start = input.position();
            let tag = input.read_u8()?;
            let format = ConstantFormat::from_tag(tag).ok_or(FormatError::UnknownConstantTag {
                tag,
                span: at(start),
            })?;
            entries.push(PoolEntry::new(read_payload(format, input)?));
        }

        for entry in &entries {
            if let Some(bad) = entry.kind.references().into_iter().find(|r| r.as_usize() >= count) {
                return Err(FormatError::IndexOutOfRange {
                    index: bad.index() as i64,
                    size: count,
                });
            }
        }

        let mut pool = ConstantPool::new(core_module);
        pool.entries = entries;
        pool.rebuild_indexes();
        tracing::trace!(constants = count, pool = %pool.id, "read constant pool");
        Ok(pool)
    }

    /// Read an index and check it against this pool.
    pub(crate) fn read_ref(&self, input: &mut ByteReader<'_>) -> Result<ConstantId, FormatError> {
        let id = input.read_id()?;
        self.check_ref(id)
    }

    pub(crate) fn read_opt_ref(
        &self,
        input: &mut ByteReader<'_>,
    ) -> Result<Option<ConstantId>, FormatError> {
        input.read_opt_id()?.map(|id| self.check_ref(id)).transpose()
    }

    fn check_ref(&self, id: ConstantId) -> Result<ConstantId, FormatError> {
        if id.as_usize() >= self.entries.len() {
            return Err(FormatError::IndexOutOfRange {
                index: id.index() as i64,
                size: self.entries.len(),
            });
        }
        Ok(id)
    }
}

fn write_ids(ids: &[ConstantId], out: &mut ByteWriter) {
    out.write_magnitude(ids.len());
    for &id in ids {
        out.write_id(id);
    }
}

fn write_payload(kind: &ConstantKind, out: &mut ByteWriter) {
    use ConstantKind as K;
    match kind {
        K::Int(v) => out.write_packed(*v),
        K::Byte(v) => out.write_u8(*v),
        K::Char(c) => out.write_packed(*c as i64),
        K::String(s) | K::IntLiteral(s) | K::FPLiteral(s) | K::UnresolvedName(s) => {
            out.write_utf8(s)
        }
        K::Version(v) => out.write_utf8(v.literal()),

        K::Module { name } => out.write_id(*name),
        K::Package { parent, name }
        | K::Class { parent, name }
        | K::Typedef { parent, name }
        | K::Property { parent, name }
        | K::MultiMethod { parent, name }
        | K::ChildClass { parent, name }
        | K::VirtualChildType { parent, name } => {
            out.write_id(*parent);
            out.write_id(*name);
        }
        K::Method { parent, signature } => {
            out.write_id(*parent);
            out.write_id(*signature);
        }
        K::Signature {
            name,
            params,
            returns,
        } => {
            out.write_id(*name);
            write_ids(params, out);
            write_ids(returns, out);
        }

        K::NativeClass { class } | K::ThisClass { class } => out.write_id(*class),
        K::ParentClass { child } => out.write_id(*child),

        K::TerminalType { defining } => out.write_id(*defining),
        K::ImmutableType { ty } => out.write_id(*ty),
        K::AccessType { ty, access } => {
            out.write_id(*ty);
            out.write_u8(access.bits());
        }
        K::AnnotatedType { annotation, ty } => {
            out.write_id(*annotation);
            out.write_id(*ty);
        }
        K::ParameterizedType { base, params } => {
            out.write_id(*base);
            write_ids(params, out);
        }
        K::UnionType { first, second }
        | K::IntersectionType { first, second }
        | K::DifferenceType { first, second } => {
            out.write_id(*first);
            out.write_id(*second);
        }
        K::Annotation { class, args } => {
            out.write_id(*class);
            write_ids(args, out);
        }

        K::ConditionNot { condition } => out.write_id(*condition),
        K::ConditionAll { conditions } | K::ConditionAny { conditions } => {
            write_ids(conditions, out)
        }
        K::ConditionNamed { name } => out.write_id(*name),
        K::ConditionPresent { identity } => out.write_id(*identity),
        K::ConditionVersionMatches { module, version } => {
            out.write_id(*module);
            out.write_id(*version);
        }
        K::ConditionVersioned { version } => out.write_id(*version),
    }
}

fn read_ids(input: &mut ByteReader<'_>) -> Result<ConstantIdVec, FormatError> {
    let count = input.read_magnitude()?;
    (0..count).map(|_| input.read_id()).collect()
}

fn read_payload(format: ConstantFormat, input: &mut ByteReader<'_>) -> Result<ConstantKind, FormatError> {
    use ConstantFormat as F;
    use ConstantKind as K;

    let pair = |input: &mut ByteReader<'_>| -> Result<(ConstantId, ConstantId), FormatError> {
        Ok((input.read_id()?, input.read_id()?))
    };

    Ok(match format {
        F::Int => K::Int(input.read_packed()?),
        F::Byte => K::Byte(input.read_u8()?),
        F::Char => {
            let start = input.position();
            let value = input.read_packed()?;
            let c = u32::try_from(value)
                .ok()
                .and_then(char::from_u32)
                .ok_or(FormatError::InvalidChar {
                    value,
                    span: at(start),
                })?;
            K::Char(c)
        }
        F::String => K::String(input.read_utf8()?.into()),
        F::IntLiteral => K::IntLiteral(input.read_utf8()?.into()),
        F::FPLiteral => K::FPLiteral(input.read_utf8()?.into()),
        F::UnresolvedName => K::UnresolvedName(input.read_utf8()?.into()),
        F::Version => K::Version(Version::parse(input.read_utf8()?)?),

        F::Module => K::Module {
            name: input.read_id()?,
        },
        F::Package => {
            let (parent, name) = pair(input)?;
            K::Package { parent, name }
        }
        F::Class => {
            let (parent, name) = pair(input)?;
            K::Class { parent, name }
        }
        F::Typedef => {
            let (parent, name) = pair(input)?;
            K::Typedef { parent, name }
        }
        F::Property => {
            let (parent, name) = pair(input)?;
            K::Property { parent, name }
        }
        F::MultiMethod => {
            let (parent, name) = pair(input)?;
            K::MultiMethod { parent, name }
        }
        F::Method => {
            let (parent, signature) = pair(input)?;
            K::Method { parent, signature }
        }
        F::Signature => {
            let name = input.read_id()?;
            let params = read_ids(input)?;
            let returns = read_ids(input)?;
            K::Signature {
                name,
                params,
                returns,
            }
        }

        F::NativeClass => K::NativeClass {
            class: input.read_id()?,
        },
        F::ThisClass => K::ThisClass {
            class: input.read_id()?,
        },
        F::ParentClass => K::ParentClass {
            child: input.read_id()?,
        },
        F::ChildClass => {
            let (parent, name) = pair(input)?;
            K::ChildClass { parent, name }
        }

        F::TerminalType => K::TerminalType {
            defining: input.read_id()?,
        },
        F::ImmutableType => K::ImmutableType {
            ty: input.read_id()?,
        },
        F::AccessType => {
            let ty = input.read_id()?;
            let start = input.position();
            let bits = input.read_u8()?;
            let access = Access::from_bits(bits).ok_or(FormatError::InvalidAccess {
                bits: bits as u16,
                span: at(start),
            })?;
            K::AccessType { ty, access }
        }
        F::AnnotatedType => {
            let (annotation, ty) = pair(input)?;
            K::AnnotatedType { annotation, ty }
        }
        F::ParameterizedType => {
            let base = input.read_id()?;
            K::ParameterizedType {
                base,
                params: read_ids(input)?,
            }
        }
        F::VirtualChildType => {
            let (parent, name) = pair(input)?;
            K::VirtualChildType { parent, name }
        }
        F::UnionType => {
            let (first, second) = pair(input)?;
            K::UnionType { first, second }
        }
        F::IntersectionType => {
            let (first, second) = pair(input)?;
            K::IntersectionType { first, second }
        }
        F::DifferenceType => {
            let (first, second) = pair(input)?;
            K::DifferenceType { first, second }
        }
        F::Annotation => {
            let class = input.read_id()?;
            K::Annotation {
                class,
                args: read_ids(input)?,
            }
        }

        F::ConditionNot => K::ConditionNot {
            condition: input.read_id()?,
        },
        F::ConditionAll => K::ConditionAll {
            conditions: read_ids(input)?,
        },
        F::ConditionAny => K::ConditionAny {
            conditions: read_ids(input)?,
        },
        F::ConditionNamed => K::ConditionNamed {
            name: input.read_id()?,
        },
        F::ConditionPresent => K::ConditionPresent {
            identity: input.read_id()?,
        },
        F::ConditionVersionMatches => {
            let (module, version) = pair(input)?;
            K::ConditionVersionMatches { module, version }
        }
        F::ConditionVersioned => K::ConditionVersioned {
            version: input.read_id()?,
        },
    })
}
