// src/component/contribution.rs
//
// Contributions: the typed edges from a class to the types it is composed of.

use strata_identity::ConstantId;

use crate::codec::{ByteReader, ByteWriter};
use crate::errors::FormatError;
use crate::errors::format::at;
use crate::pool::ConstantPool;

/// How a contribution composes into its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Composition {
    Annotation = 0,
    Extends = 1,
    Implements = 2,
    Delegates = 3,
    Into = 4,
    Incorporates = 5,
    RebasesOnto = 6,
    ImportOptional = 7,
    ImportDesired = 8,
    ImportRequired = 9,
    ImportEmbedded = 10,
    Equal = 11,
}

impl Composition {
    pub fn from_ordinal(ordinal: u8) -> Option<Composition> {
        Some(match ordinal {
            0 => Composition::Annotation,
            1 => Composition::Extends,
            2 => Composition::Implements,
            3 => Composition::Delegates,
            4 => Composition::Into,
            5 => Composition::Incorporates,
            6 => Composition::RebasesOnto,
            7 => Composition::ImportOptional,
            8 => Composition::ImportDesired,
            9 => Composition::ImportRequired,
            10 => Composition::ImportEmbedded,
            11 => Composition::Equal,
            _ => return None,
        })
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Composition::Annotation => "annotation",
            Composition::Extends => "extends",
            Composition::Implements => "implements",
            Composition::Delegates => "delegates",
            Composition::Into => "into",
            Composition::Incorporates => "incorporates",
            Composition::RebasesOnto => "rebases",
            Composition::ImportOptional => "import:optional",
            Composition::ImportDesired => "import:desired",
            Composition::ImportRequired => "import:required",
            Composition::ImportEmbedded => "import:embedded",
            Composition::Equal => "equal",
        }
    }

    pub fn is_import(self) -> bool {
        matches!(
            self,
            Composition::ImportOptional
                | Composition::ImportDesired
                | Composition::ImportRequired
                | Composition::ImportEmbedded
        )
    }
}

impl std::fmt::Display for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A constraint a conditional `incorporates` places on one type parameter:
/// the mixin applies only when the actual parameter named `name` is-a
/// `constraint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IncorporateConstraint {
    /// String constant naming the class's type parameter.
    pub name: ConstantId,
    /// Required type, or `None` for no requirement.
    pub constraint: Option<ConstantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContributionDetail {
    None,
    /// Annotation constant applied by an annotation contribution.
    Annotation(ConstantId),
    /// Property identity a delegation forwards to.
    Delegate(ConstantId),
    /// Per-parameter constraints of a conditional incorporation.
    Constraints(Vec<IncorporateConstraint>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Contribution {
    composition: Composition,
    /// The contributed type, or the module identity of an import.
    target: ConstantId,
    detail: ContributionDetail,
}

impl Contribution {
    pub fn new(composition: Composition, target: ConstantId) -> Self {
        Self {
            composition,
            target,
            detail: ContributionDetail::None,
        }
    }

    pub fn annotation(ty: ConstantId, annotation: ConstantId) -> Self {
        Self {
            composition: Composition::Annotation,
            target: ty,
            detail: ContributionDetail::Annotation(annotation),
        }
    }

    pub fn delegates(ty: ConstantId, property: ConstantId) -> Self {
        Self {
            composition: Composition::Delegates,
            target: ty,
            detail: ContributionDetail::Delegate(property),
        }
    }

    /// An `incorporates`; conditional when `constraints` is non-empty.
    pub fn incorporates(ty: ConstantId, constraints: Vec<IncorporateConstraint>) -> Self {
        let detail = if constraints.is_empty() {
            ContributionDetail::None
        } else {
            ContributionDetail::Constraints(constraints)
        };
        Self {
            composition: Composition::Incorporates,
            target: ty,
            detail,
        }
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }

    /// The contributed type (the module identity for imports).
    pub fn type_constant(&self) -> ConstantId {
        self.target
    }

    pub fn detail(&self) -> &ContributionDetail {
        &self.detail
    }

    pub fn annotation_constant(&self) -> Option<ConstantId> {
        match self.detail {
            ContributionDetail::Annotation(a) => Some(a),
            _ => None,
        }
    }

    pub fn delegate_property(&self) -> Option<ConstantId> {
        match self.detail {
            ContributionDetail::Delegate(p) => Some(p),
            _ => None,
        }
    }

    pub fn constraints(&self) -> &[IncorporateConstraint] {
        match &self.detail {
            ContributionDetail::Constraints(c) => c,
            _ => &[],
        }
    }

    pub fn is_conditional_incorporate(&self) -> bool {
        !self.constraints().is_empty()
    }

    /// Every constant this contribution stores.
    pub(crate) fn constants(&self) -> Vec<ConstantId> {
        let mut out = vec![self.target];
        match &self.detail {
            ContributionDetail::None => {}
            ContributionDetail::Annotation(a) => out.push(*a),
            ContributionDetail::Delegate(p) => out.push(*p),
            ContributionDetail::Constraints(constraints) => {
                for c in constraints {
                    out.push(c.name);
                    out.extend(c.constraint);
                }
            }
        }
        out
    }

    /// Rebuild with every stored constant passed through `f`.
    pub(crate) fn try_map_constants<E>(
        &self,
        f: &mut impl FnMut(ConstantId) -> Result<ConstantId, E>,
    ) -> Result<Contribution, E> {
        let detail = match &self.detail {
            ContributionDetail::None => ContributionDetail::None,
            ContributionDetail::Annotation(a) => ContributionDetail::Annotation(f(*a)?),
            ContributionDetail::Delegate(p) => ContributionDetail::Delegate(f(*p)?),
            ContributionDetail::Constraints(constraints) => {
                let mut mapped = Vec::with_capacity(constraints.len());
                for c in constraints {
                    mapped.push(IncorporateConstraint {
                        name: f(c.name)?,
                        constraint: c.constraint.map(&mut *f).transpose()?,
                    });
                }
                ContributionDetail::Constraints(mapped)
            }
        };
        Ok(Contribution {
            composition: self.composition,
            target: f(self.target)?,
            detail,
        })
    }

    pub(crate) fn write(&self, out: &mut ByteWriter) {
        out.write_u8(self.composition.ordinal());
        out.write_id(self.target);
        match self.composition {
            Composition::Annotation => {
                if let Some(annotation) = self.annotation_constant() {
                    out.write_id(annotation);
                } else {
                    out.write_packed(-1);
                }
            }
            Composition::Delegates => {
                if let Some(property) = self.delegate_property() {
                    out.write_id(property);
                } else {
                    out.write_packed(-1);
                }
            }
            Composition::Incorporates => {
                let constraints = self.constraints();
                out.write_magnitude(constraints.len());
                for c in constraints {
                    out.write_id(c.name);
                    out.write_opt_id(c.constraint);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn read(
        input: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<Contribution, FormatError> {
        let start = input.position();
        let ordinal = input.read_u8()?;
        let composition =
            Composition::from_ordinal(ordinal).ok_or(FormatError::UnknownComposition {
                ordinal,
                span: at(start),
            })?;
        let target = pool.read_ref(input)?;
        let detail = match composition {
            Composition::Annotation => match pool.read_opt_ref(input)? {
                Some(a) => ContributionDetail::Annotation(a),
                None => ContributionDetail::None,
            },
            Composition::Delegates => match pool.read_opt_ref(input)? {
                Some(p) => ContributionDetail::Delegate(p),
                None => ContributionDetail::None,
            },
            Composition::Incorporates => {
                let count = input.read_magnitude()?;
                let mut constraints = Vec::with_capacity(count.min(input.remaining()));
                for _ in 0..count {
                    constraints.push(IncorporateConstraint {
                        name: pool.read_ref(input)?,
                        constraint: pool.read_opt_ref(input)?,
                    });
                }
                if constraints.is_empty() {
                    ContributionDetail::None
                } else {
                    ContributionDetail::Constraints(constraints)
                }
            }
            _ => ContributionDetail::None,
        };
        Ok(Contribution {
            composition,
            target,
            detail,
        })
    }
}

/// Insert `contribution` keeping `into` contributions first and `extends`
/// right behind them; everything else keeps insertion order.
pub(crate) fn insert_ordered(list: &mut Vec<Contribution>, contribution: Contribution) {
    match contribution.composition {
        Composition::Into | Composition::Extends => {
            let at = list
                .iter()
                .position(|c| c.composition != Composition::Into)
                .unwrap_or(list.len());
            list.insert(at, contribution);
        }
        _ => list.push(contribution),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ConstantId {
        ConstantId::new(n)
    }

    #[test]
    fn into_and_extends_go_first() {
        let mut list = Vec::new();
        insert_ordered(&mut list, Contribution::new(Composition::Implements, id(1)));
        insert_ordered(&mut list, Contribution::new(Composition::Extends, id(2)));
        insert_ordered(&mut list, Contribution::new(Composition::Into, id(3)));
        insert_ordered(&mut list, Contribution::new(Composition::Implements, id(4)));

        let order: Vec<Composition> = list.iter().map(|c| c.composition()).collect();
        assert_eq!(
            order,
            vec![
                Composition::Into,
                Composition::Extends,
                Composition::Implements,
                Composition::Implements
            ]
        );
        assert_eq!(list[3].type_constant(), id(4));
    }

    #[test]
    fn constants_cover_the_detail() {
        let c = Contribution::incorporates(
            id(1),
            vec![
                IncorporateConstraint {
                    name: id(2),
                    constraint: Some(id(3)),
                },
                IncorporateConstraint {
                    name: id(4),
                    constraint: None,
                },
            ],
        );
        assert!(c.is_conditional_incorporate());
        assert_eq!(c.constants(), vec![id(1), id(2), id(3), id(4)]);

        let shifted = c
            .try_map_constants(&mut |r| Ok::<_, ()>(ConstantId::new(r.index() + 10)))
            .unwrap();
        assert_eq!(shifted.type_constant(), id(11));
        assert_eq!(shifted.constraints()[0].constraint, Some(id(13)));
        assert!(!Contribution::incorporates(id(1), vec![]).is_conditional_incorporate());
    }

    #[test]
    fn unknown_composition_is_rejected() {
        let pool = ConstantPool::default();
        let err = Contribution::read(&mut ByteReader::new(&[12, 0]), &pool).unwrap_err();
        assert!(matches!(err, FormatError::UnknownComposition { ordinal: 12, .. }));
    }
}
