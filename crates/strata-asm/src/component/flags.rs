// src/component/flags.rs
//
// The 16-bit flags word that starts every component body.
//
//   0x000F  format
//   0x0300  access (01 public, 10 protected, 11 private)
//   0x0400  abstract
//   0x0800  static
//   0x1000  synthetic
//   0x2000  conditional return
//   0x4000  auxiliary
//
// The top bit stays clear: a leading byte with 0x80 set introduces a
// conditional sibling chain instead of a flags word.

use crate::access::Access;
use crate::errors::FormatError;
use crate::errors::format::at;

/// Format of a component, stored in the low four bits of its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    Interface = 0,
    Class = 1,
    Const = 2,
    Enum = 3,
    EnumValue = 4,
    Mixin = 5,
    Service = 6,
    Package = 7,
    Module = 8,
    Typedef = 9,
    Property = 10,
    Method = 11,
    MultiMethod = 14,
    File = 15,
}

impl Format {
    pub fn from_bits(bits: u8) -> Option<Format> {
        Some(match bits {
            0 => Format::Interface,
            1 => Format::Class,
            2 => Format::Const,
            3 => Format::Enum,
            4 => Format::EnumValue,
            5 => Format::Mixin,
            6 => Format::Service,
            7 => Format::Package,
            8 => Format::Module,
            9 => Format::Typedef,
            10 => Format::Property,
            11 => Format::Method,
            14 => Format::MultiMethod,
            15 => Format::File,
            _ => return None,
        })
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Interface => "interface",
            Format::Class => "class",
            Format::Const => "const",
            Format::Enum => "enum",
            Format::EnumValue => "enum value",
            Format::Mixin => "mixin",
            Format::Service => "service",
            Format::Package => "package",
            Format::Module => "module",
            Format::Typedef => "typedef",
            Format::Property => "property",
            Format::Method => "method",
            Format::MultiMethod => "multi-method",
            Format::File => "file",
        }
    }

    /// Formats whose component is a class structure (modules and packages are
    /// classes too).
    pub fn is_class(self) -> bool {
        matches!(
            self,
            Format::Interface
                | Format::Class
                | Format::Const
                | Format::Enum
                | Format::EnumValue
                | Format::Mixin
                | Format::Service
                | Format::Package
                | Format::Module
        )
    }

    /// Class formats that can be nested in another class.
    pub fn is_nested_class(self) -> bool {
        self.is_class() && !matches!(self, Format::Package | Format::Module)
    }

    /// Whether a class of this format may extend a class of format `sup`.
    pub fn is_extends_legal(self, sup: Format) -> bool {
        match self {
            Format::Class => sup == Format::Class,
            Format::Const | Format::Enum | Format::Package | Format::Module => {
                matches!(sup, Format::Const | Format::Class)
            }
            Format::EnumValue => sup == Format::Enum,
            Format::Mixin => sup == Format::Mixin,
            Format::Service => matches!(sup, Format::Service | Format::Class),
            _ => false,
        }
    }

    pub fn is_implicitly_static(self) -> bool {
        matches!(
            self,
            Format::Module | Format::Package | Format::Enum | Format::EnumValue
        )
    }

    /// Whether `this:class` style auto-narrowing types may refer to a class of
    /// this format.
    pub fn is_auto_narrowing_allowed(self) -> bool {
        matches!(
            self,
            Format::Mixin | Format::Interface | Format::Class | Format::Const | Format::Service
        )
    }

    /// Whether a component of this format may hold a child of format `child`.
    pub fn can_contain(self, child: Format) -> bool {
        match self {
            Format::File => child == Format::Module,
            Format::Module | Format::Package => {
                child == Format::Package
                    || child.is_nested_class()
                    || matches!(child, Format::Property | Format::MultiMethod | Format::Typedef)
            }
            Format::Interface
            | Format::Class
            | Format::Const
            | Format::Enum
            | Format::EnumValue
            | Format::Mixin
            | Format::Service
            | Format::Method => {
                child.is_nested_class()
                    || matches!(child, Format::Property | Format::MultiMethod | Format::Typedef)
            }
            Format::Property => {
                matches!(child, Format::Property | Format::MultiMethod | Format::Typedef)
                    || child.is_nested_class()
            }
            Format::MultiMethod => child == Format::Method,
            Format::Typedef => false,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Flags word of one component body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentFlags(u16);

impl ComponentFlags {
    pub const FORMAT_MASK: u16 = 0x000F;
    pub const ACCESS_MASK: u16 = 0x0300;
    pub const ACCESS_SHIFT: u16 = 8;
    pub const ABSTRACT: u16 = 0x0400;
    pub const STATIC: u16 = 0x0800;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const COND_RET: u16 = 0x2000;
    pub const AUXILIARY: u16 = 0x4000;

    /// Lead byte marking a conditional sibling chain.
    pub const CONDITIONAL_BIT: u8 = 0x80;

    const KNOWN: u16 = Self::FORMAT_MASK
        | Self::ACCESS_MASK
        | Self::ABSTRACT
        | Self::STATIC
        | Self::SYNTHETIC
        | Self::COND_RET
        | Self::AUXILIARY;

    pub fn new(format: Format, access: Access) -> Self {
        let mut bits = format.bits() as u16 | ((access.bits() as u16) << Self::ACCESS_SHIFT);
        if format.is_implicitly_static() {
            bits |= Self::STATIC;
        }
        Self(bits)
    }

    /// Decode a flags word read at `offset`. Reserved bits are dropped.
    pub fn from_bits(bits: u16, offset: usize) -> Result<Self, FormatError> {
        let format = (bits & Self::FORMAT_MASK) as u8;
        if Format::from_bits(format).is_none() {
            return Err(FormatError::UnknownComponentFormat {
                bits: format,
                span: (offset, 2).into(),
            });
        }
        let access = ((bits & Self::ACCESS_MASK) >> Self::ACCESS_SHIFT) as u8;
        if Access::from_bits(access).is_none() {
            return Err(FormatError::InvalidAccess { bits, span: at(offset) });
        }
        Ok(Self(bits & Self::KNOWN))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn format(self) -> Format {
        // from_bits and new only ever store a known format
        Format::from_bits((self.0 & Self::FORMAT_MASK) as u8).unwrap_or(Format::Class)
    }

    pub fn access(self) -> Access {
        Access::from_bits(((self.0 & Self::ACCESS_MASK) >> Self::ACCESS_SHIFT) as u8)
            .unwrap_or(Access::Public)
    }

    pub fn with_access(self, access: Access) -> Self {
        Self((self.0 & !Self::ACCESS_MASK) | ((access.bits() as u16) << Self::ACCESS_SHIFT))
    }

    pub fn is_abstract(self) -> bool {
        self.0 & Self::ABSTRACT != 0
    }

    pub fn is_static(self) -> bool {
        self.0 & Self::STATIC != 0
    }

    pub fn is_synthetic(self) -> bool {
        self.0 & Self::SYNTHETIC != 0
    }

    pub fn is_conditional_return(self) -> bool {
        self.0 & Self::COND_RET != 0
    }

    pub fn is_auxiliary(self) -> bool {
        self.0 & Self::AUXILIARY != 0
    }

    /// Set or clear one of the single-bit flags.
    pub fn set(&mut self, flag: u16, on: bool) {
        debug_assert!(flag.count_ones() == 1 && flag & !Self::KNOWN == 0);
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    pub fn with(mut self, flag: u16, on: bool) -> Self {
        self.set(flag, on);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_pack_format_and_access() {
        let flags = ComponentFlags::new(Format::Mixin, Access::Protected)
            .with(ComponentFlags::ABSTRACT, true);
        assert_eq!(flags.bits(), 0x0605);
        assert_eq!(flags.format(), Format::Mixin);
        assert_eq!(flags.access(), Access::Protected);
        assert!(flags.is_abstract());
        assert!(!flags.is_static());
        assert_eq!(ComponentFlags::from_bits(flags.bits(), 0).unwrap(), flags);
    }

    #[test]
    fn singleton_formats_are_static() {
        assert!(ComponentFlags::new(Format::Module, Access::Public).is_static());
        assert!(ComponentFlags::new(Format::EnumValue, Access::Public).is_static());
        assert!(!ComponentFlags::new(Format::Class, Access::Public).is_static());
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(matches!(
            ComponentFlags::from_bits(0x010C, 4),
            Err(FormatError::UnknownComponentFormat { bits: 12, .. })
        ));
        assert!(matches!(
            ComponentFlags::from_bits(0x0001, 0),
            Err(FormatError::InvalidAccess { .. })
        ));
    }

    #[test]
    fn extends_rules() {
        assert!(Format::Class.is_extends_legal(Format::Class));
        assert!(!Format::Class.is_extends_legal(Format::Mixin));
        assert!(Format::Enum.is_extends_legal(Format::Const));
        assert!(Format::EnumValue.is_extends_legal(Format::Enum));
        assert!(Format::Service.is_extends_legal(Format::Class));
        assert!(!Format::Interface.is_extends_legal(Format::Interface));
    }

    #[test]
    fn containment() {
        assert!(Format::File.can_contain(Format::Module));
        assert!(!Format::File.can_contain(Format::Class));
        assert!(Format::Module.can_contain(Format::Package));
        assert!(!Format::Class.can_contain(Format::Package));
        assert!(Format::MultiMethod.can_contain(Format::Method));
        assert!(!Format::Class.can_contain(Format::Method));
        assert!(!Format::Typedef.can_contain(Format::Property));
    }
}
