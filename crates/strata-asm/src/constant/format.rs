// src/constant/format.rs
//
// One-byte tags that prefix every constant record in a serialized pool.

macro_rules! define_constant_formats {
    ($($variant:ident = $tag:literal => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum ConstantFormat {
            $($variant = $tag,)*
        }

        impl ConstantFormat {
            pub fn from_tag(tag: u8) -> Option<ConstantFormat> {
                match tag {
                    $($tag => Some(ConstantFormat::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ConstantFormat::$variant => $name,)*
                }
            }
        }
    };
}

define_constant_formats! {
    Int = 0x01 => "Int",
    Byte = 0x02 => "Byte",
    Char = 0x03 => "Char",
    String = 0x04 => "String",
    IntLiteral = 0x05 => "IntLiteral",
    FPLiteral = 0x06 => "FPLiteral",
    Version = 0x07 => "Version",

    Module = 0x10 => "Module",
    Package = 0x11 => "Package",
    Class = 0x12 => "Class",
    Typedef = 0x13 => "Typedef",
    Property = 0x14 => "Property",
    MultiMethod = 0x15 => "MultiMethod",
    Method = 0x16 => "Method",
    Signature = 0x17 => "Signature",

    UnresolvedName = 0x20 => "UnresolvedName",
    NativeClass = 0x21 => "NativeClass",
    ThisClass = 0x22 => "ThisClass",
    ParentClass = 0x23 => "ParentClass",
    ChildClass = 0x24 => "ChildClass",

    TerminalType = 0x30 => "TerminalType",
    ImmutableType = 0x31 => "ImmutableType",
    AccessType = 0x32 => "AccessType",
    AnnotatedType = 0x33 => "AnnotatedType",
    ParameterizedType = 0x34 => "ParameterizedType",
    VirtualChildType = 0x35 => "VirtualChildType",
    UnionType = 0x36 => "UnionType",
    IntersectionType = 0x37 => "IntersectionType",
    DifferenceType = 0x38 => "DifferenceType",
    Annotation = 0x39 => "Annotation",

    ConditionNot = 0x40 => "ConditionNot",
    ConditionAll = 0x41 => "ConditionAll",
    ConditionAny = 0x42 => "ConditionAny",
    ConditionNamed = 0x43 => "ConditionNamed",
    ConditionPresent = 0x44 => "ConditionPresent",
    ConditionVersionMatches = 0x45 => "ConditionVersionMatches",
    ConditionVersioned = 0x46 => "ConditionVersioned",
}

impl ConstantFormat {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for tag in 0..=u8::MAX {
            if let Some(format) = ConstantFormat::from_tag(tag) {
                assert_eq!(format.tag(), tag);
            }
        }
        assert_eq!(ConstantFormat::from_tag(0x00), None);
        assert_eq!(ConstantFormat::from_tag(0x39), Some(ConstantFormat::Annotation));
    }
}
