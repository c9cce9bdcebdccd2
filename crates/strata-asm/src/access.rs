// src/access.rs

/// Visibility of a component, ordered from most to least visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Access {
    Public = 1,
    Protected = 2,
    Private = 3,
}

impl Access {
    pub fn from_bits(bits: u8) -> Option<Access> {
        match bits {
            1 => Some(Access::Public),
            2 => Some(Access::Protected),
            3 => Some(Access::Private),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Whether something declared with `declared` access is visible from a
    /// context that has `self` access.
    pub fn can_see(self, declared: Access) -> bool {
        declared <= self
    }

    /// The more visible of the two.
    pub fn most_visible(self, other: Access) -> Access {
        self.min(other)
    }

    /// The less visible of the two.
    pub fn least_visible(self, other: Access) -> Access {
        self.max(other)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_context_sees_everything() {
        assert!(Access::Private.can_see(Access::Public));
        assert!(Access::Private.can_see(Access::Private));
        assert!(Access::Protected.can_see(Access::Protected));
        assert!(!Access::Public.can_see(Access::Protected));
    }

    #[test]
    fn narrowing_picks_the_more_visible() {
        assert_eq!(Access::Private.most_visible(Access::Protected), Access::Protected);
        assert_eq!(Access::Public.least_visible(Access::Protected), Access::Protected);
        assert_eq!(Access::from_bits(0), None);
        assert_eq!(Access::from_bits(2), Some(Access::Protected));
    }
}
