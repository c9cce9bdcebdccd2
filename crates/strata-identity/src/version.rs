// version.rs
//
// Module version labels: dot-delimited integer parts with an optional
// pre-release category and an optional "+build" suffix.
//
// Pre-release categories are encoded as negative parts so that ordering and
// substitutability can be computed over a single integer list:
//   ci = -6, dev = -5, qc = -4, alpha = -3, beta = -2, rc = -1

#![allow(unused_assignments)]

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use miette::Diagnostic;
use smallvec::SmallVec;
use thiserror::Error;

/// Inline storage for version parts; most versions have four parts or fewer.
pub type VersionParts = SmallVec<[i32; 4]>;

const PRE_RELEASE: [&str; 6] = ["ci", "dev", "qc", "alpha", "beta", "rc"];

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("illegal version: {literal}")]
    #[diagnostic(code(V0001), help("expected e.g. \"1.2.3\", \"2.0-beta1\" or \"1.0+build.7\""))]
    Illegal { literal: String },
}

/// A version label such as `1.2.3`, `2.0-rc2` or `1.0+nightly`.
///
/// Equality and ordering are defined over the parsed parts and build suffix, not
/// over the literal text, so `1.2-beta` and `1.2.beta` compare equal.
#[derive(Debug, Clone)]
pub struct Version {
    literal: Box<str>,
    parts: VersionParts,
    build: Option<Box<str>>,
}

impl Version {
    /// Parse a version literal.
    pub fn parse(literal: &str) -> Result<Self, VersionError> {
        let illegal = || VersionError::Illegal {
            literal: literal.to_string(),
        };

        let bytes = literal.as_bytes();
        let len = bytes.len();
        let mut ix = 0;
        let mut parts = VersionParts::new();

        while ix < len && bytes[ix].is_ascii_digit() {
            let (n, next) = read_number(bytes, ix).ok_or_else(illegal)?;
            parts.push(n);
            ix = next;

            if ix == len {
                break;
            }

            match bytes[ix] {
                b'.' => ix += 1,
                b'-' => {
                    ix += 1;
                    break;
                }
                b'+' => break,
                _ => return Err(illegal()),
            }
        }

        if ix < len && bytes[ix] != b'+' {
            let (part, name) = match bytes[ix].to_ascii_lowercase() {
                b'c' => (-6, "ci"),
                b'd' => (-5, "dev"),
                b'q' => (-4, "qc"),
                b'a' => (-3, "alpha"),
                b'b' => (-2, "beta"),
                b'r' => (-1, "rc"),
                _ => return Err(illegal()),
            };

            let matches = literal
                .get(ix..ix + name.len())
                .is_some_and(|s| s.eq_ignore_ascii_case(name));
            if !matches {
                return Err(illegal());
            }
            parts.push(part);
            ix += name.len();

            if ix < len && bytes[ix] == b'.' {
                ix += 1;
            }
            if ix < len && bytes[ix].is_ascii_digit() {
                let (n, next) = read_number(bytes, ix).ok_or_else(illegal)?;
                parts.push(n);
                ix = next;
            }
        }

        let mut build = None;
        if ix < len {
            if bytes[ix] != b'+' {
                return Err(illegal());
            }
            build = Some(literal[ix + 1..].into());
        }

        if parts.is_empty() {
            return Err(illegal());
        }

        Ok(Self {
            literal: literal.into(),
            parts,
            build,
        })
    }

    /// Build a version from raw parts, validating the pre-release placement rules:
    /// a pre-release part must be the last part, or the second to last followed by
    /// a non-negative part, and must not follow a zero part.
    pub fn from_parts(parts: &[i32], build: Option<&str>) -> Result<Self, VersionError> {
        let mut err = parts.is_empty();
        for (i, &part) in parts.iter().enumerate() {
            if part >= 0 {
                continue;
            }
            if part < -(PRE_RELEASE.len() as i32) {
                err = true;
                continue;
            }
            match parts.len() - i {
                1 => {}
                2 => err |= parts[i + 1] < 0,
                _ => err = true,
            }
            if i > 0 && parts[i - 1] == 0 {
                err = true;
            }
        }

        let version = Self::render(parts, build);
        if err {
            return Err(VersionError::Illegal {
                literal: version.literal.into_string(),
            });
        }
        Ok(version)
    }

    fn render(parts: &[i32], build: Option<&str>) -> Self {
        let mut sb = String::new();
        let mut ga = true;
        for (i, &part) in parts.iter().enumerate() {
            if part >= 0 {
                if i > 0 && ga {
                    sb.push('.');
                }
                sb.push_str(&part.to_string());
            } else if let Some(name) = pre_release_name(part) {
                ga = false;
                if i > 0 {
                    sb.push('-');
                }
                sb.push_str(name);
            } else {
                sb.push_str(&format!(".illegal({i})"));
            }
        }

        let build = build.filter(|b| !b.is_empty());
        if let Some(build) = build {
            sb.push('+');
            sb.push_str(build);
        }

        Self {
            literal: sb.into_boxed_str(),
            parts: parts.iter().copied().collect(),
            build: build.map(Into::into),
        }
    }

    pub fn parts(&self) -> &[i32] {
        &self.parts
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// True iff no part is a pre-release marker.
    pub fn is_ga(&self) -> bool {
        self.parts.iter().all(|&p| p >= 0)
    }

    /// The first pre-release marker (-6..=-1), or 0 for a GA release.
    pub fn release_category(&self) -> i32 {
        self.parts.iter().copied().find(|&p| p < 0).unwrap_or(0)
    }

    pub fn release_category_name(&self) -> &'static str {
        pre_release_name(self.release_category()).unwrap_or("ga")
    }

    /// Drop trailing zero parts: `1.2.0.0` normalizes to `1.2`.
    pub fn normalize(&self) -> Version {
        let zeros = self
            .parts
            .iter()
            .skip(1)
            .rev()
            .take_while(|&&p| p == 0)
            .count();
        if zeros == 0 {
            return self.clone();
        }
        Self::render(&self.parts[..self.parts.len() - zeros], self.build())
    }

    /// Determine whether this version is the same as `that` or derives from it.
    ///
    /// `1.2`, `1.2.1`, `1.2.1.7` and `1.3` are all substitutable for `1.2`, but
    /// `2.0` is not; only `1.2`, `1.2.1` and `1.2.1.7` are substitutable for `1.2.0`.
    /// A GA release substitutes for a pre-release of the same version, never the
    /// other way around.
    pub fn is_substitutable_for(&self, that: &Version) -> bool {
        if self == that {
            return true;
        }

        let this_ints = &self.parts;
        let that_ints = &that.parts;
        let c_this = this_ints.len();
        let c_that = that_ints.len();
        let c_this_ga = ga_len(this_ints);
        let c_that_ga = ga_len(that_ints);

        let last_ga = c_this_ga.min(c_that_ga);
        if last_ga > 0 {
            let last = last_ga - 1;
            if this_ints[..last] != that_ints[..last] {
                return false;
            }
            match this_ints[last].cmp(&that_ints[last]) {
                Ordering::Less => return false,
                Ordering::Greater => return c_this_ga >= c_that_ga,
                Ordering::Equal => {}
            }
        }

        // all shared GA digits are identical; look at the unshared ones
        if c_this_ga > c_that_ga {
            if this_ints[c_that_ga..c_this_ga].iter().any(|&p| p > 0) {
                return true;
            }
        } else if c_this_ga < c_that_ga && that_ints[c_this_ga..c_that_ga].iter().any(|&p| p > 0) {
            return false;
        }

        let this_is_ga = c_this == c_this_ga;
        let that_is_ga = c_that == c_that_ga;
        if this_is_ga != that_is_ga {
            return this_is_ga;
        }

        if !this_is_ga {
            let this_pre = &this_ints[c_this_ga..];
            let that_pre = &that_ints[c_that_ga..];
            for (a, b) in this_pre.iter().zip(that_pre.iter()) {
                match a.cmp(b) {
                    Ordering::Less => return false,
                    Ordering::Greater => return true,
                    Ordering::Equal => {}
                }
            }
            if this_pre.len() != that_pre.len() {
                return this_pre.len() > that_pre.len();
            }
        }

        true
    }

    /// True iff the versions differ at most by trailing zero parts.
    pub fn is_same_as(&self, that: &Version) -> bool {
        if self == that {
            return true;
        }

        let shared = self.parts.len().min(that.parts.len());
        if self.parts[..shared] != that.parts[..shared] {
            return false;
        }

        let remaining = if self.parts.len() > that.parts.len() {
            &self.parts[shared..]
        } else {
            &that.parts[shared..]
        };
        remaining.iter().all(|&p| p == 0)
    }
}

fn read_number(bytes: &[u8], mut ix: usize) -> Option<(i32, usize)> {
    let mut n: i32 = 0;
    while ix < bytes.len() && bytes[ix].is_ascii_digit() {
        n = n.checked_mul(10)?.checked_add((bytes[ix] - b'0') as i32)?;
        ix += 1;
    }
    Some((n, ix))
}

fn pre_release_name(part: i32) -> Option<&'static str> {
    let idx = part + PRE_RELEASE.len() as i32;
    (part < 0 && idx >= 0).then(|| PRE_RELEASE[idx as usize])
}

/// Number of leading GA parts (a pre-release marker sits last or second to last).
fn ga_len(parts: &[i32]) -> usize {
    let c = parts.len();
    if parts[c - 1] < 0 {
        c - 1
    } else if c >= 2 && parts[c - 2] < 0 {
        c - 2
    } else {
        c
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts && self.build == other.build
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
        self.build.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            if a != b {
                return a.cmp(b);
            }
        }
        self.parts
            .len()
            .cmp(&other.parts.len())
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_plain_versions() {
        assert_eq!(v("1.2.3").parts(), &[1, 2, 3]);
        assert_eq!(v("10").parts(), &[10]);
        assert!(v("1.2.3").is_ga());
    }

    #[test]
    fn parses_pre_release_and_build() {
        let beta = v("1.2-beta2");
        assert_eq!(beta.parts(), &[1, 2, -2, 2]);
        assert_eq!(beta.release_category_name(), "beta");
        assert!(!beta.is_ga());

        let built = v("2.0+nightly.7");
        assert_eq!(built.build(), Some("nightly.7"));
        assert_eq!(built.parts(), &[2, 0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x").is_err());
        assert!(Version::parse("1.2-gamma").is_err());
        assert!(Version::parse("99999999999").is_err());
    }

    #[test]
    fn from_parts_renders_literal() {
        let ver = Version::from_parts(&[1, 2, -1, 3], None).unwrap();
        assert_eq!(ver.to_string(), "1.2-rc3");
        assert!(Version::from_parts(&[1, 0, -2], None).is_err());
        assert!(Version::from_parts(&[-2, 1, 1], None).is_err());
    }

    #[test]
    fn normalize_strips_trailing_zeros() {
        assert_eq!(v("1.2.0.0").normalize().to_string(), "1.2");
        assert_eq!(v("1.0").normalize().to_string(), "1");
        assert_eq!(v("0").normalize().to_string(), "0");
    }

    #[test]
    fn substitutability_follows_derivation() {
        let base = v("1.2");
        for ok in ["1.2", "1.2.1", "1.2.1.7", "1.3"] {
            assert!(v(ok).is_substitutable_for(&base), "{ok} should sub for 1.2");
        }
        for bad in ["2.0", "2.1", "1.1"] {
            assert!(!v(bad).is_substitutable_for(&base), "{bad} should not sub for 1.2");
        }

        let pinned = v("1.2.0");
        assert!(v("1.2.1").is_substitutable_for(&pinned));
        assert!(!v("1.3").is_substitutable_for(&pinned));
    }

    #[test]
    fn ga_substitutes_for_pre_release() {
        assert!(v("1.2").is_substitutable_for(&v("1.2-beta")));
        assert!(!v("1.2-beta").is_substitutable_for(&v("1.2")));
        assert!(v("1.2-rc").is_substitutable_for(&v("1.2-beta")));
        assert!(v("1.2-beta3").is_substitutable_for(&v("1.2-beta")));
    }

    #[test]
    fn same_as_ignores_trailing_zeros() {
        assert!(v("1.2").is_same_as(&v("1.2.0.0")));
        assert!(v("1.2.0").is_same_as(&v("1.2")));
        assert!(!v("1.2").is_same_as(&v("1.2.1")));
    }

    #[test]
    fn ordering_is_part_wise() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("1.2") < v("1.2.1"));
        assert!(v("2") > v("1.9.9"));
        assert_eq!(v("1.2-beta"), v("1.2.beta"));
    }
}
