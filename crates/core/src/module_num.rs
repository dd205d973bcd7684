//! Curriculum module numbers.

use serde::{Deserialize, Serialize};

/// Number of modules in the curriculum.
pub const MODULE_COUNT: u8 = 5;

/// A validated module number in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ModuleNum(u8);

impl ModuleNum {
    /// Every module, in curriculum order.
    pub const ALL: [ModuleNum; MODULE_COUNT as usize] =
        [ModuleNum(1), ModuleNum(2), ModuleNum(3), ModuleNum(4), ModuleNum(5)];

    /// Create from a raw number, rejecting anything outside `1..=5`.
    pub fn new(n: u8) -> Option<Self> {
        (1..=MODULE_COUNT).contains(&n).then_some(Self(n))
    }

    /// The first module, unlocked by construction.
    pub const fn first() -> Self {
        Self(1)
    }

    /// The final module, which carries the certificate.
    pub const fn last() -> Self {
        Self(MODULE_COUNT)
    }

    /// Raw module number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The module gated by this one, if any.
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// The module gating this one, if any.
    pub fn prev(self) -> Option<Self> {
        Self::new(self.0.checked_sub(1)?)
    }

    /// All modules in curriculum order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter()
    }
}

impl TryFrom<u8> for ModuleNum {
    type Error = InvalidModuleNum;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n).ok_or(InvalidModuleNum(n as i64))
    }
}

impl From<ModuleNum> for u8 {
    fn from(n: ModuleNum) -> Self {
        n.0
    }
}

impl std::fmt::Display for ModuleNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ModuleNum {
    type Err = InvalidModuleNum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s.trim().parse().map_err(|_| InvalidModuleNum(0))?;
        u8::try_from(n)
            .ok()
            .and_then(Self::new)
            .ok_or(InvalidModuleNum(n))
    }
}

/// A module number outside `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid module number {0}, must be between 1 and 5")]
pub struct InvalidModuleNum(pub i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(ModuleNum::new(0).is_none());
        assert!(ModuleNum::new(6).is_none());
        assert_eq!(ModuleNum::new(3).map(ModuleNum::get), Some(3));
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(ModuleNum::first().prev(), None);
        assert_eq!(ModuleNum::first().next(), ModuleNum::new(2));
        assert_eq!(ModuleNum::new(5).and_then(ModuleNum::next), None);
        assert_eq!(ModuleNum::all().count(), 5);
    }

    #[test]
    fn test_parse() {
        assert_eq!("4".parse::<ModuleNum>(), Ok(ModuleNum(4)));
        assert_eq!("9".parse::<ModuleNum>(), Err(InvalidModuleNum(9)));
        assert!("abc".parse::<ModuleNum>().is_err());
        assert!(serde_json::from_str::<ModuleNum>("7").is_err());
    }
}
