use std::fmt;
use std::str::FromStr;

use crate::error::BuildError;

/// Orientation in which an encoded sequence is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadMode {
    #[default]
    Forward,
    Reverse,
    Complement,
    ReverseComplement,
}

impl ReadMode {
    /// All four orientations
    pub const ALL: [ReadMode; 4] = [
        ReadMode::Forward,
        ReadMode::Reverse,
        ReadMode::Complement,
        ReadMode::ReverseComplement,
    ];

    #[inline]
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse | Self::ReverseComplement)
    }

    #[inline]
    #[must_use]
    pub fn is_complement(self) -> bool {
        matches!(self, Self::Complement | Self::ReverseComplement)
    }

    /// Short name of the mode
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "fwd",
            Self::Reverse => "rev",
            Self::Complement => "cpl",
            Self::ReverseComplement => "rcl",
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReadMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| BuildError::UnknownReadMode(s.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_names() {
        let flags = ReadMode::ALL.map(|mode| (mode.is_reverse(), mode.is_complement()));
        assert_eq!(flags, [(false, false), (true, false), (false, true), (true, true)]);
        for mode in ReadMode::ALL {
            assert_eq!(mode.name().parse::<ReadMode>().ok(), Some(mode));
        }
        assert!("xyz".parse::<ReadMode>().is_err());
    }
}
