use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Alert priority; `P1` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    P5,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
            Self::P5 => "P5",
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            "P4" => Ok(Self::P4),
            "P5" => Ok(Self::P5),
            other => Err(DomainError::InvalidPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_priorities() {
        assert_eq!("P1".parse::<Priority>(), Ok(Priority::P1));
        assert_eq!("P5".parse::<Priority>(), Ok(Priority::P5));
    }

    #[test]
    fn rejects_lowercase_and_unknown() {
        assert_eq!(
            "p1".parse::<Priority>(),
            Err(DomainError::InvalidPriority("p1".into()))
        );
        assert!("P6".parse::<Priority>().is_err());
    }

    #[test]
    fn p1_sorts_first() {
        assert!(Priority::P1 < Priority::P2);
    }
}
