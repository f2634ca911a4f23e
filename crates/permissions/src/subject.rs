use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Whoever is running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Player(u128),
    Console,
}

impl Subject {
    pub fn player_id(&self) -> Option<u128> {
        match self {
            Subject::Player(uuid) => Some(*uuid),
            Subject::Console => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Subject::Player(_))
    }

    /// Server-side actors that outrank every player in level comparisons.
    pub fn is_system(&self) -> bool {
        matches!(self, Subject::Console)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Player(uuid) => write!(f, "player {}", HyphenatedUuid(*uuid)),
            Subject::Console => f.write_str("console"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HyphenatedUuid(pub u128);

impl fmt::Display for HyphenatedUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hex = format!("{:032x}", self.0);
        hex.insert(8, '-');
        hex.insert(13, '-');
        hex.insert(18, '-');
        hex.insert(23, '-');
        f.write_str(&hex)
    }
}

impl FromStr for HyphenatedUuid {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.replace('-', "");
        Ok(HyphenatedUuid(u128::from_str_radix(&hex, 16)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_uuid_display() {
        let uuid = HyphenatedUuid(0x0123456789abcdef0123456789abcdef);
        assert_eq!(uuid.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(uuid.to_string().parse::<HyphenatedUuid>().unwrap(), uuid);
    }

    #[test]
    fn console_is_system() {
        assert!(Subject::Console.is_system());
        assert!(!Subject::Player(1).is_system());
        assert_eq!(Subject::Player(7).player_id(), Some(7));
    }
}
