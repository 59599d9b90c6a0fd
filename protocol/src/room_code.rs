use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

pub const ROOM_CODE_LEN: usize = 6;
/// Uppercase letters and digits without the easily confused `0 O 1 I L`.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub fn is_valid_room_code(value: &str) -> bool {
    RoomCode::parse(value).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Accepts lowercase input, codes are read aloud and typed by hand.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let value = value.trim().to_ascii_uppercase();
        let found = value.chars().count();
        if found != ROOM_CODE_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: ROOM_CODE_LEN,
                found,
            });
        }
        for (index, ch) in value.chars().enumerate() {
            if !ROOM_CODE_ALPHABET.contains(ch) {
                return Err(ProtocolError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(value))
    }

    pub fn generate(seed: u64) -> Self {
        use rand::prelude::*;

        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let mut rng = SmallRng::seed_from_u64(seed);
        let code = (0..ROOM_CODE_LEN)
            .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for seed in 0..50 {
            let code = RoomCode::generate(seed);
            assert!(is_valid_room_code(code.as_str()), "{code}");
        }
    }

    #[test]
    fn parse_normalizes_case() {
        assert_eq!(RoomCode::parse(" abc234 ").unwrap().as_str(), "ABC234");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            RoomCode::parse("ABC"),
            Err(ProtocolError::InvalidLength { expected: 6, found: 3 })
        ));
        assert!(matches!(
            RoomCode::parse("ABCDE0"),
            Err(ProtocolError::InvalidCharacter { ch: '0', index: 5 })
        ));
    }
}
