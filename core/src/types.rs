use core::fmt;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::GameError;

/// Stable identifier of a board slot, equal to its index in the layout.
pub type CardId = u16;

/// Count type used for pair and match tallies.
pub type PairCount = u16;

/// Image shared by exactly two cards of a board.
pub type ImageId = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerId {
    One,
    Two,
}

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::One, PlayerId::Two];

    pub const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::One
    }
}

impl From<PlayerId> for u8 {
    fn from(id: PlayerId) -> Self {
        id.number()
    }
}

impl TryFrom<u8> for PlayerId {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(GameError::InvalidPlayer(other)),
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.number().fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
}

impl Player {
    pub fn default_for(id: PlayerId) -> Self {
        let (name, color) = match id {
            PlayerId::One => ("Player 1", "#e4572e"),
            PlayerId::Two => ("Player 2", "#2e86ab"),
        };
        Self {
            id,
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Match counts derived from card ownership, never stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Scores {
    pub one: PairCount,
    pub two: PairCount,
}

impl Scores {
    pub const fn of(&self, player: PlayerId) -> PairCount {
        match player {
            PlayerId::One => self.one,
            PlayerId::Two => self.two,
        }
    }

    pub const fn total(&self) -> PairCount {
        self.one.saturating_add(self.two)
    }

    pub const fn result(&self) -> GameResult {
        if self.one > self.two {
            GameResult::Winner(PlayerId::One)
        } else if self.two > self.one {
            GameResult::Winner(PlayerId::Two)
        } else {
            GameResult::Tie
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameResult {
    Winner(PlayerId),
    Tie,
}

impl GameResult {
    /// Players reported as winners, both of them on a tie.
    pub fn winners(self) -> SmallVec<[PlayerId; 2]> {
        match self {
            Self::Winner(id) => smallvec![id],
            Self::Tie => smallvec![PlayerId::One, PlayerId::Two],
        }
    }

    pub const fn is_tie(self) -> bool {
        matches!(self, Self::Tie)
    }
}
