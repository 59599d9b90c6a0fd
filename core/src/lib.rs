use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

pub use card::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use intent::*;
pub use local::*;
pub use reconcile::*;
pub use timer::*;
pub use types::*;

mod card;
mod engine;
mod error;
mod generator;
mod intent;
mod local;
mod reconcile;
mod timer;
mod types;

const ANIMALS: [&str; 12] = [
    "lion", "tiger", "bear", "wolf", "fox", "owl", "panda", "koala", "zebra", "otter", "eagle",
    "shark",
];

/// Named set of images a board is dealt from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PackRecord")]
pub struct CardPack {
    pub name: String,
    images: Vec<ImageId>,
}

/// Decoded packs go through [`CardPack::new`] like every other pack.
#[derive(Deserialize)]
struct PackRecord {
    name: String,
    images: Vec<ImageId>,
}

impl TryFrom<PackRecord> for CardPack {
    type Error = GameError;

    fn try_from(record: PackRecord) -> Result<Self> {
        Self::new(record.name, record.images)
    }
}

impl CardPack {
    /// Builds a pack, dropping repeated image ids so every image can form exactly one pair.
    pub fn new(name: impl Into<String>, images: impl IntoIterator<Item = impl Into<ImageId>>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        let mut unique: Vec<ImageId> = Vec::new();
        for image in images {
            let image = image.into();
            if !seen.insert(image.clone()) {
                log::debug!("Dropping repeated image {image:?} from pack {name:?}");
                continue;
            }
            unique.push(image);
        }
        if unique.is_empty() {
            return Err(GameError::EmptyPack(name));
        }
        Ok(Self {
            name,
            images: unique,
        })
    }

    pub fn animals() -> Self {
        Self {
            name: "animals".into(),
            images: ANIMALS.iter().map(|&image| image.into()).collect(),
        }
    }

    pub fn images(&self) -> &[ImageId] {
        &self.images
    }

    pub fn len(&self) -> PairCount {
        self.images.len().try_into().unwrap_or(PairCount::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl Default for CardPack {
    fn default() -> Self {
        Self::animals()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ConfigRecord")]
pub struct GameConfig {
    pub pair_count: PairCount,
    pub card_pack: CardPack,
    pub first_player: PlayerId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigRecord {
    pair_count: PairCount,
    card_pack: CardPack,
    first_player: PlayerId,
}

impl From<ConfigRecord> for GameConfig {
    fn from(record: ConfigRecord) -> Self {
        Self::new(record.pair_count, record.card_pack, record.first_player)
    }
}

impl GameConfig {
    pub const DEFAULT_PAIRS: PairCount = 8;
    /// Largest board whose card ids still fit in a [`CardId`].
    pub const MAX_PAIRS: PairCount = CardId::MAX / 2;

    /// Clamps the pair count into what the pack can supply.
    pub fn new(pair_count: PairCount, card_pack: CardPack, first_player: PlayerId) -> Self {
        let pair_count = pair_count.clamp(1, card_pack.len().clamp(1, Self::MAX_PAIRS));
        Self {
            pair_count,
            card_pack,
            first_player,
        }
    }

    pub const fn total_cards(&self) -> usize {
        self.pair_count as usize * 2
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAIRS, CardPack::animals(), PlayerId::One)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    NoChange,
    Flipped,
    Matched((CardId, CardId)),
    Mismatched((CardId, CardId)),
    Won,
}

impl FlipOutcome {
    pub const fn has_update(&self) -> bool {
        use FlipOutcome::*;
        match self {
            NoChange => false,
            Flipped => true,
            Matched(_) => true,
            Mismatched(_) => true,
            Won => true,
        }
    }

    /// Cards the caller must turn back down after the mismatch delay.
    pub const fn pending_unflip(&self) -> Option<(CardId, CardId)> {
        match self {
            Self::Mismatched(pair) => Some(*pair),
            _ => None,
        }
    }
}
