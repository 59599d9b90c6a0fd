use crate::*;
pub use random::*;

mod random;

pub trait BoardGenerator {
    fn generate(self, config: &GameConfig) -> Vec<Card>;
}

/// Generator that lays out images exactly in the given order, mostly useful for tests and replays.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedBoardGenerator {
    images: Vec<ImageId>,
}

impl FixedBoardGenerator {
    pub fn new(images: impl IntoIterator<Item = impl Into<ImageId>>) -> Self {
        Self {
            images: images.into_iter().map(Into::into).collect(),
        }
    }
}

impl BoardGenerator for FixedBoardGenerator {
    fn generate(self, _config: &GameConfig) -> Vec<Card> {
        self.images
            .into_iter()
            .enumerate()
            .map(|(slot, image)| Card::new(slot.try_into().unwrap_or(CardId::MAX), image))
            .collect()
    }
}

/// Source of fresh boards for resets, owned by a controller.
#[derive(Clone, Debug)]
pub struct Dealer {
    rng: rand::rngs::SmallRng,
}

impl Dealer {
    pub fn new(seed: u64) -> Self {
        use rand::prelude::*;

        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seeds from the wall clock when no seed is configured.
    pub fn from_config(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(clock_seed))
    }

    pub fn next_seed(&mut self) -> u64 {
        use rand::prelude::*;

        self.rng.random_range(0..u64::MAX)
    }

    pub fn deal(&mut self, config: &GameConfig) -> Vec<Card> {
        RandomBoardGenerator::new(self.next_seed()).generate(config)
    }
}

fn clock_seed() -> u64 {
    use web_time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
