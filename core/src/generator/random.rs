use super::*;

/// Deals `pair_count` images from the pack, each twice, in a uniformly shuffled order.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomBoardGenerator {
    seed: u64,
}

impl RandomBoardGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl BoardGenerator for RandomBoardGenerator {
    fn generate(self, config: &GameConfig) -> Vec<Card> {
        use rand::prelude::*;

        let available = config.card_pack.len().min(GameConfig::MAX_PAIRS);
        let pairs = if config.pair_count > available {
            log::warn!(
                "Card pack {:?} too small, requested {} pairs but only has {}",
                config.card_pack.name,
                config.pair_count,
                available
            );
            available
        } else {
            config.pair_count
        };

        let mut rng = SmallRng::seed_from_u64(self.seed);

        // pick which images take part when the pack is larger than the board
        let mut pool: Vec<&ImageId> = config.card_pack.images().iter().collect();
        for i in 0..usize::from(pairs) {
            let j = rng.random_range(i..pool.len());
            pool.swap(i, j);
        }
        pool.truncate(pairs.into());

        let mut images: Vec<&ImageId> = pool.iter().flat_map(|&image| [image, image]).collect();

        // Fisher-Yates
        for i in (1..images.len()).rev() {
            let j = rng.random_range(0..=i);
            images.swap(i, j);
        }

        let cards: Vec<Card> = images
            .into_iter()
            .enumerate()
            .map(|(slot, image)| Card::new(slot.try_into().unwrap_or(CardId::MAX), image.clone()))
            .collect();
        log::debug!("Dealt {} cards from pack {:?}", cards.len(), config.card_pack.name);
        cards
    }
}
