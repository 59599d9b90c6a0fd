use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Setup,
    Playing,
    Finished,
}

impl GameStatus {
    pub const fn is_setup(self) -> bool {
        matches!(self, Self::Setup)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        Self::Setup
    }
}

/// Pair of face-up cards still waiting for evaluation, never more than two.
pub type PendingCards = SmallVec<[CardId; 2]>;

/// Whole board plus turn bookkeeping.
///
/// `round` grows with every new board and `revision` with every accepted change,
/// which lets a receiver order snapshots it gets out of band.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    cards: Vec<Card>,
    current_player: PlayerId,
    game_status: GameStatus,
    players: [Player; 2],
    config: GameConfig,
    round: u32,
    revision: u64,
}

/// Pure form of [`GameState::flip`]: returns the next state, equal to the input when rejected.
pub fn apply_flip(state: &GameState, card_id: CardId) -> Result<(GameState, FlipOutcome)> {
    let mut next = state.clone();
    let outcome = next.flip(card_id)?;
    Ok((next, outcome))
}

impl GameState {
    pub fn new(config: GameConfig, cards: Vec<Card>) -> Self {
        Self {
            cards,
            current_player: config.first_player,
            game_status: GameStatus::Setup,
            players: PlayerId::ALL.map(Player::default_for),
            config,
            round: 0,
            revision: 0,
        }
    }

    pub fn deal(config: GameConfig, generator: impl BoardGenerator) -> Self {
        let cards = generator.generate(&config);
        Self::new(config, cards)
    }

    /// Fresh board for the next round, keeping player names and colors.
    pub fn next_round(&self, config: GameConfig, cards: Vec<Card>) -> Self {
        Self {
            cards,
            current_player: config.first_player,
            game_status: GameStatus::Setup,
            players: self.players.clone(),
            config,
            round: self.round.wrapping_add(1),
            revision: 0,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.cards.get(usize::from(card_id)).filter(|card| card.id == card_id)
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn status(&self) -> GameStatus {
        self.game_status
    }

    pub fn is_finished(&self) -> bool {
        self.game_status.is_finished()
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id.index()]
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pending_cards(&self) -> PendingCards {
        self.cards
            .iter()
            .filter(|card| card.is_pending())
            .map(|card| card.id)
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.cards.iter().filter(|card| card.is_matched).count()
    }

    pub fn all_matched(&self) -> bool {
        self.cards.iter().all(|card| card.is_matched)
    }

    pub fn score(&self, player: PlayerId) -> PairCount {
        let owned = self
            .cards
            .iter()
            .filter(|card| card.matched_by_player_id == Some(player))
            .count();
        (owned / 2).try_into().unwrap_or(PairCount::MAX)
    }

    pub fn scores(&self) -> Scores {
        Scores {
            one: self.score(PlayerId::One),
            two: self.score(PlayerId::Two),
        }
    }

    /// Only available once the game has finished.
    pub fn result(&self) -> Option<GameResult> {
        self.game_status
            .is_finished()
            .then(|| self.scores().result())
    }

    /// Whether `card_id` could be turned face up right now, ignoring whose turn it is.
    pub fn can_flip(&self, card_id: CardId) -> bool {
        if self.game_status.is_finished() {
            return false;
        }
        let Some(card) = self.card(card_id) else {
            return false;
        };
        !card.is_matched && !card.is_flipped && self.pending_cards().len() < 2
    }

    pub fn flip(&mut self, card_id: CardId) -> Result<FlipOutcome> {
        use FlipOutcome::*;

        let slot = self.validate_card(card_id)?;

        if self.game_status.is_finished() {
            log::debug!("Ignoring flip of {card_id}, game already finished");
            return Ok(NoChange);
        }

        let pending = self.pending_cards();
        let card = &self.cards[slot];
        if card.is_matched || card.is_flipped {
            log::trace!("Ignoring flip of {card_id}, already face up");
            return Ok(NoChange);
        }
        if pending.len() >= 2 {
            log::debug!("Ignoring flip of {card_id}, waiting on {pending:?} to resolve");
            return Ok(NoChange);
        }

        self.mark_started();
        self.cards[slot].is_flipped = true;
        self.touch();

        let Some(&first_id) = pending.first() else {
            log::trace!("Player {} flipped {card_id}", self.current_player);
            return Ok(Flipped);
        };

        let first = usize::from(first_id);
        let pair = (first_id, card_id);
        if self.cards[first].is_pair_of(&self.cards[slot]) {
            let owner = self.current_player;
            for index in [first, slot] {
                let card = &mut self.cards[index];
                card.is_matched = true;
                card.matched_by_player_id = Some(owner);
            }
            log::debug!("Player {owner} matched {pair:?} ({})", self.cards[slot].image_id);

            if self.all_matched() {
                self.game_status = GameStatus::Finished;
                log::debug!("Board cleared, final scores {:?}", self.scores());
                Ok(Won)
            } else {
                Ok(Matched(pair))
            }
        } else {
            self.current_player = self.current_player.other();
            log::trace!("Mismatch on {pair:?}, turn passes to {}", self.current_player);
            Ok(Mismatched(pair))
        }
    }

    /// Turns every unmatched face-up card back down, closing a mismatch.
    pub fn unflip_pending(&mut self) -> bool {
        let mut updated = false;
        for card in self.cards.iter_mut().filter(|card| card.is_pending()) {
            card.is_flipped = false;
            updated = true;
        }
        if updated {
            self.touch();
        }
        updated
    }

    /// Visual-only reveal for an optimistic overlay: no evaluation, no turn change.
    pub fn reveal(&mut self, card_id: CardId) -> bool {
        if !self.can_flip(card_id) {
            return false;
        }
        self.cards[usize::from(card_id)].is_flipped = true;
        true
    }

    pub fn start_with_first_player(&mut self, player: PlayerId) -> bool {
        if !self.game_status.is_setup() {
            log::debug!("Ignoring first player choice, game already {:?}", self.game_status);
            return false;
        }
        self.current_player = player;
        self.config.first_player = player;
        self.game_status = GameStatus::Playing;
        self.touch();
        true
    }

    /// Manual override: ends the game whatever the board looks like.
    pub fn end_early(&mut self) -> bool {
        if self.game_status.is_finished() {
            return false;
        }
        log::info!("Game ended early at {:?}", self.scores());
        self.game_status = GameStatus::Finished;
        self.touch();
        true
    }

    /// Manual override used once the final match has been shown; requires a started game.
    pub fn trigger_finish(&mut self) -> bool {
        if !matches!(self.game_status, GameStatus::Playing) {
            return false;
        }
        self.game_status = GameStatus::Finished;
        self.touch();
        true
    }

    /// Gives up the current turn, turning any pending cards back down.
    pub fn force_pass_turn(&mut self) -> bool {
        if !matches!(self.game_status, GameStatus::Playing) {
            return false;
        }
        for card in self.cards.iter_mut().filter(|card| card.is_pending()) {
            card.is_flipped = false;
        }
        self.current_player = self.current_player.other();
        log::info!("Turn forced over to player {}", self.current_player);
        self.touch();
        true
    }

    pub fn rename_player(&mut self, id: PlayerId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.players[id.index()].name == name {
            return false;
        }
        self.players[id.index()].name = name.into();
        self.touch();
        true
    }

    pub fn recolor_player(&mut self, id: PlayerId, color: &str) -> bool {
        if color.is_empty() || self.players[id.index()].color == color {
            return false;
        }
        self.players[id.index()].color = color.into();
        self.touch();
        true
    }

    fn validate_card(&self, card_id: CardId) -> Result<usize> {
        self.card(card_id)
            .map(|card| usize::from(card.id))
            .ok_or(GameError::UnknownCard(card_id))
    }

    fn mark_started(&mut self) {
        if self.game_status.is_setup() {
            self.game_status = GameStatus::Playing;
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: [&str; 8] = ["lion", "tiger", "lion", "bear", "tiger", "wolf", "bear", "wolf"];

    fn board(images: &[&str]) -> GameState {
        let config = GameConfig::new(
            (images.len() / 2) as PairCount,
            CardPack::animals(),
            PlayerId::One,
        );
        GameState::deal(config, FixedBoardGenerator::new(images.iter().copied()))
    }

    fn assert_invariants(state: &GameState) {
        let matched: Vec<&Card> = state.cards().iter().filter(|c| c.is_matched).collect();
        assert_eq!(matched.len() % 2, 0, "matched cards come in pairs");
        for card in &matched {
            let partner = state.cards().iter().find(|c| c.is_pair_of(card)).unwrap();
            assert!(partner.is_matched, "{} matched without its pair", card.image_id);
            assert_eq!(partner.matched_by_player_id, card.matched_by_player_id);
        }
        assert!(state.pending_cards().len() <= 2);
        assert_eq!(state.is_finished() && state.all_matched(), state.all_matched());
    }

    #[test]
    fn mismatch_switches_player_and_unflips_later() {
        let mut state = board(&LAYOUT);

        assert_eq!(state.flip(0).unwrap(), FlipOutcome::Flipped);
        assert_eq!(state.status(), GameStatus::Playing);
        assert_eq!(state.current_player(), PlayerId::One);

        let outcome = state.flip(1).unwrap();

        assert_eq!(outcome, FlipOutcome::Mismatched((0, 1)));
        assert!(state.card(0).unwrap().is_flipped);
        assert!(state.card(1).unwrap().is_flipped);
        assert_eq!(state.current_player(), PlayerId::Two);

        assert!(state.unflip_pending());
        assert!(!state.card(0).unwrap().is_flipped);
        assert!(!state.card(1).unwrap().is_flipped);
        assert_eq!(state.current_player(), PlayerId::Two);
        assert_invariants(&state);
    }

    #[test]
    fn match_keeps_turn_and_records_owner() {
        let mut state = board(&LAYOUT);

        state.flip(0).unwrap();
        let outcome = state.flip(2).unwrap();

        assert_eq!(outcome, FlipOutcome::Matched((0, 2)));
        for id in [0, 2] {
            let card = state.card(id).unwrap();
            assert!(card.is_matched);
            assert_eq!(card.matched_by_player_id, Some(PlayerId::One));
        }
        assert_eq!(state.current_player(), PlayerId::One);
        assert_eq!(state.score(PlayerId::One), 1);
        assert_invariants(&state);
    }

    #[test]
    fn last_pair_finishes_game() {
        let mut state = board(&["lion", "tiger", "tiger", "lion"]);

        state.flip(0).unwrap();
        assert_eq!(state.flip(3).unwrap(), FlipOutcome::Matched((0, 3)));
        state.flip(1).unwrap();
        assert_eq!(state.flip(2).unwrap(), FlipOutcome::Won);

        assert_eq!(state.status(), GameStatus::Finished);
        assert_eq!(state.scores().total(), state.config().pair_count);
        assert_eq!(state.result(), Some(GameResult::Winner(PlayerId::One)));
        assert_eq!(state.flip(0).unwrap(), FlipOutcome::NoChange);
    }

    #[test]
    fn equal_scores_are_a_tie() {
        let mut state = board(&LAYOUT);

        for (first, second) in [(0, 2), (1, 3), (1, 3), (1, 4), (3, 5), (3, 6)] {
            state.flip(first).unwrap();
            if state.flip(second).unwrap().pending_unflip().is_some() {
                state.unflip_pending();
            }
        }
        state.flip(5).unwrap();
        assert_eq!(state.flip(7).unwrap(), FlipOutcome::Won);

        let result = state.result().unwrap();
        assert_eq!(state.scores(), Scores { one: 2, two: 2 });
        assert!(result.is_tie());
        assert_eq!(result.winners().as_slice(), &[PlayerId::One, PlayerId::Two]);
    }

    #[test]
    fn rejected_flips_leave_state_untouched() {
        let mut state = board(&LAYOUT);
        state.flip(0).unwrap();
        state.flip(2).unwrap();
        state.flip(1).unwrap();

        let before = state.clone();
        assert_eq!(state.flip(0).unwrap(), FlipOutcome::NoChange, "matched card");
        assert_eq!(state.flip(1).unwrap(), FlipOutcome::NoChange, "double click");
        assert_eq!(state, before);

        state.flip(3).unwrap();
        let before = state.clone();
        assert_eq!(state.flip(5).unwrap(), FlipOutcome::NoChange, "third flip");
        assert_eq!(state, before);
    }

    #[test]
    fn unknown_card_is_an_error() {
        let state = board(&LAYOUT);

        assert_eq!(apply_flip(&state, 99), Err(GameError::UnknownCard(99)));
    }

    #[test]
    fn apply_flip_does_not_touch_input() {
        let state = board(&LAYOUT);

        let (next, outcome) = apply_flip(&state, 4).unwrap();

        assert_eq!(outcome, FlipOutcome::Flipped);
        assert!(!state.card(4).unwrap().is_flipped);
        assert!(next.card(4).unwrap().is_flipped);
        assert!(next.revision() > state.revision());
    }

    #[test]
    fn forced_transitions_never_fabricate_owners() {
        let mut state = board(&LAYOUT);
        state.flip(0).unwrap();
        state.flip(2).unwrap();

        assert!(state.end_early());
        assert!(!state.end_early());
        assert_eq!(state.status(), GameStatus::Finished);
        assert_eq!(state.scores().one, 1);
        assert_eq!(state.matched_count(), 2);
        assert_invariants(&state);
    }

    #[test]
    fn trigger_finish_requires_started_game() {
        let mut state = board(&LAYOUT);

        assert!(!state.trigger_finish());
        assert!(state.start_with_first_player(PlayerId::Two));
        assert_eq!(state.current_player(), PlayerId::Two);
        assert!(state.trigger_finish());
        assert!(state.is_finished());
    }

    #[test]
    fn force_pass_turn_clears_pending_cards() {
        let mut state = board(&LAYOUT);
        state.flip(0).unwrap();

        assert!(state.force_pass_turn());

        assert!(state.pending_cards().is_empty());
        assert_eq!(state.current_player(), PlayerId::Two);
    }

    #[test]
    fn reveal_does_not_evaluate() {
        let mut state = board(&LAYOUT);
        let revision = state.revision();

        assert!(state.reveal(0));
        assert!(state.reveal(2));
        assert!(!state.reveal(4));

        assert!(state.cards().iter().all(|card| !card.is_matched));
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn random_play_preserves_invariants() {
        use rand::prelude::*;

        let mut rng = SmallRng::seed_from_u64(3);
        let config = GameConfig::new(6, CardPack::animals(), PlayerId::One);
        let mut state = GameState::deal(config, RandomBoardGenerator::new(11));

        for _ in 0..500 {
            if state.is_finished() {
                break;
            }
            let card_id = rng.random_range(0..state.cards().len()) as CardId;
            let player = state.current_player();
            let outcome = state.flip(card_id).unwrap();
            match outcome {
                FlipOutcome::Mismatched(_) => {
                    assert_eq!(state.current_player(), player.other());
                    state.unflip_pending();
                }
                FlipOutcome::Matched(_) | FlipOutcome::Won => {
                    assert_eq!(state.current_player(), player);
                }
                FlipOutcome::Flipped | FlipOutcome::NoChange => {}
            }
            assert_invariants(&state);
            assert_eq!(state.is_finished(), state.all_matched());
        }
    }

    #[test]
    fn player_ids_serialize_as_numbers() {
        let card = Card {
            matched_by_player_id: Some(PlayerId::Two),
            ..Card::new(3, "lion")
        };

        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["matchedByPlayerId"], 2);
        assert_eq!(json["imageId"], "lion");
        assert!(serde_json::from_str::<PlayerId>("3").is_err());
    }
}
