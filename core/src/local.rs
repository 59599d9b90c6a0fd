use web_time::{Duration, Instant};

use crate::*;

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// How long a mismatched pair stays face up.
    pub mismatch_delay: Duration,
    /// Fixed shuffle seed, wall clock when absent.
    pub seed: Option<u64>,
}

impl ControllerConfig {
    pub const DEFAULT_MISMATCH_DELAY: Duration = Duration::from_millis(1000);
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mismatch_delay: Self::DEFAULT_MISMATCH_DELAY,
            seed: None,
        }
    }
}

/// Hot-seat controller: both players share one device, which is always authoritative.
#[derive(Clone, Debug)]
pub struct LocalController {
    state: GameState,
    config: ControllerConfig,
    dealer: Dealer,
    unflip: DeferredUnflip,
}

impl LocalController {
    pub fn new(game: GameConfig, config: ControllerConfig) -> Self {
        let mut dealer = Dealer::from_config(config.seed);
        let cards = dealer.deal(&game);
        Self::with_state(GameState::new(game, cards), config, dealer)
    }

    pub fn with_state(state: GameState, config: ControllerConfig, dealer: Dealer) -> Self {
        Self {
            state,
            config,
            dealer,
            unflip: DeferredUnflip::default(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn scores(&self) -> Scores {
        self.state.scores()
    }

    pub fn result(&self) -> Option<GameResult> {
        self.state.result()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.unflip.due_at()
    }

    /// Single entry point for UI intents, applied synchronously.
    pub fn dispatch(&mut self, intent: &Intent, now: Instant) -> Effect {
        if intent.replaces_board() && self.unflip.cancel() {
            log::debug!("Cancelled pending unflip for new board");
        }
        let effect = match reduce(&mut self.state, intent, &mut self.dealer) {
            Ok(effect) => effect,
            Err(err) => {
                log::warn!("Ignoring {intent:?}: {err}");
                return Effect::NoChange;
            }
        };
        if let Some(pair) = effect.pending_unflip() {
            self.unflip.schedule(now, self.config.mismatch_delay, pair);
        }
        if matches!(intent, Intent::ForceResolve | Intent::EndEarly) {
            self.unflip.cancel();
        }
        effect
    }

    /// Fires the mismatch timer when due; returns whether the board changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.unflip.take_due(now) {
            Some(pair) => {
                log::trace!("Turning {pair:?} back down");
                self.state.unflip_pending()
            }
            None => false,
        }
    }

    pub fn flip_card(&mut self, card_id: CardId, now: Instant) -> Effect {
        self.dispatch(&Intent::Flip { card_id }, now)
    }

    pub fn reset_game(&mut self, now: Instant) -> Effect {
        self.dispatch(&Intent::Reset, now)
    }

    pub fn initialize_game(&mut self, pair_count: PairCount, card_pack: CardPack, now: Instant) -> Effect {
        self.dispatch(
            &Intent::Initialize {
                pair_count,
                card_pack,
            },
            now,
        )
    }

    pub fn start_game_with_first_player(&mut self, player: PlayerId, now: Instant) -> Effect {
        self.dispatch(&Intent::StartWithFirstPlayer { player }, now)
    }

    pub fn end_game_early(&mut self, now: Instant) -> Effect {
        self.dispatch(&Intent::EndEarly, now)
    }

    pub fn trigger_game_finish(&mut self, now: Instant) -> Effect {
        self.dispatch(&Intent::TriggerFinish, now)
    }

    pub fn update_player_name(&mut self, player: PlayerId, name: impl Into<String>, now: Instant) -> Effect {
        self.dispatch(
            &Intent::RenamePlayer {
                player,
                name: name.into(),
            },
            now,
        )
    }

    pub fn update_player_color(&mut self, player: PlayerId, color: impl Into<String>, now: Instant) -> Effect {
        self.dispatch(
            &Intent::RecolorPlayer {
                player,
                color: color.into(),
            },
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(800);

    fn controller() -> LocalController {
        let game = GameConfig::new(4, CardPack::animals(), PlayerId::One);
        let state = GameState::deal(
            game,
            FixedBoardGenerator::new(["lion", "tiger", "lion", "bear", "tiger", "wolf", "bear", "wolf"]),
        );
        let config = ControllerConfig {
            mismatch_delay: DELAY,
            seed: Some(9),
        };
        LocalController::with_state(state, config, Dealer::new(9))
    }

    #[test]
    fn mismatch_turns_back_after_delay() {
        let start = Instant::now();
        let mut local = controller();

        local.flip_card(0, start);
        local.flip_card(1, start);

        assert_eq!(local.state().pending_cards().as_slice(), &[0, 1]);
        assert_eq!(local.state().current_player(), PlayerId::Two);
        assert!(!local.tick(start + DELAY / 2));
        assert!(local.state().card(0).unwrap().is_flipped);

        assert!(local.tick(start + DELAY));
        assert!(!local.state().card(0).unwrap().is_flipped);
        assert!(!local.state().card(1).unwrap().is_flipped);
        assert_eq!(local.state().current_player(), PlayerId::Two);
    }

    #[test]
    fn reset_cancels_pending_unflip() {
        let start = Instant::now();
        let mut local = controller();
        local.flip_card(0, start);
        local.flip_card(1, start);

        assert_eq!(local.reset_game(start), Effect::NewBoard);
        assert_eq!(local.next_deadline(), None);

        local.flip_card(0, start);
        assert!(!local.tick(start + DELAY * 2));
        assert!(local.state().card(0).unwrap().is_flipped);
    }

    #[test]
    fn third_flip_is_rejected_while_pair_pending() {
        let start = Instant::now();
        let mut local = controller();
        local.flip_card(0, start);
        local.flip_card(1, start);

        let effect = local.flip_card(3, start);

        assert!(!effect.has_update());
        assert!(!local.state().card(3).unwrap().is_flipped);
    }

    #[test]
    fn unknown_card_is_dropped() {
        let mut local = controller();

        assert_eq!(local.flip_card(100, Instant::now()), Effect::NoChange);
    }

    #[test]
    fn manual_overrides_only_change_status() {
        let now = Instant::now();
        let mut local = controller();
        local.start_game_with_first_player(PlayerId::Two, now);
        local.flip_card(0, now);
        local.flip_card(2, now);

        assert_eq!(local.end_game_early(now), Effect::Updated);
        assert_eq!(local.state().status(), GameStatus::Finished);
        assert_eq!(local.scores(), Scores { one: 0, two: 1 });
        assert_eq!(local.result(), Some(GameResult::Winner(PlayerId::Two)));
        assert_eq!(local.trigger_game_finish(now), Effect::NoChange);
    }

    #[test]
    fn player_details_are_updated() {
        let now = Instant::now();
        let mut local = controller();

        local.update_player_name(PlayerId::One, "Hana", now);
        local.update_player_color(PlayerId::One, "#00ff00", now);

        assert_eq!(local.state().player(PlayerId::One).name, "Hana");
        assert_eq!(local.state().player(PlayerId::One).color, "#00ff00");
    }

    #[test]
    fn new_deals_full_board() {
        let local = LocalController::new(GameConfig::default(), ControllerConfig::default());

        assert_eq!(local.state().cards().len(), GameConfig::DEFAULT_PAIRS as usize * 2);
        assert_eq!(local.state().status(), GameStatus::Setup);
    }
}
