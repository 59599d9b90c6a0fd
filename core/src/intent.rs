use serde::{Deserialize, Serialize};

use crate::*;

/// Everything the UI can ask a controller to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Intent {
    #[serde(rename_all = "camelCase")]
    Flip { card_id: CardId },
    Reset,
    #[serde(rename_all = "camelCase")]
    Initialize { pair_count: PairCount, card_pack: CardPack },
    StartWithFirstPlayer { player: PlayerId },
    EndEarly,
    TriggerFinish,
    ForceResolve,
    RenamePlayer { player: PlayerId, name: String },
    RecolorPlayer { player: PlayerId, color: String },
}

impl Intent {
    pub const fn is_flip(&self) -> bool {
        matches!(self, Self::Flip { .. })
    }

    /// Intents that throw the current board away.
    pub const fn replaces_board(&self) -> bool {
        matches!(self, Self::Reset | Self::Initialize { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    NoChange,
    Updated,
    Flip(FlipOutcome),
    NewBoard,
}

impl Effect {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Updated => true,
            Self::Flip(outcome) => outcome.has_update(),
            Self::NewBoard => true,
        }
    }

    pub const fn pending_unflip(self) -> Option<(CardId, CardId)> {
        match self {
            Self::Flip(outcome) => outcome.pending_unflip(),
            _ => None,
        }
    }
}

fn changed(updated: bool) -> Effect {
    if updated { Effect::Updated } else { Effect::NoChange }
}

/// Applies one intent to `state`; shared by the local and the online controllers.
///
/// Timers are not touched here: the caller schedules the unflip for a
/// [`Effect::Flip`] mismatch and cancels pending ones on [`Effect::NewBoard`].
pub fn reduce(state: &mut GameState, intent: &Intent, dealer: &mut Dealer) -> Result<Effect> {
    Ok(match intent {
        Intent::Flip { card_id } => Effect::Flip(state.flip(*card_id)?),
        Intent::Reset => {
            let config = state.config().clone();
            let cards = dealer.deal(&config);
            *state = state.next_round(config, cards);
            log::info!("New board, round {}", state.round());
            Effect::NewBoard
        }
        Intent::Initialize {
            pair_count,
            card_pack,
        } => {
            let config = GameConfig::new(*pair_count, card_pack.clone(), state.config().first_player);
            let cards = dealer.deal(&config);
            *state = state.next_round(config, cards);
            log::info!(
                "New {} pair board from pack {:?}, round {}",
                state.config().pair_count,
                state.config().card_pack.name,
                state.round()
            );
            Effect::NewBoard
        }
        Intent::StartWithFirstPlayer { player } => changed(state.start_with_first_player(*player)),
        Intent::EndEarly => changed(state.end_early()),
        Intent::TriggerFinish => changed(state.trigger_finish()),
        Intent::ForceResolve => changed(state.force_pass_turn()),
        Intent::RenamePlayer { player, name } => changed(state.rename_player(*player, name)),
        Intent::RecolorPlayer { player, color } => changed(state.recolor_player(*player, color)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        let config = GameConfig::new(2, CardPack::animals(), PlayerId::One);
        GameState::deal(config, FixedBoardGenerator::new(["lion", "tiger", "lion", "tiger"]))
    }

    #[test]
    fn reset_starts_next_round_with_same_players() {
        let mut state = state();
        let mut dealer = Dealer::new(5);
        reduce(&mut state, &Intent::RenamePlayer { player: PlayerId::Two, name: "Aiko".into() }, &mut dealer).unwrap();
        state.flip(0).unwrap();

        let effect = reduce(&mut state, &Intent::Reset, &mut dealer).unwrap();

        assert_eq!(effect, Effect::NewBoard);
        assert_eq!(state.round(), 1);
        assert_eq!(state.status(), GameStatus::Setup);
        assert_eq!(state.player(PlayerId::Two).name, "Aiko");
        assert!(state.cards().iter().all(Card::is_face_down));
    }

    #[test]
    fn initialize_clamps_to_pack_size() {
        let mut state = state();
        let mut dealer = Dealer::new(5);
        let pack = CardPack::new("tiny", ["sun", "moon", "sun"]).unwrap();

        reduce(&mut state, &Intent::Initialize { pair_count: 9, card_pack: pack }, &mut dealer).unwrap();

        assert_eq!(state.config().pair_count, 2);
        assert_eq!(state.cards().len(), 4);
    }

    #[test]
    fn mismatch_flip_reports_pending_unflip() {
        let mut state = state();
        let mut dealer = Dealer::new(5);

        reduce(&mut state, &Intent::Flip { card_id: 0 }, &mut dealer).unwrap();
        let effect = reduce(&mut state, &Intent::Flip { card_id: 1 }, &mut dealer).unwrap();

        assert_eq!(effect.pending_unflip(), Some((0, 1)));
    }

    #[test]
    fn blank_name_is_ignored() {
        let mut state = state();
        let mut dealer = Dealer::new(5);

        let effect = reduce(&mut state, &Intent::RenamePlayer { player: PlayerId::One, name: "  ".into() }, &mut dealer).unwrap();

        assert!(!effect.has_update());
        assert_eq!(state.player(PlayerId::One).name, "Player 1");
    }

    #[test]
    fn intents_are_tagged_on_the_wire() {
        let json = serde_json::to_string(&Intent::Flip { card_id: 4 }).unwrap();

        assert_eq!(json, r#"{"type":"flip","cardId":4}"#);
        assert_eq!(serde_json::from_str::<Intent>(&json).unwrap(), Intent::Flip { card_id: 4 });
    }
}
