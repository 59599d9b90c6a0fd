use pairmatch_core::{GameConfig, GameState, GameStatus, Intent, PlayerId};
use serde::{Deserialize, Serialize};

use crate::{PeerId, RoomCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl From<GameStatus> for RoomStatus {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Setup => Self::Waiting,
            GameStatus::Playing => Self::Playing,
            GameStatus::Finished => Self::Finished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub game: GameConfig,
    /// Opaque to the engine, passed through to every client.
    pub theme: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            theme: "default".into(),
        }
    }
}

/// Guest intent waiting for the host to evaluate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEnvelope {
    pub seq: u64,
    pub from: PeerId,
    pub intent: Intent,
}

/// Shared room document.
///
/// Fields have a single writer each: `guest_id` and `guest_inputs` belong to
/// the guest, everything else to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_code: RoomCode,
    pub host_id: PeerId,
    #[serde(default)]
    pub guest_id: Option<PeerId>,
    pub status: RoomStatus,
    pub game: GameState,
    pub config: RoomConfig,
    #[serde(default)]
    pub guest_inputs: Vec<IntentEnvelope>,
    #[serde(default)]
    pub applied_input_seq: u64,
}

impl Room {
    pub fn new(room_code: RoomCode, host_id: impl Into<PeerId>, config: RoomConfig, game: GameState) -> Self {
        Self {
            room_code,
            host_id: host_id.into(),
            guest_id: None,
            status: RoomStatus::Waiting,
            game,
            config,
            guest_inputs: Vec::new(),
            applied_input_seq: 0,
        }
    }

    /// Player seat of a peer: the host plays first seat, the guest second.
    pub fn seat_of(&self, peer_id: &str) -> Option<PlayerId> {
        if self.host_id == peer_id {
            Some(PlayerId::One)
        } else if self.guest_id.as_deref() == Some(peer_id) {
            Some(PlayerId::Two)
        } else {
            None
        }
    }

    /// Guest inputs the host has not evaluated yet, oldest first.
    pub fn unapplied_inputs(&self) -> impl Iterator<Item = &IntentEnvelope> {
        let applied = self.applied_input_seq;
        self.guest_inputs.iter().filter(move |input| input.seq > applied)
    }

    /// Applies a partial write; returns whether anything changed.
    pub fn apply_update(&mut self, update: &RoomUpdate) -> bool {
        match update {
            RoomUpdate::Create(room) => {
                *self = room.clone();
                true
            }
            RoomUpdate::Authoritative {
                status,
                game,
                applied_input_seq,
            } => {
                let changed = self.status != *status
                    || self.game != *game
                    || self.applied_input_seq != *applied_input_seq;
                self.status = *status;
                self.game = game.clone();
                self.applied_input_seq = *applied_input_seq;
                changed
            }
            RoomUpdate::Config(config) => {
                let changed = self.config != *config;
                self.config = config.clone();
                changed
            }
            RoomUpdate::GuestJoined { guest_id } => {
                if self.guest_id.as_ref() == Some(guest_id) {
                    return false;
                }
                if let Some(previous) = self.guest_id.replace(guest_id.clone()) {
                    log::info!("Guest {previous} replaced by {guest_id} in room {}", self.room_code);
                }
                self.guest_inputs.clear();
                true
            }
            RoomUpdate::GuestLeft => {
                self.guest_inputs.clear();
                self.guest_id.take().is_some()
            }
            RoomUpdate::GuestInputs(inputs) => {
                if self.guest_inputs == *inputs {
                    return false;
                }
                self.guest_inputs = inputs.clone();
                true
            }
            RoomUpdate::Close => false,
        }
    }
}

/// Partial or full write to the room document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum RoomUpdate {
    /// Full document, written by the host when opening the lobby.
    Create(Room),
    /// Every host-owned field that changes with play, written together.
    #[serde(rename_all = "camelCase")]
    Authoritative {
        status: RoomStatus,
        game: GameState,
        applied_input_seq: u64,
    },
    Config(RoomConfig),
    #[serde(rename_all = "camelCase")]
    GuestJoined { guest_id: PeerId },
    GuestLeft,
    GuestInputs(Vec<IntentEnvelope>),
    /// Host is leaving, the document goes away.
    Close,
}

impl RoomUpdate {
    pub const fn is_host_write(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Authoritative { .. } | Self::Config(_) | Self::Close
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairmatch_core::{CardPack, FixedBoardGenerator};

    fn room() -> Room {
        let config = RoomConfig {
            game: GameConfig::new(2, CardPack::animals(), PlayerId::One),
            theme: "night".into(),
        };
        let game = GameState::deal(
            config.game.clone(),
            FixedBoardGenerator::new(["lion", "tiger", "tiger", "lion"]),
        );
        Room::new(RoomCode::parse("ABCDEF").unwrap(), "host", config, game)
    }

    fn envelope(seq: u64) -> IntentEnvelope {
        IntentEnvelope {
            seq,
            from: "guest".into(),
            intent: Intent::Flip { card_id: 0 },
        }
    }

    #[test]
    fn guest_join_assigns_second_seat() {
        let mut room = room();

        assert!(room.apply_update(&RoomUpdate::GuestJoined { guest_id: "guest".into() }));
        assert!(!room.apply_update(&RoomUpdate::GuestJoined { guest_id: "guest".into() }));

        assert_eq!(room.seat_of("host"), Some(PlayerId::One));
        assert_eq!(room.seat_of("guest"), Some(PlayerId::Two));
        assert_eq!(room.seat_of("stranger"), None);
    }

    #[test]
    fn unapplied_inputs_skip_acknowledged() {
        let mut room = room();
        room.apply_update(&RoomUpdate::GuestInputs(vec![envelope(1), envelope(2), envelope(3)]));
        room.applied_input_seq = 2;

        let seqs: Vec<u64> = room.unapplied_inputs().map(|input| input.seq).collect();

        assert_eq!(seqs, vec![3]);
    }

    #[test]
    fn authoritative_update_replaces_host_fields() {
        let mut room = room();
        let mut game = room.game.clone();
        game.flip(0).unwrap();

        let changed = room.apply_update(&RoomUpdate::Authoritative {
            status: RoomStatus::Playing,
            game: game.clone(),
            applied_input_seq: 4,
        });

        assert!(changed);
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.game, game);
        assert_eq!(room.applied_input_seq, 4);
    }

    #[test]
    fn guest_leaving_drops_its_inputs() {
        let mut room = room();
        room.apply_update(&RoomUpdate::GuestJoined { guest_id: "guest".into() });
        room.apply_update(&RoomUpdate::GuestInputs(vec![envelope(1)]));

        assert!(room.apply_update(&RoomUpdate::GuestLeft));

        assert_eq!(room.guest_id, None);
        assert!(room.guest_inputs.is_empty());
    }

    #[test]
    fn room_status_follows_game_status() {
        assert_eq!(RoomStatus::from(GameStatus::Setup), RoomStatus::Waiting);
        assert_eq!(RoomStatus::from(GameStatus::Playing), RoomStatus::Playing);
        assert_eq!(RoomStatus::from(GameStatus::Finished), RoomStatus::Finished);
    }
}
