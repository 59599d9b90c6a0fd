use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of one connected client, assigned by the embedding application.
pub type PeerId = String;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f32,
    pub y: f32,
}

/// Advisory liveness signal, last write wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub peer_id: PeerId,
    /// Wall clock milliseconds since the unix epoch.
    pub last_seen_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl PresenceRecord {
    pub fn heartbeat(peer_id: impl Into<PeerId>, now_ms: u64) -> Self {
        Self {
            peer_id: peer_id.into(),
            last_seen_ms: now_ms,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

pub type PresenceMap = BTreeMap<PeerId, PresenceRecord>;
