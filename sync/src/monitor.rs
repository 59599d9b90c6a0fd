use hashbrown::HashMap;
use pairmatch_protocol::{PeerId, PresenceMap};
use smallvec::SmallVec;
use web_time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    /// Age after which a heartbeat counts as stale.
    pub stale_after: Duration,
    /// Stale checks in a row before a peer is declared gone.
    pub consecutive_checks: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5),
            consecutive_checks: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LivenessChange {
    Disconnected(PeerId),
    Reconnected(PeerId),
}

pub type LivenessChanges = SmallVec<[LivenessChange; 2]>;

#[derive(Clone, Debug)]
struct Liveness {
    /// Unset until the first heartbeat or check, which starts the grace period.
    last_seen_ms: Option<u64>,
    stale_checks: u32,
    disconnected: bool,
}

/// Debounced liveness of the peers named by room membership.
///
/// Only flags peers, it never touches game state.
#[derive(Clone, Debug, Default)]
pub struct DisconnectMonitor {
    config: MonitorConfig,
    peers: HashMap<PeerId, Liveness>,
}

impl DisconnectMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            peers: HashMap::new(),
        }
    }

    pub fn watch(&mut self, peer: &str) {
        if self.peers.contains_key(peer) {
            return;
        }
        log::debug!("Watching presence of {peer}");
        self.peers.insert(
            peer.into(),
            Liveness {
                last_seen_ms: None,
                stale_checks: 0,
                disconnected: false,
            },
        );
    }

    pub fn unwatch(&mut self, peer: &str) {
        if self.peers.remove(peer).is_some() {
            log::debug!("Stopped watching presence of {peer}");
        }
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn is_watching(&self, peer: &str) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn is_disconnected(&self, peer: &str) -> bool {
        self.peers.get(peer).is_some_and(|liveness| liveness.disconnected)
    }

    pub fn any_disconnected(&self) -> bool {
        self.peers.values().any(|liveness| liveness.disconnected)
    }

    /// Takes in a presence snapshot; a newer fresh heartbeat brings a peer back.
    pub fn observe(&mut self, presence: &PresenceMap, now_ms: u64) -> LivenessChanges {
        let stale_after = self.stale_after_ms();
        let mut changes = LivenessChanges::new();
        for (peer, liveness) in self.peers.iter_mut() {
            let Some(record) = presence.get(peer) else {
                continue;
            };
            if Some(record.last_seen_ms) <= liveness.last_seen_ms {
                continue;
            }
            liveness.last_seen_ms = Some(record.last_seen_ms);
            let fresh = now_ms.saturating_sub(record.last_seen_ms) <= stale_after;
            if !fresh {
                continue;
            }
            liveness.stale_checks = 0;
            if liveness.disconnected {
                liveness.disconnected = false;
                log::info!("Peer {peer} reconnected");
                changes.push(LivenessChange::Reconnected(peer.clone()));
            }
        }
        changes
    }

    /// Periodic check; a peer must be stale for the configured number of checks in a row.
    pub fn check(&mut self, now_ms: u64) -> LivenessChanges {
        let stale_after = self.stale_after_ms();
        let required = self.config.consecutive_checks.max(1);
        let mut changes = LivenessChanges::new();
        for (peer, liveness) in self.peers.iter_mut() {
            let last_seen_ms = *liveness.last_seen_ms.get_or_insert(now_ms);
            if now_ms.saturating_sub(last_seen_ms) <= stale_after {
                liveness.stale_checks = 0;
                continue;
            }
            liveness.stale_checks = liveness.stale_checks.saturating_add(1);
            if !liveness.disconnected && liveness.stale_checks >= required {
                liveness.disconnected = true;
                log::warn!(
                    "Peer {peer} silent for {} ms, marking disconnected",
                    now_ms.saturating_sub(last_seen_ms)
                );
                changes.push(LivenessChange::Disconnected(peer.clone()));
            }
        }
        changes
    }

    fn stale_after_ms(&self) -> u64 {
        self.config.stale_after.as_millis().try_into().unwrap_or(u64::MAX)
    }
}
