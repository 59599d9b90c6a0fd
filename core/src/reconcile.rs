use crate::*;

/// Monotonic position of a game within a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub round: u32,
    pub status: GameStatus,
    pub matched: usize,
    pub revision: u64,
}

impl Progress {
    /// A later round always wins; inside a round nothing may move backwards.
    pub fn regresses_from(&self, current: &Progress) -> bool {
        if self.round != current.round {
            return self.round < current.round;
        }
        self.status < current.status
            || self.matched < current.matched
            || self.revision < current.revision
    }
}

impl GameState {
    pub fn progress(&self) -> Progress {
        Progress {
            round: self.round(),
            status: self.status(),
            matched: self.matched_count(),
            revision: self.revision(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Same snapshot as the one already held.
    Unchanged,
    /// Incoming snapshot replaces the held one wholesale.
    Applied,
    /// Incoming snapshot is behind the held one and must be dropped.
    Stale,
}

impl Reconciliation {
    pub const fn has_update(self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub fn reconcile(current: Option<&GameState>, incoming: &GameState) -> Reconciliation {
    let Some(current) = current else {
        return Reconciliation::Applied;
    };
    if current == incoming {
        return Reconciliation::Unchanged;
    }
    let (held, offered) = (current.progress(), incoming.progress());
    if offered.regresses_from(&held) {
        log::warn!("Dropping stale game state {offered:?}, already at {held:?}");
        Reconciliation::Stale
    } else {
        Reconciliation::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        let config = GameConfig::new(2, CardPack::animals(), PlayerId::One);
        GameState::deal(config, FixedBoardGenerator::new(["lion", "tiger", "lion", "tiger"]))
    }

    #[test]
    fn identical_state_is_unchanged() {
        let state = state();

        assert_eq!(reconcile(Some(&state), &state.clone()), Reconciliation::Unchanged);
    }

    #[test]
    fn newer_revision_is_applied_and_older_is_stale() {
        let old = state();
        let mut new = old.clone();
        new.flip(0).unwrap();

        assert_eq!(reconcile(Some(&old), &new), Reconciliation::Applied);
        assert_eq!(reconcile(Some(&new), &old), Reconciliation::Stale);
    }

    #[test]
    fn unflip_after_mismatch_is_progress() {
        let mut flipped = state();
        flipped.flip(0).unwrap();
        flipped.flip(1).unwrap();
        let mut resolved = flipped.clone();
        resolved.unflip_pending();

        assert_eq!(reconcile(Some(&flipped), &resolved), Reconciliation::Applied);
        assert_eq!(reconcile(Some(&resolved), &flipped), Reconciliation::Stale);
    }

    #[test]
    fn next_round_beats_finished_game() {
        let mut finished = state();
        finished.end_early();
        let next = finished.next_round(finished.config().clone(), state().cards().to_vec());

        assert_eq!(reconcile(Some(&finished), &next), Reconciliation::Applied);
        assert_eq!(reconcile(Some(&next), &finished), Reconciliation::Stale);
    }

    #[test]
    fn anything_applies_over_nothing() {
        assert_eq!(reconcile(None, &state()), Reconciliation::Applied);
    }
}
