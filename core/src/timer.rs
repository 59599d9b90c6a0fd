use web_time::{Duration, Instant};

use crate::CardId;

/// Single pending "turn the mismatched pair back down" deadline.
///
/// Only one mismatch can be open at a time, so one slot is enough; cancelling
/// drops it so a late tick cannot touch a board that was replaced meanwhile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeferredUnflip {
    slot: Option<(Instant, (CardId, CardId))>,
}

impl DeferredUnflip {
    pub fn schedule(&mut self, now: Instant, delay: Duration, pair: (CardId, CardId)) {
        if let Some((_, previous)) = self.slot {
            log::debug!("Replacing pending unflip of {previous:?} with {pair:?}");
        }
        self.slot = Some((now + delay, pair));
    }

    pub fn cancel(&mut self) -> bool {
        self.slot.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.slot.map(|(due, _)| due)
    }

    /// Pops the pair once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<(CardId, CardId)> {
        match self.slot {
            Some((due, pair)) if now >= due => {
                self.slot = None;
                Some(pair)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_after_delay() {
        let start = Instant::now();
        let mut timer = DeferredUnflip::default();
        timer.schedule(start, Duration::from_millis(500), (1, 2));

        assert_eq!(timer.take_due(start + Duration::from_millis(499)), None);
        assert_eq!(timer.take_due(start + Duration::from_millis(500)), Some((1, 2)));
        assert!(!timer.is_pending());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let start = Instant::now();
        let mut timer = DeferredUnflip::default();
        timer.schedule(start, Duration::from_millis(10), (3, 4));

        assert!(timer.cancel());
        assert_eq!(timer.take_due(start + Duration::from_secs(5)), None);
    }
}
