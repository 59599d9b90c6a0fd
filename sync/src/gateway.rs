use pairmatch_protocol::{PresenceMap, PresenceRecord, Room, RoomCode, RoomUpdate};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Not connected to the room service")]
    NotConnected,
    #[error("Room {0} does not exist")]
    RoomNotFound(RoomCode),
    #[error("Room service rejected the request: {0}")]
    Rejected(String),
    #[error("Session already closed")]
    Closed,
}

pub type Result<T> = core::result::Result<T, GatewayError>;

/// Receives the whole room after every write, `None` once the room is gone.
pub type StateCallback = Box<dyn Fn(Option<&Room>)>;

pub type PresenceCallback = Box<dyn Fn(&PresenceMap)>;

/// Handle returned by the subscribe calls; dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Shared-document service holding one room.
///
/// Writes are last-write-wins with no transactions; delivery to subscribers
/// is at least once and only the latest write is guaranteed to arrive.
pub trait RoomGateway {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self);
    fn set_state(&mut self, update: RoomUpdate) -> Result<()>;
    fn subscribe_to_state(&mut self, callback: StateCallback) -> Subscription;
}

/// Ephemeral per-client signals next to the room document.
pub trait PresenceChannel {
    fn publish_presence(&mut self, record: PresenceRecord) -> Result<()>;
    fn subscribe_to_presence(&mut self, callback: PresenceCallback) -> Subscription;
}
