use std::cell::RefCell;
use std::rc::{Rc, Weak};

use pairmatch_protocol::{PresenceMap, PresenceRecord, Room, RoomCode, RoomUpdate};

use crate::*;

struct Document {
    room_code: RoomCode,
    room: Option<Room>,
    presence: PresenceMap,
    state_subscribers: Vec<(u64, Rc<StateCallback>)>,
    presence_subscribers: Vec<(u64, Rc<PresenceCallback>)>,
    next_subscriber: u64,
    offline: bool,
    writes: usize,
}

/// In-process stand-in for the hosted shared document of one room.
///
/// Every [`MemoryGateway`] made from the same document sees the same room,
/// which is how two controllers are wired together in tests and demos.
/// Subscribers are called synchronously after each write.
#[derive(Clone)]
pub struct MemoryDocument {
    inner: Rc<RefCell<Document>>,
}

impl MemoryDocument {
    pub fn new(room_code: RoomCode) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Document {
                room_code,
                room: None,
                presence: PresenceMap::new(),
                state_subscribers: Vec::new(),
                presence_subscribers: Vec::new(),
                next_subscriber: 0,
                offline: false,
                writes: 0,
            })),
        }
    }

    pub fn gateway(&self) -> MemoryGateway {
        MemoryGateway {
            document: self.clone(),
            connected: false,
        }
    }

    pub fn room(&self) -> Option<Room> {
        self.inner.borrow().room.clone()
    }

    pub fn presence(&self) -> PresenceMap {
        self.inner.borrow().presence.clone()
    }

    /// Makes every connect and write fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.borrow_mut().offline = offline;
    }

    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn subscriber_count(&self) -> usize {
        let document = self.inner.borrow();
        document.state_subscribers.len() + document.presence_subscribers.len()
    }

    /// Delivers the current room again, as an at-least-once channel may.
    pub fn redeliver(&self) {
        let room = self.room();
        self.notify_state(room.as_ref());
    }

    /// Delivers an arbitrary snapshot without storing it, e.g. a late duplicate.
    pub fn deliver(&self, room: &Room) {
        self.notify_state(Some(room));
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.borrow().offline {
            Err(GatewayError::Rejected("room service unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn write(&self, update: RoomUpdate) -> Result<()> {
        self.check_online()?;
        let room = {
            let mut document = self.inner.borrow_mut();
            match update {
                RoomUpdate::Create(room) => {
                    if room.room_code != document.room_code {
                        return Err(GatewayError::Rejected(format!(
                            "room {} written to document {}",
                            room.room_code, document.room_code
                        )));
                    }
                    document.room = Some(room);
                }
                RoomUpdate::Close => {
                    document.room = None;
                }
                update => {
                    let room_code = document.room_code.clone();
                    let Some(room) = document.room.as_mut() else {
                        return Err(GatewayError::RoomNotFound(room_code));
                    };
                    room.apply_update(&update);
                }
            }
            document.writes += 1;
            document.room.clone()
        };
        self.notify_state(room.as_ref());
        Ok(())
    }

    fn notify_state(&self, room: Option<&Room>) {
        let subscribers: Vec<Rc<StateCallback>> = self
            .inner
            .borrow()
            .state_subscribers
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(room);
        }
    }

    fn notify_presence(&self) {
        let (presence, subscribers) = {
            let document = self.inner.borrow();
            let subscribers: Vec<Rc<PresenceCallback>> = document
                .presence_subscribers
                .iter()
                .map(|(_, callback)| Rc::clone(callback))
                .collect();
            (document.presence.clone(), subscribers)
        };
        for callback in subscribers {
            callback(&presence);
        }
    }

    fn next_subscriber_id(&self) -> u64 {
        let mut document = self.inner.borrow_mut();
        document.next_subscriber += 1;
        document.next_subscriber
    }

    fn cancel_handle(&self, id: u64, presence: bool) -> Subscription {
        let weak: Weak<RefCell<Document>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut document = inner.borrow_mut();
            if presence {
                document.presence_subscribers.retain(|(sub, _)| *sub != id);
            } else {
                document.state_subscribers.retain(|(sub, _)| *sub != id);
            }
        })
    }
}

/// One client's connection to a [`MemoryDocument`].
pub struct MemoryGateway {
    document: MemoryDocument,
    connected: bool,
}

impl MemoryGateway {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected {
            self.document.check_online()
        } else {
            Err(GatewayError::NotConnected)
        }
    }
}

impl RoomGateway for MemoryGateway {
    fn connect(&mut self) -> Result<()> {
        self.document.check_online()?;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn set_state(&mut self, update: RoomUpdate) -> Result<()> {
        self.check_connected()?;
        self.document.write(update)
    }

    fn subscribe_to_state(&mut self, callback: StateCallback) -> Subscription {
        let id = self.document.next_subscriber_id();
        let callback = Rc::new(callback);
        self.document
            .inner
            .borrow_mut()
            .state_subscribers
            .push((id, Rc::clone(&callback)));
        // live subscriptions start with the current value
        let room = self.document.room();
        callback(room.as_ref());
        self.document.cancel_handle(id, false)
    }
}

impl PresenceChannel for MemoryGateway {
    fn publish_presence(&mut self, record: PresenceRecord) -> Result<()> {
        self.check_connected()?;
        self.document
            .inner
            .borrow_mut()
            .presence
            .insert(record.peer_id.clone(), record);
        self.document.notify_presence();
        Ok(())
    }

    fn subscribe_to_presence(&mut self, callback: PresenceCallback) -> Subscription {
        let id = self.document.next_subscriber_id();
        let callback = Rc::new(callback);
        self.document
            .inner
            .borrow_mut()
            .presence_subscribers
            .push((id, Rc::clone(&callback)));
        let presence = self.document.presence();
        callback(&presence);
        self.document.cancel_handle(id, true)
    }
}
