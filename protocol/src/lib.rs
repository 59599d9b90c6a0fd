pub mod codec;
pub mod error;
pub mod presence;
pub mod room;
pub mod room_code;

pub use codec::{decode, encode};
pub use error::{ProtocolError, Result};
pub use presence::{Cursor, PeerId, PresenceMap, PresenceRecord};
pub use room::{IntentEnvelope, Room, RoomConfig, RoomStatus, RoomUpdate};
pub use room_code::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode, is_valid_room_code};
