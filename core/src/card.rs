use serde::{Deserialize, Serialize};

use crate::*;

/// One physical slot on the board.
///
/// A card only moves forward `unflipped -> flipped -> matched`; the sole way
/// back is a new board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub image_id: ImageId,
    pub is_flipped: bool,
    pub is_matched: bool,
    pub matched_by_player_id: Option<PlayerId>,
}

impl Card {
    pub fn new(id: CardId, image_id: impl Into<ImageId>) -> Self {
        Self {
            id,
            image_id: image_id.into(),
            is_flipped: false,
            is_matched: false,
            matched_by_player_id: None,
        }
    }

    /// Face up and still waiting for its pair to be evaluated.
    pub const fn is_pending(&self) -> bool {
        self.is_flipped && !self.is_matched
    }

    pub const fn is_face_down(&self) -> bool {
        !self.is_flipped && !self.is_matched
    }

    pub fn is_pair_of(&self, other: &Card) -> bool {
        self.id != other.id && self.image_id == other.image_id
    }
}
