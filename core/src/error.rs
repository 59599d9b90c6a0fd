use thiserror::Error;

use crate::CardId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Unknown card {0}")]
    UnknownCard(CardId),
    #[error("Invalid player id {0}, expected 1 or 2")]
    InvalidPlayer(u8),
    #[error("Card pack {0:?} has no images")]
    EmptyPack(String),
}

pub type Result<T> = core::result::Result<T, GameError>;
