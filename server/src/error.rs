//! Error types for the authority.
//!
//! Only identifier resolution and I/O surface as errors. Ordinary gameplay
//! conditions inside a tick are represented by `Option`/empty results.

use shared::{EffectId, SpellId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no such minigame: {0}")]
    UnknownMiniGame(String),

    #[error("no such spell: {0}")]
    UnknownSpell(SpellId),

    #[error("no such status effect: {0}")]
    UnknownEffect(EffectId),

    #[error("no such level: {0}")]
    UnknownLevel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
