use thiserror::Error;

use crate::types::OwnerId;

#[derive(Error, Debug)]
pub enum LadderError {
    #[error("Invalid player tag: {0}")]
    InvalidTag(String),

    #[error("Player tag {tag} is already linked to {owner}")]
    AlreadyLinked { tag: String, owner: OwnerId },

    #[error("Player tag {0} is not linked")]
    NotLinked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl LadderError {
    /// Rejections an admin caller should see, as opposed to system faults.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTag(_) | Self::AlreadyLinked { .. } | Self::NotLinked(_)
        )
    }
}
