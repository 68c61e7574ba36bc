use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One finalized exchange: what the user said and what the model answered.
/// Either side may be empty, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub id: Uuid,
    pub user: String,
    pub model: String,
    pub completed_at: DateTime<Utc>,
}

impl TranscriptTurn {
    pub fn new(user: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            model: model.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn has_user(&self) -> bool {
        !self.user.is_empty()
    }

    pub fn has_model(&self) -> bool {
        !self.model.is_empty()
    }
}
