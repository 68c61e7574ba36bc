use super::types::TranscriptTurn;
use parking_lot::RwLock;
use std::sync::Arc;

/// Append-only list of finalized turns, shared with readers such as a UI
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    turns: Arc<RwLock<Vec<TranscriptTurn>>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add(&self, turn: TranscriptTurn) {
        self.turns.write().push(turn);
    }

    pub fn get_all(&self) -> Vec<TranscriptTurn> {
        self.turns.read().clone()
    }

    pub fn last(&self) -> Option<TranscriptTurn> {
        self.turns.read().last().cloned()
    }

    pub fn clear(&self) {
        self.turns.write().clear();
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}
