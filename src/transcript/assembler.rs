use super::storage::TranscriptStore;
use super::types::TranscriptTurn;
use tracing::debug;

/// Accumulates incremental transcription fragments until the server marks
/// the turn complete.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    user: String,
    model: String,
    store: TranscriptStore,
}

impl TranscriptAssembler {
    pub fn new(store: TranscriptStore) -> Self {
        Self {
            user: String::new(),
            model: String::new(),
            store,
        }
    }

    /// Append a user-side fragment exactly as received
    pub fn append_user(&mut self, text: &str) {
        self.user.push_str(text);
    }

    /// Append a model-side fragment exactly as received
    pub fn append_model(&mut self, text: &str) {
        self.model.push_str(text);
    }

    /// Close the current turn.
    ///
    /// Records a turn only if either side has text; both partials are
    /// cleared in every case.
    pub fn complete_turn(&mut self) -> Option<TranscriptTurn> {
        let user = std::mem::take(&mut self.user);
        let model = std::mem::take(&mut self.model);

        if user.is_empty() && model.is_empty() {
            debug!("Dropping empty turn");
            return None;
        }

        let turn = TranscriptTurn::new(user, model);
        self.store.add(turn.clone());
        Some(turn)
    }

    pub fn partial_user(&self) -> &str {
        &self.user
    }

    pub fn partial_model(&self) -> &str {
        &self.model
    }

    pub fn clear_partials(&mut self) {
        self.user.clear();
        self.model.clear();
    }

    /// Forget partials and every finalized turn
    pub fn clear(&mut self) {
        self.clear_partials();
        self.store.clear();
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_concatenate_verbatim() {
        let mut assembler = TranscriptAssembler::default();
        assembler.append_user("hel");
        assembler.append_user("lo ");
        assembler.append_model(" Hi");
        assembler.append_model("!");

        assert_eq!(assembler.partial_user(), "hello ");
        assert_eq!(assembler.partial_model(), " Hi!");
    }

    #[test]
    fn test_complete_turn_records_one_turn_and_clears() {
        let store = TranscriptStore::new();
        let mut assembler = TranscriptAssembler::new(store.clone());
        assembler.append_user("hello");

        let turn = assembler.complete_turn().unwrap();
        assert_eq!(turn.user, "hello");
        assert_eq!(turn.model, "");
        assert_eq!(store.len(), 1);
        assert_eq!(assembler.partial_user(), "");
        assert_eq!(assembler.partial_model(), "");
    }

    #[test]
    fn test_empty_turn_is_dropped() {
        let store = TranscriptStore::new();
        let mut assembler = TranscriptAssembler::new(store.clone());

        assert!(assembler.complete_turn().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_turns_keep_order() {
        let store = TranscriptStore::new();
        let mut assembler = TranscriptAssembler::new(store.clone());

        assembler.append_user("one");
        assembler.complete_turn();
        assembler.append_model("two");
        assembler.complete_turn();

        let turns = store.get_all();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user, "one");
        assert!(!turns[0].has_model());
        assert_eq!(turns[1].model, "two");
        assert!(!turns[1].has_user());

        assembler.clear();
        assert!(store.is_empty());
    }
}
