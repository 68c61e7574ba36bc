pub mod assembler;
pub mod storage;
pub mod types;

pub use assembler::TranscriptAssembler;
pub use storage::TranscriptStore;
pub use types::TranscriptTurn;
