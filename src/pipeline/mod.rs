//! Question → statement → answer
//!
//! The two model-backed stages of a turn. Both are plain async functions
//! generic over [`LanguageModel`](crate::llm::LanguageModel); the session
//! owns the model and passes it in.

pub mod interpreter;
pub mod synthesizer;

pub use interpreter::{Answer, NO_DATA_ANSWER, interpret};
pub use synthesizer::{DECLINE_SENTINEL, synthesize};
