pub mod client;
pub mod engine;

pub use client::LLMClient;
pub use engine::{ChatMessage, GenerationEngine, Role};
