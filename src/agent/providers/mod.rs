//! Concrete [`LlmProvider`](crate::agent::LlmProvider) backends.

mod openai;

pub use openai::OpenAiProvider;
