//! AI narrative insights over an assembled snapshot. Gated behind the
//! `openai` feature; the rest of the pipeline has no model dependency.

pub mod client;
pub mod prompts;

pub use client::*;
pub use prompts::*;
