//! Reading briefs for long documents, generated by a local Ollama model or
//! an OpenAI-compatible endpoint.
//!
//! The heavy lifting lives in the `coordination` crate; this crate supplies
//! the concrete generation clients, prompts, configuration and terminal
//! rendering used by the `paperbrief` binary.

pub mod config;
pub mod ollama;
pub mod openai;
pub mod prompts;
pub mod render;
