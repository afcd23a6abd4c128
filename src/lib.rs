//! llm-bridge - bridges a synchronous game scripting environment to LLM backends
//!
//! This crate provides:
//! - Bridge with exported host functions and a polling correlation table
//! - Text sanitizer for the host's string syntax
//! - Middleman proxy normalizing OpenRouter and Ollama behind one endpoint

pub mod bridge;
pub mod cli;
pub mod config;
pub mod providers;
pub mod server;

pub use bridge::Bridge;
pub use config::Config;
