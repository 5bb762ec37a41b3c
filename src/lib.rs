//! Multi-model LLM consensus oracle for prediction market resolution.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod engine;
pub mod llm;
pub mod types;
