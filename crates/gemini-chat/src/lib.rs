//! A small client for the Gemini `generateContent` REST endpoint with
//! multi-turn chat sessions on top.

pub mod client;
pub mod error;
pub mod types;

pub use client::config::{Config, ConfigBuilder};
pub use client::stats::Stats;
pub use client::{Chat, GeminiClient};
pub use error::GeminiError;
