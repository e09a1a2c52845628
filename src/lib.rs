//! Interactive prompt workshop for text-to-image generation
//!
//! A chat model refines a short topic into a detailed image prompt, the
//! user edits that prompt, and an image provider renders it into a
//! session-scoped gallery that can be saved to disk.

pub mod ai;
pub mod app;
pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod image;
pub mod models;
pub mod prompts;
pub mod render;
pub mod session;

pub use error::{Error, Result};
