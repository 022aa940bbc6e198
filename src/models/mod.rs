//! Data models for the SafeScript application.
//!
//! Field names serialize in camelCase to match the browser client's payloads.

mod story;
mod team;

pub use story::*;
pub use team::*;
