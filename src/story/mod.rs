//! Story generation pipeline.
//!
//! Heuristic extraction, template formatting and suggestions run locally; an
//! optional remote model sits in front of them and falls back on any failure.

mod extractor;
mod formatter;
mod generator;
mod remote;
mod suggestions;

pub use extractor::*;
pub use formatter::*;
pub use generator::*;
pub use remote::*;
pub use suggestions::*;
