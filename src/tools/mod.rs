//! Execution tools
//!
//! Tools never raise: failures are returned as text so the synthesizer can
//! explain them.

pub mod calculator;
pub mod search;

pub use calculator::evaluate;
pub use search::{TavilySearch, WebSearch, DEFAULT_MAX_RESULTS};
