//! Life-safety screening for inbound patient messages.
//!
//! The screen is independent of the message's apparent intent and runs
//! before any interaction-specific logic. A positive screen short-circuits
//! the whole pipeline into an emergency escalation.

pub mod keywords;
pub mod screen;

pub use screen::{screen_message, ScreenResult};
