//! Mock filesystem implementations for testing.
//!
//! This module provides `MockFs`, the time-stepping `ScriptedFs` and pre-built
//! scenarios for exercising readers without a Linux `/proc`.

mod filesystem;
mod scenarios;
mod scripted;

pub use filesystem::MockFs;
pub use scripted::ScriptedFs;
