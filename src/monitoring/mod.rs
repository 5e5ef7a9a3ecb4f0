//! Progress Monitoring Module
//!
//! Tracks the provisioning stages of a run.
//!
//! # Components
//!
//! - [`StageTimeline`]: stage results and durations for the final summary

pub mod timeline;

pub use timeline::{Stage, StageRecord, StageResult, StageTimeline};
