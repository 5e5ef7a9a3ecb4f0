//! Execution Module
//!
//! Runs the provisioning pipeline and the external commands it is made of.
//!
//! # Architecture
//!
//! - [`engine`]: the [`Provisioner`] driving the stages in order
//! - [`command`]: external command description and execution
//! - [`privilege`]: demotion to the installing account

pub mod command;
pub mod engine;
pub mod privilege;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandRunner, EnvOverrides, Invocation, SystemRunner};
pub use engine::{Outcome, Provisioner};
pub use privilege::{is_root, Identity, RunAs};
