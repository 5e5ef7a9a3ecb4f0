//! Operating System Integration
//!
//! - [`apt`]: OS package installation
//! - [`account`]: the dedicated installation account

pub mod account;
pub mod apt;

pub use account::Account;
pub use apt::{apt_commands, install_os_packages};
