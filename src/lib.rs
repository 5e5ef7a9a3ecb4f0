//! SEISbio - Bioinformatics Stack Installer
//!
//! Provisions a Debian/Ubuntu machine with a scientific Python distribution
//! (Mambaforge or Miniconda) owned by a dedicated account, and one isolated
//! environment per bioinformatics tool. Runs are idempotent: every stage
//! checks what already exists and only does the missing work.
//!
//! # Architecture
//!
//! - [`config`]: distribution catalogue, package lists and run settings
//! - [`execution`]: the provisioning engine and external command runner
//! - [`environment`]: conda/mamba environment management and package lists
//! - [`system`]: OS packages and the installation account
//! - [`shell`]: propagation of the shell initialisation block
//! - [`monitoring`]: stage timeline and run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use seisbio::config::{Distribution, Settings};
//! use seisbio::execution::{Provisioner, SystemRunner};
//! use seisbio::prompt::TerminalPrompter;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut settings = Settings::new(Distribution::Miniconda);
//!     settings.install_os_packages = true;
//!
//!     let runner = SystemRunner::new()?;
//!     let mut prompter = TerminalPrompter;
//!     Provisioner::new(settings, &runner, &mut prompter).run()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod prompt;
pub mod shell;
pub mod system;

// Re-export commonly used types
pub use config::{Distribution, InstallMode, Settings};
pub use environment::PackageSpec;
pub use error::{ProvisionError, Result};
pub use execution::{Outcome, Provisioner, SystemRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "SEISbio";
