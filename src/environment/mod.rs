//! Environment Management Module
//!
//! Handles the distribution's environment manager and the package list
//! that drives per-tool environment creation.

pub mod conda;
pub mod packages;

pub use conda::{EnvListing, EnvStatus, EnvironmentManager};
pub use packages::{load_package_list, parse_package_list, PackageRule, PackageSpec, PACKAGE_RULES};
