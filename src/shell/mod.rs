//! Shell Integration Module
//!
//! Propagates the distribution's shell initialisation to all users.

pub mod bashrc;

pub use bashrc::{backup_path, extract_init_block, merge_init_block, INIT_END, INIT_START};
