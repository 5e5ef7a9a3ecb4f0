//! Privilege Demotion
//!
//! Commands that must run as the dedicated account carry an [`Identity`].
//! The runner applies its gid and then its uid in the child process before
//! `exec`; the group has to be changed first, while the process still has
//! the privilege to do so.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid};

use super::command::{EnvOverrides, Invocation};
use crate::error::{ProvisionError, Result};

/// Numeric user and group a command is demoted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
}

impl Identity {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(gid),
        }
    }

    /// Identity owning a path, typically an account's home directory.
    pub fn owner_of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| ProvisionError::io(path, e))?;
        Ok(Self::new(metadata.uid(), metadata.gid()))
    }
}

/// Account context demoted commands run in.
///
/// Carries the identity, the home directory used as working directory and
/// the `HOME` override handed to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    home: PathBuf,
    identity: Option<Identity>,
    env: EnvOverrides,
}

impl RunAs {
    pub fn new(home: impl Into<PathBuf>, identity: Option<Identity>) -> Self {
        let home = home.into();
        let mut env = EnvOverrides::new();
        env.insert("HOME".to_string(), home.display().to_string());
        Self { home, identity, env }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    /// Starts an invocation of `program` inside this context.
    pub fn command(&self, program: impl AsRef<Path>) -> Invocation {
        Invocation::new(program)
            .envs(&self.env)
            .current_dir(&self.home)
            .demote(self.identity)
    }
}

/// Returns true when the effective user is root.
pub fn is_root() -> bool {
    Uid::effective().is_root()
}
