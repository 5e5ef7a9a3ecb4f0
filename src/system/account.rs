//! Dedicated Installation Account
//!
//! The distribution is owned by an unprivileged account whose home lives
//! under the home root. The account is created with `adduser` (which asks
//! for its password) and never removed by this program.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{ProvisionError, Result};
use crate::execution::{CommandRunner, Identity, Invocation};

/// Mode applied to a freshly created home so every user can reach the
/// distribution.
const HOME_MODE: u32 = 0o755;

/// System account the distribution is installed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    name: String,
    home: PathBuf,
    uid: Option<u32>,
}

impl Account {
    pub fn new(name: impl Into<String>, home_root: &Path, uid: Option<u32>) -> Self {
        let name = name.into();
        let home = home_root.join(&name);
        Self { name, home, uid }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// An account is considered present when its home directory exists.
    pub fn exists(&self) -> bool {
        self.home.is_dir()
    }

    /// `adduser --shell /bin/bash [--uid N] --gecos '' <name>`
    pub fn create_command(&self) -> Invocation {
        let mut cmd = Invocation::new("adduser").args(["--shell", "/bin/bash"]);
        if let Some(uid) = self.uid {
            cmd = cmd.arg("--uid").arg(uid.to_string());
        }
        cmd.args(["--gecos", ""]).arg(&self.name)
    }

    /// Creates the account and returns its identity.
    pub fn create(&self, runner: &dyn CommandRunner) -> Result<Identity> {
        info!("Creating {} user and asking for a password.", self.name);
        runner.run(&self.create_command())?;

        fs::set_permissions(&self.home, fs::Permissions::from_mode(HOME_MODE))
            .map_err(|e| ProvisionError::io(&self.home, e))?;

        let identity = self.identity()?;
        info!(
            "{} user created (uid {}, gid {})",
            self.name, identity.uid, identity.gid
        );
        Ok(identity)
    }

    /// Identity owning the home directory.
    ///
    /// Fails when an explicit uid was requested and the home belongs to
    /// somebody else.
    pub fn identity(&self) -> Result<Identity> {
        let identity = Identity::owner_of(&self.home)?;

        if let Some(expected) = self.uid {
            if expected != identity.uid.as_raw() {
                return Err(ProvisionError::AccountMismatch {
                    name: self.name.clone(),
                    expected,
                    found: identity.uid.as_raw(),
                });
            }
        }

        Ok(identity)
    }
}
