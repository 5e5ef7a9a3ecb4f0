//! Conda/Mamba Environment Management
//!
//! Wraps the environment manager bundled with the distribution: updating
//! and populating the base prefix, listing named environments and creating
//! one environment per tool.
//!
//! All commands run inside the installing account's [`RunAs`] context and
//! carry the configured timeout.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use super::packages::PackageSpec;
use crate::config::Settings;
use crate::error::Result;
use crate::execution::{CommandRunner, Invocation, RunAs};

/// Named environments reported by `info --envs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvListing {
    names: BTreeSet<String>,
}

impl EnvListing {
    /// Parses the output of `conda info --envs` / `mamba info --envs`.
    ///
    /// Each environment line starts with its name, or with its path when
    /// the environment lives outside the `envs/` directory.
    pub fn parse(output: &str) -> Self {
        let names = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().next())
            .filter_map(|first| {
                if first.starts_with('/') {
                    Path::new(first)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                } else {
                    Some(first.to_string())
                }
            })
            .collect();

        Self { names }
    }

    /// Returns true if an environment called exactly `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Records an environment created after the listing was taken.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Result of ensuring one tool environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvStatus {
    Created(String),
    AlreadyInstalled(String),
}

/// Environment manager of an installed distribution.
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    manager: PathBuf,
    prefix: PathBuf,
    channels: Vec<String>,
    timeout: Duration,
    context: RunAs,
}

impl EnvironmentManager {
    pub fn new(settings: &Settings, context: RunAs) -> Self {
        Self {
            manager: settings.manager_bin(),
            prefix: settings.prefix(),
            channels: settings.channels.clone(),
            timeout: settings.timeout,
            context,
        }
    }

    fn command(&self) -> Invocation {
        self.context.command(&self.manager).timeout(self.timeout)
    }

    /// `<manager> update -p <prefix> -y --all`
    pub fn update_command(&self) -> Invocation {
        self.command()
            .arg("update")
            .arg("-p")
            .arg(self.prefix.display().to_string())
            .args(["-y", "--all"])
    }

    /// `<manager> install -p <prefix> -y <packages…>`
    pub fn install_base_command(&self, packages: &[String]) -> Invocation {
        self.command()
            .arg("install")
            .arg("-p")
            .arg(self.prefix.display().to_string())
            .arg("-y")
            .args(packages)
    }

    /// `<manager> info --envs`
    pub fn list_command(&self) -> Invocation {
        self.command().args(["info", "--envs"])
    }

    /// `<manager> create -n <env> [-c extra…] -c <channel…> <packages…> -y`
    pub fn create_command(&self, spec: &PackageSpec) -> Invocation {
        let mut cmd = self.command().arg("create").arg("-n").arg(spec.env_name());

        if let Some(rule) = spec.rule() {
            for channel in rule.extra_channels {
                cmd = cmd.arg("-c").arg(channel);
            }
        }
        for channel in &self.channels {
            cmd = cmd.arg("-c").arg(channel);
        }

        cmd.args(spec.contents()).arg("-y")
    }

    /// Updates every package of the base prefix.
    pub fn update_base(&self, runner: &dyn CommandRunner) -> Result<()> {
        info!("Updating {}", self.prefix.display());
        runner.run(&self.update_command())
    }

    /// Installs general packages into the base prefix.
    pub fn install_base(&self, runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            debug!("No base packages configured");
            return Ok(());
        }
        info!("Installing {} base packages", packages.len());
        runner.run(&self.install_base_command(packages))
    }

    /// Lists the existing named environments.
    pub fn list_envs(&self, runner: &dyn CommandRunner) -> Result<EnvListing> {
        let output = runner.capture(&self.list_command())?;
        let listing = EnvListing::parse(&output);
        debug!("Found {} existing environments", listing.len());
        Ok(listing)
    }

    /// Creates the environment for `spec` unless `listing` already has it.
    pub fn ensure_env(
        &self,
        runner: &dyn CommandRunner,
        listing: &EnvListing,
        spec: &PackageSpec,
    ) -> Result<EnvStatus> {
        let env_name = spec.env_name();

        if listing.contains(&env_name) {
            info!("[NOT INSTALLING] {}: already installed!", env_name);
            return Ok(EnvStatus::AlreadyInstalled(env_name));
        }

        info!("[INSTALLING] {}", env_name);
        runner.run(&self.create_command(spec))?;
        Ok(EnvStatus::Created(env_name))
    }
}
