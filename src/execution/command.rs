//! External Command Execution
//!
//! Every stage talks to the outside world (`apt`, `wget`, the installer,
//! the environment manager) through the [`CommandRunner`] trait, so the
//! provisioning logic can be exercised without root or network access.
//!
//! [`SystemRunner`] is the production implementation. It drives child
//! processes on a current-thread tokio runtime, one at a time, killing a
//! child whose invocation carries a timeout that expires.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use log::debug;
use tokio::runtime::{Builder, Runtime};

use super::privilege::Identity;
use crate::error::{ProvisionError, Result};

/// Environment variables set on top of the inherited environment.
pub type EnvOverrides = BTreeMap<String, String>;

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvOverrides,
    pub current_dir: Option<PathBuf>,
    pub identity: Option<Identity>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().display().to_string(),
            args: Vec::new(),
            env: EnvOverrides::new(),
            current_dir: None,
            identity: None,
            timeout: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    /// Sets the environment overrides.
    pub fn envs(mut self, env: &EnvOverrides) -> Self {
        self.env = env.clone();
        self
    }

    /// Runs the command from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Runs the command as `identity` instead of the calling user.
    pub fn demote(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Kills the command and fails if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns true if any argument equals `value`.
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a == value)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes external commands to completion.
pub trait CommandRunner {
    /// Runs a command with inherited stdio. Fails on non-zero exit.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Runs a command and returns its standard output. Fails on non-zero exit.
    fn capture(&self, invocation: &Invocation) -> Result<String>;
}

/// Runs commands as real child processes.
pub struct SystemRunner {
    runtime: Runtime,
}

impl SystemRunner {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProvisionError::io("tokio runtime", e))?;
        Ok(Self { runtime })
    }

    fn execute(&self, invocation: &Invocation, capture: bool) -> Result<Output> {
        debug!("$ {}", invocation);

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .kill_on_drop(true);

        if capture {
            cmd.stdout(Stdio::piped());
        }
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }
        if let Some(identity) = invocation.identity {
            cmd.gid(identity.gid.as_raw());
            cmd.uid(identity.uid.as_raw());
        }

        let program = invocation.program.clone();
        let output = self.runtime.block_on(async {
            let child = cmd.spawn().map_err(|source| ProvisionError::Spawn {
                program: program.clone(),
                source,
            })?;

            let waited = match invocation.timeout {
                // Dropping the timed-out future drops the child, which kills it.
                Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                    .await
                    .map_err(|_| ProvisionError::CommandTimedOut {
                        program: program.clone(),
                        secs: limit.as_secs(),
                    })?,
                None => child.wait_with_output().await,
            };

            waited.map_err(|source| ProvisionError::Spawn {
                program: program.clone(),
                source,
            })
        })?;

        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                program,
                code: output.status.code(),
            });
        }

        Ok(output)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.execute(invocation, false).map(|_| ())
    }

    fn capture(&self, invocation: &Invocation) -> Result<String> {
        let output = self.execute(invocation, true)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
