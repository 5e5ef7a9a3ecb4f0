//! Package List Parsing
//!
//! Reads the list of tools that each get their own named environment and
//! derives environment names from package specifiers.
//!
//! # File Format
//!
//! ```text
//! # pipelines
//! snakePipes
//! samtools
//! hicexplorer=3.2   # pinned
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{ProvisionError, Result};

/// Extra handling for packages that cannot be installed on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageRule {
    /// Package name the rule applies to
    pub package: &'static str,
    /// Packages installed into the same environment
    pub companions: &'static [&'static str],
    /// Channels searched before the default ones
    pub extra_channels: &'static [&'static str],
}

/// Packages with non-default environment contents or channels.
pub const PACKAGE_RULES: &[PackageRule] = &[
    PackageRule {
        package: "hicexplorer",
        companions: &["hic2cool"],
        extra_channels: &[],
    },
    // Created as `snakePipes-env`; older installs named the environment `snakePipes`.
    PackageRule {
        package: "snakePipes",
        companions: &[],
        extra_channels: &["mpi-ie"],
    },
];

/// A package requested in the package list, optionally pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    raw: String,
}

impl PackageSpec {
    /// Creates a specifier from a `name` or `name=version` token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The specifier as written, passed verbatim to the manager.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Package name without version.
    pub fn name(&self) -> &str {
        match self.raw.split_once('=') {
            Some((name, _)) => name,
            None => &self.raw,
        }
    }

    /// Requested version, if pinned.
    pub fn version(&self) -> Option<&str> {
        self.raw.split_once('=').map(|(_, version)| version)
    }

    /// Name of the environment holding this package.
    ///
    /// `samtools` becomes `samtools-env`, `hicexplorer=3.2` becomes
    /// `hicexplorer32-env`.
    pub fn env_name(&self) -> String {
        match self.raw.split_once('=') {
            Some((name, version)) => format!("{}{}-env", name, version.replace('.', "")),
            None => format!("{}-env", self.raw),
        }
    }

    /// Special handling registered for this package, if any.
    pub fn rule(&self) -> Option<&'static PackageRule> {
        PACKAGE_RULES.iter().find(|rule| rule.package == self.name())
    }

    /// Packages to install into the environment, in order.
    pub fn contents(&self) -> Vec<String> {
        let mut contents = vec![self.raw.clone()];
        if let Some(rule) = self.rule() {
            contents.extend(rule.companions.iter().map(|c| c.to_string()));
        }
        contents
    }
}

/// Parses package list text. `origin` is only used in error messages.
pub fn parse_package_list(text: &str, origin: &Path) -> Result<Vec<PackageSpec>> {
    let mut specs = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let record = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        };

        let mut tokens = record.split_whitespace();
        let Some(token) = tokens.next() else {
            continue;
        };

        let error = |reason: String| ProvisionError::PackageList {
            path: origin.to_path_buf(),
            line: index + 1,
            reason,
        };

        if let Some(extra) = tokens.next() {
            return Err(error(format!("unexpected token '{}'", extra)));
        }
        if token.starts_with('=') {
            return Err(error(format!("missing package name in '{}'", token)));
        }
        if let Some((_, version)) = token.split_once('=') {
            if version.is_empty() {
                return Err(error(format!("missing version in '{}'", token)));
            }
            if version.contains('=') {
                return Err(error(format!("expected 'name=version', found '{}'", token)));
            }
        }

        specs.push(PackageSpec::new(token));
    }

    Ok(specs)
}

/// Loads the package list from a file.
pub fn load_package_list(path: &Path) -> Result<Vec<PackageSpec>> {
    let text = fs::read_to_string(path).map_err(|e| ProvisionError::io(path, e))?;

    let specs = parse_package_list(&text, path)?;
    debug!("Read {} packages from {}", specs.len(), path.display());
    Ok(specs)
}
