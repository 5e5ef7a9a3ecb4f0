//! Provisioning Configuration
//!
//! Holds the distribution catalogue, the package lists installed by the
//! OS and base-environment stages, and the immutable [`Settings`] value a
//! provisioning run is driven by.
//!
//! Package lists can be overridden with a YAML profile:
//!
//! ```yaml
//! base_packages: [numpy, scipy, pandas]
//! channels: [bioconda, conda-forge]
//! os_packages:
//!   basic: [vim, htop]
//!   bioinformatics: [emboss, ncbi-blast+]
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{ProvisionError, Result};

/// Default account (and home directory) name.
pub const DEFAULT_ACCOUNT: &str = "seisbio";

/// Default parent directory of account homes.
pub const DEFAULT_HOME_ROOT: &str = "/home";

/// Default system-wide shell resource file.
pub const DEFAULT_SYSTEM_BASHRC: &str = "/etc/bash.bashrc";

/// Default timeout for installer and environment manager invocations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Name of the package list shipped with the program.
pub const PACKAGE_LIST_FILE: &str = "packages.txt";

/// Utilities installed by the OS package stage.
pub const BASIC_OS_PACKAGES: &[&str] = &["emacs", "vim", "lm-sensors", "htop", "aptitude"];

/// Bioinformatics tools installed from the OS repositories.
pub const BIOINFO_OS_PACKAGES: &[&str] = &[
    "emboss", "ncbi-blast+", "hmmer", "t-coffee", "muscle", "probcons", "phylip", "phyml",
    "raxml", "mrbayes", "seaview", "clustalo",
];

/// General scientific packages installed into the base environment.
pub const BASE_PACKAGES: &[&str] = &[
    "numpy",
    "scipy",
    "matplotlib",
    "pandas",
    "statsmodels",
    "seaborn",
    "biopython",
    "scikit-learn",
    "scikit-image",
    "networkx",
    "jupyter",
    "spyder",
    "orange3",
    "keras",
    "jupyterlab",
];

/// Channels every tool environment is created from, in priority order.
pub const DEFAULT_CHANNELS: &[&str] = &["bioconda", "conda-forge"];

/// Lazily-resolved path of the package list shipped with the program.
pub static DEFAULT_PACKAGE_LIST: Lazy<PathBuf> = Lazy::new(|| {
    // Priority 1: next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let prod_path = exe_dir.join(PACKAGE_LIST_FILE);
            if prod_path.exists() {
                debug!("Using bundled package list: {}", prod_path.display());
                return prod_path;
            }
        }
    }

    // Priority 2: source tree
    let dev_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("runtime")
        .join(PACKAGE_LIST_FILE);

    if dev_path.exists() {
        debug!("Using development package list: {}", dev_path.display());
        return dev_path;
    }

    // Priority 3: current working directory
    PathBuf::from(PACKAGE_LIST_FILE)
});

/// Scientific Python distributions that can be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    /// conda-forge based distribution shipping `mamba`
    Mambaforge,
    /// Anaconda's minimal distribution shipping `conda`
    Miniconda,
}

impl Distribution {
    /// Directory name of the installation inside the account home.
    pub fn name(self) -> &'static str {
        match self {
            Self::Mambaforge => "mambaforge",
            Self::Miniconda => "miniconda",
        }
    }

    /// Environment manager binary used for update/install/create.
    pub fn manager(self) -> &'static str {
        match self {
            Self::Mambaforge => "mamba",
            Self::Miniconda => "conda",
        }
    }

    /// URL of the latest Linux x86_64 installer.
    pub fn installer_url(self) -> &'static str {
        match self {
            Self::Mambaforge => {
                "https://github.com/conda-forge/miniforge/releases/latest/download/Mambaforge-Linux-x86_64.sh"
            }
            Self::Miniconda => "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh",
        }
    }

    /// File name the installer is saved under.
    pub fn installer_file(self) -> &'static str {
        let url = self.installer_url();
        url.rsplit('/').next().unwrap_or(url)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Distribution {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mambaforge" => Ok(Self::Mambaforge),
            "miniconda" => Ok(Self::Miniconda),
            other => Err(ProvisionError::UnknownDistribution(other.to_string())),
        }
    }
}

/// OS package lists of a profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsPackages {
    pub basic: Option<Vec<String>>,
    pub bioinformatics: Option<Vec<String>>,
}

/// Optional YAML overrides for the built-in package lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub distribution: Option<String>,
    pub base_packages: Option<Vec<String>>,
    pub channels: Option<Vec<String>>,
    pub os_packages: OsPackages,
}

impl Profile {
    /// Loads a profile from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ProvisionError::io(path, e))?;
        let profile: Profile =
            serde_yaml::from_str(&content).map_err(|source| ProvisionError::Profile {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded profile: {}", path.display());
        Ok(profile)
    }
}

/// Where the distribution gets installed and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMode {
    /// Dedicated account under the home root, commands demoted to it.
    SystemWide { account: String, uid: Option<u32> },
    /// Invoking user's own home, no demotion, no system shell file changes.
    Local { home: PathBuf },
}

impl InstallMode {
    /// Local installation into the invoking user's home directory.
    pub fn local() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            ProvisionError::InvalidOptions(
                "--local needs a home directory for the current user".to_string(),
            )
        })?;
        Ok(Self::Local { home })
    }
}

/// Immutable configuration of a provisioning run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub distribution: Distribution,
    pub mode: InstallMode,
    pub install_os_packages: bool,
    pub upgrade_os: bool,
    pub package_list: PathBuf,
    pub home_root: PathBuf,
    pub system_bashrc: PathBuf,
    pub timeout: Duration,
    pub basic_os_packages: Vec<String>,
    pub bioinfo_os_packages: Vec<String>,
    pub base_packages: Vec<String>,
    pub channels: Vec<String>,
}

impl Settings {
    /// Creates settings with the built-in defaults for a system-wide install.
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            mode: InstallMode::SystemWide {
                account: DEFAULT_ACCOUNT.to_string(),
                uid: None,
            },
            install_os_packages: false,
            upgrade_os: false,
            package_list: DEFAULT_PACKAGE_LIST.to_path_buf(),
            home_root: PathBuf::from(DEFAULT_HOME_ROOT),
            system_bashrc: PathBuf::from(DEFAULT_SYSTEM_BASHRC),
            timeout: DEFAULT_TIMEOUT,
            basic_os_packages: to_owned_list(BASIC_OS_PACKAGES),
            bioinfo_os_packages: to_owned_list(BIOINFO_OS_PACKAGES),
            base_packages: to_owned_list(BASE_PACKAGES),
            channels: to_owned_list(DEFAULT_CHANNELS),
        }
    }

    /// Applies the overrides of a profile.
    pub fn apply_profile(&mut self, profile: Profile) -> Result<()> {
        if let Some(name) = profile.distribution {
            self.distribution = name.parse()?;
        }
        if let Some(packages) = profile.base_packages {
            self.base_packages = packages;
        }
        if let Some(channels) = profile.channels {
            if channels.is_empty() {
                return Err(ProvisionError::InvalidOptions(
                    "profile lists no channels".to_string(),
                ));
            }
            self.channels = channels;
        }
        if let Some(packages) = profile.os_packages.basic {
            self.basic_os_packages = packages;
        }
        if let Some(packages) = profile.os_packages.bioinformatics {
            self.bioinfo_os_packages = packages;
        }
        Ok(())
    }

    /// Checks flag combinations that can never succeed.
    pub fn validate(&self, is_root: bool) -> Result<()> {
        if self.upgrade_os && !self.install_os_packages {
            return Err(ProvisionError::InvalidOptions(
                "--upgrade only applies together with --system-packages".to_string(),
            ));
        }

        match &self.mode {
            InstallMode::SystemWide { account, .. } => {
                if account.is_empty() || account.contains('/') {
                    return Err(ProvisionError::InvalidOptions(format!(
                        "invalid account name '{}'",
                        account
                    )));
                }
                if !is_root {
                    return Err(ProvisionError::NotRoot);
                }
            }
            InstallMode::Local { .. } => {
                if self.install_os_packages && !is_root {
                    return Err(ProvisionError::InvalidOptions(
                        "installing OS packages requires root, even with --local".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Home directory the distribution is installed into.
    pub fn home(&self) -> PathBuf {
        match &self.mode {
            InstallMode::SystemWide { account, .. } => self.home_root.join(account),
            InstallMode::Local { home } => home.clone(),
        }
    }

    /// Installation prefix of the distribution.
    pub fn prefix(&self) -> PathBuf {
        self.home().join(self.distribution.name())
    }

    /// Path of the environment manager binary.
    pub fn manager_bin(&self) -> PathBuf {
        self.prefix().join("bin").join(self.distribution.manager())
    }

    /// Path of the `conda` binary, used for shell initialisation.
    pub fn conda_bin(&self) -> PathBuf {
        self.prefix().join("bin").join("conda")
    }

    /// Path the installer script is downloaded to.
    pub fn installer_path(&self) -> PathBuf {
        self.home().join(self.distribution.installer_file())
    }

    /// Shell resource file of the installing account.
    pub fn user_bashrc(&self) -> PathBuf {
        self.home().join(".bashrc")
    }

    /// Returns true for installs into a dedicated account.
    pub fn is_system_wide(&self) -> bool {
        matches!(self.mode, InstallMode::SystemWide { .. })
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
