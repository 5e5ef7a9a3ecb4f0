//! SEISbio CLI Entry Point
//!
//! Installs the bioinformatics stack on a Debian/Ubuntu machine.
//!
//! # Usage
//!
//! ```bash
//! # System-wide Mambaforge install under the `seisbio` account
//! sudo seisbio
//!
//! # Miniconda, OS packages first (with a full upgrade)
//! sudo seisbio -d miniconda --system-packages --upgrade
//!
//! # Custom tool list, no questions asked
//! sudo seisbio -p my_tools.txt --yes
//!
//! # Into your own home, without root
//! seisbio --local
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use seisbio::config::{Distribution, InstallMode, Profile, Settings, DEFAULT_ACCOUNT};
use seisbio::execution::{is_root, Outcome, Provisioner, SystemRunner};
use seisbio::prompt::{AssumeYes, Prompter, TerminalPrompter};
use seisbio::{ProvisionError, APP_NAME, VERSION};

/// General installation of the SEISbio bioinformatics stack.
#[derive(Debug, Parser)]
#[command(name = "seisbio", version, about)]
struct Cli {
    /// Scientific software distribution to install
    #[arg(short, long, value_enum, default_value_t = Distribution::Mambaforge)]
    distribution: Distribution,

    /// User and home directory (under /home) owning the installation
    #[arg(long = "home", value_name = "NAME", default_value = DEFAULT_ACCOUNT)]
    account: String,

    /// Explicit uid for the account
    #[arg(long)]
    uid: Option<u32>,

    /// Install helper and bioinformatics packages with apt first
    #[arg(long)]
    system_packages: bool,

    /// Run `apt upgrade` before installing OS packages
    #[arg(long, requires = "system_packages")]
    upgrade: bool,

    /// File listing the tools that get their own environment
    #[arg(short, long, value_name = "FILE")]
    packages: Option<PathBuf>,

    /// Install into the invoking user's home instead of a dedicated account
    #[arg(long, conflicts_with_all = ["account", "uid"])]
    local: bool,

    /// YAML profile overriding the built-in package lists
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Timeout in seconds for installer and environment manager commands
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Bioinformatics Stack Installer");
    println!();
}

/// Builds the run settings from the command line.
fn build_settings(cli: &Cli) -> Result<Settings, ProvisionError> {
    let mut settings = Settings::new(cli.distribution);

    if let Some(path) = &cli.profile {
        settings.apply_profile(Profile::load(path)?)?;
    }

    settings.mode = if cli.local {
        InstallMode::local()?
    } else {
        InstallMode::SystemWide {
            account: cli.account.clone(),
            uid: cli.uid,
        }
    };

    settings.install_os_packages = cli.system_packages;
    settings.upgrade_os = cli.upgrade;
    settings.timeout = Duration::from_secs(cli.timeout);
    if let Some(path) = &cli.packages {
        settings.package_list = path.clone();
    }

    settings.validate(is_root())?;
    Ok(settings)
}

/// Main application entry point.
fn run(cli: Cli) -> Result<(), ProvisionError> {
    let settings = build_settings(&cli)?;

    info!(
        "Installing {} into {}",
        settings.distribution,
        settings.prefix().display()
    );
    info!("Package list: {}", settings.package_list.display());

    let runner = SystemRunner::new()?;
    let mut prompter: Box<dyn Prompter> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalPrompter)
    };

    let mut provisioner = Provisioner::new(settings, &runner, prompter.as_mut());
    let result = provisioner.run();
    println!("{}", provisioner.timeline().summary());

    match result? {
        Outcome::Completed(report) => {
            info!(
                "[END] All packages installed ({} new environments)",
                report.created.len()
            );
        }
        Outcome::Declined => info!("[END] exit program doing nothing!"),
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    print_banner();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
