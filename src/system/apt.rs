//! OS Package Installation (Debian/Ubuntu)
//!
//! Installs helper utilities and the bioinformatics tools packaged by the
//! distribution repositories. Runs as the invoking (root) user.

use log::info;

use crate::config::Settings;
use crate::error::Result;
use crate::execution::{CommandRunner, Invocation};

const APT: &str = "apt";

/// Commands of the OS package stage, in execution order.
pub fn apt_commands(settings: &Settings) -> Vec<Invocation> {
    let mut commands = vec![Invocation::new(APT).arg("update")];

    if settings.upgrade_os {
        commands.push(Invocation::new(APT).args(["upgrade", "-y"]));
    }

    for packages in [&settings.basic_os_packages, &settings.bioinfo_os_packages] {
        if !packages.is_empty() {
            commands.push(Invocation::new(APT).args(["install", "-y"]).args(packages));
        }
    }

    commands
}

/// Updates the package index and installs the configured OS packages.
pub fn install_os_packages(runner: &dyn CommandRunner, settings: &Settings) -> Result<()> {
    if settings.upgrade_os {
        info!("Updating and upgrading system (Debian/Ubuntu)");
    } else {
        info!("Updating package index (Debian/Ubuntu)");
    }

    for command in apt_commands(settings) {
        runner.run(&command)?;
    }

    info!(
        "Installed {} helper and {} bioinformatics packages from repositories",
        settings.basic_os_packages.len(),
        settings.bioinfo_os_packages.len()
    );
    Ok(())
}
