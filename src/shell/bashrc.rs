//! Shell Initialisation Merge
//!
//! `conda init` writes an initialisation block into the installing
//! account's `.bashrc`. That block is copied into the system-wide shell
//! resource file so every user gets the distribution on their `PATH`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProvisionError, Result};

/// First line of the block written by `conda init`.
pub const INIT_START: &str = "# >>> conda initialize >>>";

/// Last line of the block written by `conda init`.
pub const INIT_END: &str = "# <<< conda initialize <<<";

/// Header written above the merged block.
const ADDED_BY: &str = "# --- Added by SEISbio";

static INIT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        "(?s){}.*?{}",
        regex::escape(INIT_START),
        regex::escape(INIT_END)
    );
    Regex::new(&pattern).expect("init block pattern is valid")
});

/// Returns the first initialisation block of a shell resource file.
pub fn extract_init_block(text: &str) -> Option<&str> {
    INIT_BLOCK.find(text).map(|m| m.as_str())
}

/// Path of the one-time backup of a shell resource file.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".backup");
    path.with_file_name(name)
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ProvisionError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| ProvisionError::io(path, e))
}

/// Copies `path` to its backup unless a backup already exists, then
/// appends an attribution note to the backup.
pub fn backup_system_bashrc(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path);

    if backup.exists() {
        debug!("Keeping existing backup {}", backup.display());
    } else if path.exists() {
        fs::copy(path, &backup).map_err(|e| ProvisionError::io(&backup, e))?;
        info!("Backed up {} to {}", path.display(), backup.display());
    }

    let note = format!(
        "\n\n# --- Backup of {} created\n# --- by SEISbio installation ({})\n",
        path.display(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    append(&backup, &note)?;

    Ok(backup)
}

/// Appends the initialisation block of `user_bashrc` to `system_bashrc`.
///
/// Fails with [`ProvisionError::MissingShellInit`] before touching the
/// system file or its backup when the block is absent. A block already
/// present verbatim in the system file is not appended twice.
pub fn merge_init_block(user_bashrc: &Path, system_bashrc: &Path) -> Result<()> {
    let user_text =
        fs::read_to_string(user_bashrc).map_err(|e| ProvisionError::io(user_bashrc, e))?;

    let block = extract_init_block(&user_text)
        .ok_or_else(|| ProvisionError::MissingShellInit(user_bashrc.to_path_buf()))?;

    let system_text = match fs::read_to_string(system_bashrc) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProvisionError::io(system_bashrc, e)),
    };
    if system_text.contains(block) {
        info!("{} already sources the distribution", system_bashrc.display());
        return Ok(());
    }

    backup_system_bashrc(system_bashrc)?;
    append(system_bashrc, &format!("\n\n{}\n{}\n", ADDED_BY, block))?;

    info!("Updated {}", system_bashrc.display());
    Ok(())
}
