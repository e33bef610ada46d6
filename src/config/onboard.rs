use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::config::{Config, get_config_path, save_config};

/// Writes a starter configuration file and returns its path
///
/// The file never contains a credential; the API key is expected from
/// `CONFAB_API_KEY` or a later edit. An existing file is kept unless `force`.
pub fn run_onboarding(custom_path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let path = match custom_path {
        Some(path) => path,
        None => get_config_path().context("Could not determine home directory")?,
    };

    if path.exists() && !force {
        bail!(
            "Configuration already exists at {}. Use --force to overwrite it.",
            path.display()
        );
    }

    save_config(&Config::default(), &path)?;

    tracing::debug!(path = %path.display(), "Starter configuration written");
    Ok(path)
}
