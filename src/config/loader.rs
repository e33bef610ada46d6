use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Values given on the command line; they override every other layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub listen: Option<String>,
    pub database_url: Option<String>,
    pub model: Option<String>,
}

/// Loads the configuration: defaults < file < environment < CLI
pub fn load_config(overrides: &CliOverrides) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    let config_file = overrides
        .config_path
        .clone()
        .or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = merge_config_from_file(config, path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    tracing::debug!("Applying environment variable overrides");
    config = merge_env_variables(config);

    apply_cli_overrides(&mut config, overrides);

    let summary = config.get_safe_summary();
    tracing::debug!(
        api_key_configured = summary.api_key_configured,
        model = %summary.model,
        listen = %summary.listen,
        in_memory_store = summary.in_memory_store,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(ref listen) = overrides.listen {
        tracing::debug!(listen = %listen, "Applying CLI listen override");
        config.listen = listen.clone();
    }
    if let Some(ref url) = overrides.database_url {
        tracing::debug!("Applying CLI database override");
        config.database_url = url.clone();
    }
    if let Some(ref model) = overrides.model {
        tracing::debug!(model = %model, "Applying CLI model override");
        config.provider.model = model.clone();
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".confab").join("config.json"))
}

fn merge_config_from_file(config: Config, path: &Path) -> Result<Config> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(e).context("Failed to read metadata for config file"),
    };

    let mode = metadata.permissions().mode() & 0o777;
    if mode != 0o600 {
        tracing::error!(
            "Config file {:?} has permissions {:o}, expected 0600 - skipping for security",
            path,
            mode
        );
        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file_config: Config = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;

    Ok(file_config)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn merge_env_variables(mut config: Config) -> Config {
    if let Some(key) = env_value("CONFAB_API_KEY").or_else(|| env_value("DEEPSEEK_API_KEY")) {
        config.provider.api_key = Some(key);
    }
    if let Some(url) = env_value("CONFAB_BASE_URL") {
        config.provider.base_url = url;
    }
    if let Some(model) = env_value("CONFAB_MODEL") {
        config.provider.model = model;
    }
    if let Some(url) = env_value("CONFAB_DATABASE_URL") {
        config.database_url = url;
    }
    if let Some(listen) = env_value("CONFAB_LISTEN") {
        config.listen = listen;
    }
    config
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(config)?;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create config file: {:?}", path))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to set permissions on config file: {:?}", path))?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn get_config_path() -> Option<PathBuf> {
    get_default_config_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "CONFAB_API_KEY",
        "DEEPSEEK_API_KEY",
        "CONFAB_BASE_URL",
        "CONFAB_MODEL",
        "CONFAB_DATABASE_URL",
        "CONFAB_LISTEN",
    ];

    fn clear_env() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    fn overrides_for(path: PathBuf) -> CliOverrides {
        CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn test_load_config_defaults() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config = load_config(&overrides_for(temp_dir.path().join("missing.json"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut file_config = Config::default();
        file_config.provider.api_key = Some("file-key".to_string());
        file_config.listen = "0.0.0.0:9000".to_string();
        save_config(&file_config, &config_path).unwrap();

        let loaded = load_config(&overrides_for(config_path)).unwrap();
        assert_eq!(loaded.provider.api_key.as_deref(), Some("file-key"));
        assert_eq!(loaded.listen, "0.0.0.0:9000");
    }

    #[test]
    fn test_load_config_skips_world_readable_file() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, r#"{"listen":"0.0.0.0:1"}"#).unwrap();
        let mut perms = fs::metadata(&config_path).unwrap().permissions();
        perms.set_mode(0o644);
        fs::set_permissions(&config_path, perms).unwrap();

        let loaded = load_config(&overrides_for(config_path)).unwrap();
        assert_eq!(loaded.listen, Config::default().listen);
    }

    #[test]
    fn test_load_config_invalid_json() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "not valid json").unwrap();
        let mut perms = fs::metadata(&config_path).unwrap().permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&config_path, perms).unwrap();

        let err = load_config(&overrides_for(config_path)).unwrap_err();
        assert!(format!("{}", err).contains("invalid JSON"));
    }

    #[test]
    fn test_config_hierarchy_precedence() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut file_config = Config::default();
        file_config.provider.api_key = Some("file-key".to_string());
        file_config.provider.model = "file-model".to_string();
        file_config.database_url = "sqlite://file.db".to_string();
        save_config(&file_config, &config_path).unwrap();

        unsafe {
            env::set_var("CONFAB_API_KEY", "env-key");
            env::set_var("CONFAB_MODEL", "env-model");
        }

        let overrides = CliOverrides {
            config_path: Some(config_path),
            model: Some("cli-model".to_string()),
            ..CliOverrides::default()
        };
        let config = load_config(&overrides).unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.provider.model, "cli-model");
        assert_eq!(config.database_url, "sqlite://file.db");

        clear_env();
    }

    #[test]
    fn test_deepseek_key_fallback_and_empty_values_ignored() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        unsafe {
            env::set_var("CONFAB_API_KEY", "  ");
            env::set_var("DEEPSEEK_API_KEY", "ds-key");
        }

        let config = load_config(&overrides_for(temp_dir.path().join("none.json"))).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("ds-key"));

        clear_env();
    }

    #[test]
    fn test_save_config_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        save_config(&Config::default(), &config_path).unwrap();

        let mode = fs::metadata(&config_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Config file should have 0600 permissions");
    }

    #[test]
    fn test_get_config_path() {
        let path = get_config_path().unwrap();
        assert!(path.to_string_lossy().contains(".confab"));
        assert!(path.to_string_lossy().ends_with("config.json"));
    }
}
