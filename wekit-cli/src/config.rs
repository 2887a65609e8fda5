/// Stored connection settings: a JSON file at `<config dir>/wekit/config.json`.
///
/// Resolution order for each field is flag, then environment (password
/// only), then the file. A command that still misses something fails with
/// the list of what to provide.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const PASSWORD_ENV: &str = "WEKIT_PASSWORD";
/// Overrides the directory holding `config.json`; mainly for tests.
pub const CONFIG_DIR_ENV: &str = "WEKIT_CONFIG_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.json"));
    }
    let dir = dirs::config_dir().context("no config directory on this platform")?;
    Ok(dir.join("wekit").join("config.json"))
}

pub fn load() -> Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content =
        fs::read_to_string(&path).with_context(|| format!("cannot read {}", path.display()))?;
    let config: CliConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid config at {}", path.display()))?;
    Ok(config)
}

pub fn save(config: &CliConfig) -> Result<PathBuf> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("[wekit.config] wrote {}", path.display());
    Ok(path)
}

/// Settings for one run after merging flags, environment and file.
#[derive(Debug, Clone)]
pub struct Connection {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

pub fn resolve_connection(
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<Connection> {
    let stored = load()?;
    let env_password = std::env::var(PASSWORD_ENV).ok();
    resolve_with(stored, url, username, password, env_password)
}

fn resolve_with(
    stored: CliConfig,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    env_password: Option<String>,
) -> Result<Connection> {
    let base_url = url.or(stored.base_url);
    let username = username.or(stored.username);
    let password = password.or(env_password).or(stored.password);

    let mut missing = Vec::new();
    if base_url.is_none() {
        missing.push("base URL");
    }
    if username.is_none() {
        missing.push("username");
    }
    if password.is_none() {
        missing.push("password");
    }
    if !missing.is_empty() {
        bail!(
            "missing {}; pass flags or run `wekit config init` ({} also works for the password)",
            missing.join(", "),
            PASSWORD_ENV
        );
    }

    Ok(Connection {
        base_url: base_url.unwrap_or_default(),
        username: username.unwrap_or_default(),
        password: password.unwrap_or_default(),
    })
}
