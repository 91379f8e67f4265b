use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default collection endpoint base URL
const DEFAULT_BASE_URL: &str = "https://elevini.com/gmdc/app2";

/// Default path of the store script under the base URL
const DEFAULT_SUBMIT_PATH: &str = "/store-data.php";

/// Environment variable name for base URL override
pub const ENV_ENDPOINT: &str = "YARDSCAN_ENDPOINT";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    endpoint: Option<EndpointSection>,
}

#[derive(Debug, Deserialize, Default)]
struct EndpointSection {
    /// Base URL of the collection app (e.g., "https://example.com/app")
    base_url: Option<String>,
    /// Path of the store script (e.g., "/store-data.php")
    path: Option<String>,
}

/// Runtime endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Path starting with `/`
    pub path: String,
    /// Source of the base URL (for logging)
    pub source: ConfigSource,
}

impl EndpointConfig {
    /// Full URL the combined document is posted to
    pub fn submit_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// Where the base URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using the compiled-in endpoint
    Default,
    /// Loaded from config file
    ConfigFile,
    /// Loaded from environment variable
    Environment,
    /// Passed on the command line
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::ConfigFile => write!(f, "config file"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("yardscan").join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
}

/// Load configuration from the config file, if there is a usable one
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::debug!("Loaded config from {:?}", path);
            Some(config)
        }
        Err(e) => {
            tracing::warn!("{:#}", e);
            None
        }
    }
}

fn normalize_base_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with('/') {
        Some(path.to_string())
    } else {
        Some(format!("/{}", path))
    }
}

/// Load endpoint configuration with priority:
/// 1. Command line override
/// 2. Environment variable (YARDSCAN_ENDPOINT)
/// 3. Config file (~/.config/yardscan/config.toml)
/// 4. Default values
///
/// Overrides replace the base URL only; the path comes from the config file
/// or the default.
pub fn load_endpoint_config(cli_override: Option<&str>) -> EndpointConfig {
    let env = std::env::var(ENV_ENDPOINT).ok();
    resolve_endpoint(cli_override, env.as_deref(), load_config_file())
}

fn resolve_endpoint(
    cli_override: Option<&str>,
    env: Option<&str>,
    file: Option<ConfigFile>,
) -> EndpointConfig {
    let section = file.and_then(|f| f.endpoint).unwrap_or_default();

    let path = section
        .path
        .as_deref()
        .and_then(normalize_path)
        .unwrap_or_else(|| DEFAULT_SUBMIT_PATH.to_string());

    let candidates = [
        (cli_override, ConfigSource::CommandLine),
        (env, ConfigSource::Environment),
        (section.base_url.as_deref(), ConfigSource::ConfigFile),
    ];

    for (value, source) in candidates {
        if let Some(base_url) = value.and_then(normalize_base_url) {
            tracing::info!("Using endpoint base URL from {}: {}", source, base_url);
            return EndpointConfig {
                base_url,
                path,
                source,
            };
        }
    }

    tracing::debug!("Using default endpoint base URL: {}", DEFAULT_BASE_URL);
    EndpointConfig {
        base_url: DEFAULT_BASE_URL.to_string(),
        path,
        source: ConfigSource::Default,
    }
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/yardscan/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Yardscan Configuration
# Place this file at: ~/.config/yardscan/config.toml

[endpoint]
# Base URL of the collection app
# Default: https://elevini.com/gmdc/app2
# base_url = "https://your-instance.example.com/app"

# Path of the store script under the base URL
# Default: /store-data.php
# path = "/store-data.php"
"#
    .to_string()
}
