use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use reqwest::Url;

use crate::storage::LocalStorage;

/// Environment variable read by the CLI for the query endpoint
pub const ENDPOINT_ENV: &str = "PROPERTY_CHAT_API_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_endpoint: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Validate and persist the query endpoint, keeping other settings.
    pub fn save_endpoint(endpoint: &str) -> Result<Url> {
        Self::save_endpoint_to(&Self::get_config_path()?, endpoint)
    }

    /// A config file that fails to parse is left untouched
    pub fn save_endpoint_to(path: &Path, endpoint: &str) -> Result<Url> {
        let url = parse_endpoint(endpoint)?;
        let mut config = Self::load_from(path)?;
        config.api_endpoint = Some(url.to_string());
        config.save_to(path)?;
        Ok(url)
    }

    /// The endpoint to query: an explicit override (flag or environment)
    /// wins over the config file. There is no built-in default.
    pub fn resolve_endpoint(&self, override_endpoint: Option<&str>) -> Result<Url> {
        let raw = override_endpoint
            .or(self.api_endpoint.as_deref())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API endpoint configured. Pass --endpoint, set {}, or run `property-chat set-endpoint <url>`",
                    ENDPOINT_ENV
                )
            })?;

        parse_endpoint(raw)
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => LocalStorage::default_path(),
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log_file {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine local data directory"))?;

        Ok(data_dir.join("property-chat").join("property-chat.log"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("property-chat").join("config.json"))
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid API endpoint '{}'", raw))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("API endpoint must be http or https, got '{}'", other)),
    }
}
