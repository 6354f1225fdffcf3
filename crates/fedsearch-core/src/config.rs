//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys use `__` in env var names (`APP_MEILISEARCH__HOST`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const ENABLE_ADVANCED_SEARCH: &str = "enable_advanced_search";
pub const MINIMUM_RANKING_SCORE: &str = "minimum_ranking_score";
pub const SCHEMA_SETTINGS_DIR: &str = "schema_settings_dir";
pub const REQUEST_TIMEOUT_MS: &str = "request_timeout_ms";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Build a config from a TOML document only. Used by tests and embedders
    /// that manage their own settings.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(toml)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Missing or mistyped keys fall back to `default`.
    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        self.get(key).unwrap_or(default)
    }

    pub fn advanced_search_enabled(&self) -> bool {
        self.get_or(ENABLE_ADVANCED_SEARCH, false)
    }

    pub fn minimum_ranking_score(&self) -> f64 {
        self.get_or(MINIMUM_RANKING_SCORE, 0.0)
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.get_or(REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS)
    }

    pub fn schema_settings_dir(&self) -> Option<PathBuf> {
        self.get::<String>(SCHEMA_SETTINGS_DIR).ok().map(expand_path)
    }

    fn validate(&self) -> Result<()> {
        if self.minimum_ranking_score() < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{} must not be negative",
                MINIMUM_RANKING_SCORE
            )));
        }
        if self.request_timeout_ms() == 0 {
            return Err(Error::InvalidConfig(format!("{} must be positive", REQUEST_TIMEOUT_MS)));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { figment: Figment::new() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
