use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context as _;
use ffmpeg_pump::Rounding;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the file server binds to.
    pub listen: SocketAddr,
    /// Rounding used by `rescale` when none is given on the command line.
    pub rounding: Rounding,
    /// Log level applied when `RUST_LOG` is not set.
    pub log_level: log::LevelFilter,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rounding: Rounding::NearInf,
            log_level: log::LevelFilter::Info,
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the process-wide config once; later calls return the first value.
pub fn load(path: Option<&Path>) -> anyhow::Result<&'static AppConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = match path {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    Ok(CONFIG.get_or_init(|| config))
}

pub fn config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{"listen":"127.0.0.1:9000","rounding":"down"}"#)
            .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.rounding, Rounding::Down);
        assert_eq!(config.log_level, log::LevelFilter::Info);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn unknown_rounding_is_rejected() {
        assert!(AppConfig::from_json(r#"{"rounding":"sideways"}"#).is_err());
    }
}
