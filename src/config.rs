//! Configuration for the powchain service.
//!
//! Read from an optional TOML file; every key has a default, so a missing
//! file or a partial one is fine. Command-line flags are applied on top by the
//! binary.

use crate::error::Result;
use crate::logging::LogFormat;
use crate::pow::ProofOfWork;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainConfig {
    pub genesis_data: String,
    /// Cap on proof candidates per mining request. Unbounded when absent.
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub level: String,
    /// `pretty` or `json`; anything else is rejected when the file is parsed.
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_data: default_genesis_data(),
            max_attempts: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

impl ChainConfig {
    /// Search settings for the configured chain.
    pub fn proof_of_work(&self) -> ProofOfWork {
        match self.max_attempts {
            Some(max) => ProofOfWork::new().with_max_attempts(max),
            None => ProofOfWork::new(),
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                let config = Self::from_toml(&text)?;
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_genesis_data() -> String {
    "Genesis block".to_string()
}

fn default_log_level() -> String {
    "powchain=info,tower_http=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.chain.genesis_data, "Genesis block");
        assert_eq!(config.chain.max_attempts, None);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml("[chain]\nmax_attempts = 5000\n").unwrap();
        assert_eq!(config.chain.max_attempts, Some(5000));
        assert_eq!(config.chain.genesis_data, "Genesis block");
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.chain.proof_of_work().max_attempts(), Some(5000));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nbind = \"0.0.0.0:8080\"\n\n[logging]\nformat = \"json\""
        )
        .unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml("[server\nbind = 1").is_err());
    }

    #[test]
    fn unknown_log_format_is_an_error() {
        let err = Config::from_toml("[logging]\nformat = \"jsno\"\n").unwrap_err();
        assert!(err.to_string().contains("jsno"), "{}", err);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }
}
