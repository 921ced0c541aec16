//! Configuration file parser for ~/.config/mite/config.toml.
//!
//! The file is optional and every key has a default.
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `feeds.json` and the stored feed contents.
    /// `None` = `~/.local/share/mite`.
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout applied to every fetch, discovery and poll.
    pub request_timeout_secs: u64,

    /// Maximum number of redirects followed before a request fails.
    pub max_redirects: usize,

    /// How many subscriptions `mite poll` refreshes at once.
    pub max_concurrent_polls: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            request_timeout_secs: 30,
            max_redirects: 10,
            max_concurrent_polls: 8,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] = [
        "data_dir",
        "request_timeout_secs",
        "max_redirects",
        "max_concurrent_polls",
    ];

    /// Reads `path`, falling back to defaults when it does not exist.
    ///
    /// An empty file is the same as no file. Keys mite does not know are
    /// logged and ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        // SEC-014: Read one byte past the limit so oversize files are detected without loading them
        let mut content = String::new();
        file.take(Self::MAX_FILE_SIZE + 1).read_to_string(&mut content)?;
        if content.len() as u64 > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} exceeds {} bytes",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }

        let table: toml::Table = content.parse()?;
        for key in table.keys().filter(|key| !Self::KNOWN_KEYS.contains(&key.as_str())) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }

    /// Resolves the data directory, falling back to `$HOME/.local/share/mite`.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".local").join("share").join("mite"))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.max_concurrent_polls, 8);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("request_timeout_secs = 5\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_redirects, 10); // default
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
data_dir = "/srv/mite"
request_timeout_secs = 12
max_redirects = 3
max_concurrent_polls = 2
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/mite")));
        assert_eq!(config.data_dir(), Some(PathBuf::from("/srv/mite")));
        assert_eq!(config.request_timeout_secs, 12);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.max_concurrent_polls, 2);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("max_redirects = 1\ntheme = \"dark\"\n");
        assert_eq!(Config::load(&path).unwrap().max_redirects, 1);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (_dir, path) = write_config("request_timeout_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }
}
