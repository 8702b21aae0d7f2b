//! Configuration file management for nudge.
//!
//! Provides a TOML-based config file at `~/.config/nudge/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nudge_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub backend: BackendSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendSection {
    /// Ollama server base URL.
    pub ollama_url: String,
    /// Model name requested on every completion.
    pub model: String,
}

/// Default Ollama model when nothing is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the nudge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/nudge` or `~/.config/nudge`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nudge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nudge")
}

/// Return the path to the nudge config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct NudgeConfig {
    pub db_config: DbConfig,
    pub ollama_url: String,
    pub model: String,
}

impl NudgeConfig {
    /// Resolve configuration using the chain:
    /// CLI flag > env var > config file > default.
    pub fn resolve(database_url_flag: Option<&str>) -> Result<Self> {
        let file = load_config().ok();

        let database_url = database_url_flag
            .map(str::to_owned)
            .or_else(|| std::env::var("NUDGE_DATABASE_URL").ok())
            .or_else(|| file.as_ref().map(|f| f.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let ollama_url = std::env::var("NUDGE_OLLAMA_URL")
            .ok()
            .or_else(|| file.as_ref().map(|f| f.backend.ollama_url.clone()))
            .unwrap_or_else(|| {
                nudge_core::backend::OllamaBackend::DEFAULT_BASE_URL.to_owned()
            });

        let model = std::env::var("NUDGE_MODEL")
            .ok()
            .or_else(|| file.as_ref().map(|f| f.backend.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());

        Ok(Self {
            db_config: DbConfig::new(database_url),
            ollama_url,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_roundtrips_through_toml() {
        let config = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://localhost:5432/nudge".to_string(),
            },
            backend: BackendSection {
                ollama_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
            },
        };

        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.backend.ollama_url, config.backend.ollama_url);
        assert_eq!(parsed.backend.model, config.backend.model);
    }

    #[test]
    fn save_and_load_under_temp_xdg_home() {
        let tmp = tempfile::tempdir().unwrap();
        // SAFETY: test-only; env var manipulation is safe in this
        // single-threaded test body.
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let config = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://localhost:5432/nudge_test".to_string(),
            },
            backend: BackendSection {
                ollama_url: "http://localhost:11500".to_string(),
                model: "test-model".to_string(),
            },
        };
        save_config(&config).unwrap();

        assert!(config_path().starts_with(tmp.path()));
        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, "postgresql://localhost:5432/nudge_test");
        assert_eq!(loaded.backend.model, "test-model");

        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn flag_takes_precedence_in_resolution() {
        let resolved = NudgeConfig::resolve(Some("postgresql://flagged:5432/db")).unwrap();
        assert_eq!(resolved.db_config.database_url, "postgresql://flagged:5432/db");
    }
}
