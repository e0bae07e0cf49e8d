use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DayjotConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub insights: InsightsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the live cache namespace. Bump it on every deploy.
    pub version: String,
    pub db_path: String,
    /// Origin that relative asset paths resolve against.
    pub upstream: String,
    /// Assets fetched and stored during install.
    pub manifest: Vec<String>,
    /// Document served to navigations when cache and network both miss.
    pub shell_url: String,
    /// Hosts that are never intercepted.
    pub bypass_hosts: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InsightsConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4173,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_dayjot_dir()
            .join("journal.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let db_path = default_dayjot_dir()
            .join("assets.db")
            .to_string_lossy()
            .into_owned();
        Self {
            version: "dayjot-v1".into(),
            db_path,
            upstream: "http://127.0.0.1:5173".into(),
            manifest: vec![
                "/".into(),
                "/index.html".into(),
                "/manifest.json".into(),
                "https://cdn.tailwindcss.com".into(),
                "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap"
                    .into(),
            ],
            shell_url: "/index.html".into(),
            bypass_hosts: vec!["generativelanguage.googleapis.com".into()],
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash".into(),
            timeout_secs: 60,
        }
    }
}

/// Returns `~/.dayjot/`
pub fn default_dayjot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dayjot")
}

/// Returns the default config file path: `~/.dayjot/config.toml`
pub fn default_config_path() -> PathBuf {
    default_dayjot_dir().join("config.toml")
}

impl DayjotConfig {
    /// Read `~/.dayjot/config.toml` when present, then layer `DAYJOT_*` variables on top.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Same as [`DayjotConfig::load`] with an explicit file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("invalid dayjot config in {}", path.display()))?
        } else {
            info!(path = %path.display(), "config file absent, using built-in defaults");
            DayjotConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DAYJOT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("DAYJOT_CACHE_DB") {
            self.cache.db_path = val;
        }
        if let Ok(val) = std::env::var("DAYJOT_UPSTREAM") {
            self.cache.upstream = val;
        }
        if let Ok(val) = std::env::var("DAYJOT_CACHE_VERSION") {
            self.cache.version = val;
        }
        if let Ok(val) = std::env::var("DAYJOT_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the journal database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the asset cache database path, expanding `~` if needed.
    pub fn resolved_cache_db_path(&self) -> PathBuf {
        expand_tilde(&self.cache.db_path)
    }

    /// API key for the insight endpoint. Never read from the config file.
    pub fn insights_api_key() -> Option<String> {
        std::env::var("DAYJOT_INSIGHTS_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_dayjot_home() {
        let config = DayjotConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.port, 4173);
        assert_eq!(config.cache.version, "dayjot-v1");
        assert_eq!(config.cache.shell_url, "/index.html");
        assert!(config.cache.manifest.contains(&"/index.html".to_string()));
        assert!(config.storage.db_path.ends_with("journal.db"));
        assert!(config.cache.db_path.ends_with("assets.db"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[cache]
version = "dayjot-v7"
manifest = ["/", "/app.css"]
"#;
        let config: DayjotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.cache.version, "dayjot-v7");
        assert_eq!(config.cache.manifest, vec!["/", "/app.css"]);
        assert_eq!(config.cache.shell_url, "/index.html");
        assert_eq!(config.server.port, 4173);
    }

    #[test]
    fn dayjot_env_vars_win_over_file() {
        let mut config = DayjotConfig::default();
        std::env::set_var("DAYJOT_DB", "/tmp/override.db");
        std::env::set_var("DAYJOT_CACHE_VERSION", "dayjot-v9");
        std::env::set_var("DAYJOT_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.cache.version, "dayjot-v9");
        assert_eq!(config.server.log_level, "trace");

        std::env::remove_var("DAYJOT_DB");
        std::env::remove_var("DAYJOT_CACHE_VERSION");
        std::env::remove_var("DAYJOT_LOG_LEVEL");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
    }
}
