use std::{fs, path::Path, str::FromStr};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use storage::StoreConfig;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Remote,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "remote" | "firebase" => Ok(Self::Remote),
            other => Err(anyhow!(
                "unknown store backend '{other}' (expected memory, sqlite or remote)"
            )),
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub store: StoreConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            store_backend: StoreBackend::Sqlite,
            database_url: "sqlite://./data/records.db".into(),
            store: StoreConfig::default(),
        }
    }
}

/// Keys accepted in `server.toml`. Everything is optional; missing keys keep defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    store_backend: Option<String>,
    database_url: Option<String>,
    store_endpoint: Option<String>,
    store_project_id: Option<String>,
    store_access_key: Option<String>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file if it exists, then environment variables. For each
/// setting the `APP__` variable beats the plain one.
pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", file.display()))?;
        settings.apply(
            file_cfg.bind_addr,
            file_cfg.store_backend,
            file_cfg.database_url,
            file_cfg.store_endpoint,
            file_cfg.store_project_id,
            file_cfg.store_access_key,
        )?;
    }

    let lookup = |plain: &str, prefixed: &str| env(prefixed).or_else(|| env(plain));
    settings.apply(
        lookup("SERVER_BIND", "APP__BIND_ADDR"),
        lookup("STORE_BACKEND", "APP__STORE_BACKEND"),
        lookup("DATABASE_URL", "APP__DATABASE_URL"),
        lookup("STORE_ENDPOINT", "APP__STORE_ENDPOINT"),
        lookup("STORE_PROJECT_ID", "APP__STORE_PROJECT_ID"),
        lookup("STORE_ACCESS_KEY", "APP__STORE_ACCESS_KEY"),
    )?;

    Ok(settings)
}

impl Settings {
    fn apply(
        &mut self,
        bind_addr: Option<String>,
        store_backend: Option<String>,
        database_url: Option<String>,
        store_endpoint: Option<String>,
        store_project_id: Option<String>,
        store_access_key: Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(v) = bind_addr {
            self.server_bind = v;
        }
        if let Some(v) = store_backend {
            self.store_backend = v.parse()?;
        }
        if let Some(v) = database_url {
            self.database_url = normalize_database_url(&v);
        }
        if let Some(v) = store_endpoint {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = store_project_id {
            self.store.project_id = Some(v);
        }
        if let Some(v) = store_access_key {
            self.store.access_key = Some(v);
        }
        Ok(())
    }
}

/// Accepts either a full sqlite URL or a bare file path.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }
    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }
    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
