use std::{collections::BTreeMap, io, path::PathBuf, sync::Arc};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

pub mod agents;
pub mod lock;
pub mod proxy;

use agents::generate_random_user_agent;
pub use lock::{LockError, SessionLock};
pub use proxy::{Proxy, ProxyError};

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    SerdeError(serde_json::Error),
    ProxyError(ProxyError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-session settings as stored in the accounts config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Launch URL captured from the Telegram client, used when no MTProto client is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_app_url: Option<String>,
    /// Keys this program does not know about, kept as-is on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON file holding a `SessionConfig` per session name
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

pub type SharedConfigStore = Arc<ConfigStore>;

impl ConfigStore {
    /// Create new `ConfigStore` instance
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read every session config, a missing file is an empty config
    pub async fn load_all(&self) -> ConfigResult<BTreeMap<String, SessionConfig>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(error) => return Err(ConfigError::IoError(error)),
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(ConfigError::SerdeError)
    }

    /// Config of a single session, default when absent
    pub async fn get(&self, session_name: &str) -> ConfigResult<SessionConfig> {
        Ok(self
            .load_all()
            .await?
            .remove(session_name)
            .unwrap_or_default())
    }

    /// Replace the config of `session_name` and write the file back
    pub async fn update(&self, session_name: &str, config: &SessionConfig) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.load_all().await?;
        all.insert(session_name.to_string(), config.clone());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(ConfigError::IoError)?;
        }

        let data = serde_json::to_vec_pretty(&all).map_err(ConfigError::SerdeError)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(ConfigError::IoError)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(ConfigError::IoError)?;

        Ok(())
    }
}

/// One automated account
#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub proxy: Option<Proxy>,
    pub user_agent: String,
    pub config: SessionConfig,
}

impl Session {
    /// Load the session settings, generating and persisting a user agent when missing
    pub async fn load(name: &str, store: &ConfigStore) -> ConfigResult<Self> {
        let mut config = store.get(name).await?;

        let proxy = match config.proxy.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Some(raw.parse::<Proxy>().map_err(ConfigError::ProxyError)?)
            }
            _ => None,
        };

        let user_agent = match config.user_agent.clone() {
            Some(user_agent) if !user_agent.is_empty() => user_agent,
            _ => {
                let user_agent = generate_random_user_agent();
                config.user_agent = Some(user_agent.clone());
                store.update(name, &config).await?;
                info!("{} | Generated a new user agent", name);
                user_agent
            }
        };

        Ok(Self {
            name: name.to_string(),
            proxy,
            user_agent,
            config,
        })
    }
}
