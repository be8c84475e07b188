//! Hierarchical application settings with disk persistence.
//!
//! Settings live in a YAML document at `{root}/config/settings.yaml` and are
//! addressed by dot path (e.g. `models.default_provider`). If no file exists
//! on first load, the default document is written: app metadata, the model
//! provider catalog, the database location, UI preferences, and security
//! toggles. Every `set` persists before returning.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::error::HubError;

/// Durable key/value settings store.
#[derive(Debug)]
pub struct ConfigStore {
    doc: RwLock<Value>,
    storage_path: PathBuf,
}

impl ConfigStore {
    /// Open the settings document under `root`, creating it with the default
    /// shape when absent.
    pub async fn open(root: &Path) -> Result<Self, HubError> {
        let storage_path = root.join("config").join("settings.yaml");

        let doc = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(v) => {
                    tracing::info!("Loaded settings from {}", storage_path.display());
                    v
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load settings from {}: {}, using defaults",
                        storage_path.display(),
                        e
                    );
                    Self::default_document()
                }
            }
        } else {
            Self::default_document()
        };

        let store = Self {
            doc: RwLock::new(doc),
            storage_path,
        };

        if !store.storage_path.exists() {
            store.save_to_disk().await?;
            tracing::info!("Wrote default settings to {}", store.storage_path.display());
        }

        Ok(store)
    }

    fn load_from_path(path: &Path) -> Result<Value, HubError> {
        let contents = std::fs::read_to_string(path)?;
        let doc: Value = serde_yaml::from_str(&contents)?;
        Ok(doc)
    }

    async fn save_to_disk(&self) -> Result<(), HubError> {
        let doc = self.doc.read().await;

        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(&*doc)?;
        std::fs::write(&self.storage_path, contents)?;
        tracing::debug!("Saved settings to {}", self.storage_path.display());
        Ok(())
    }

    /// The default settings document.
    fn default_document() -> Value {
        json!({
            "app": {
                "name": "agenthub",
                "version": env!("CARGO_PKG_VERSION"),
                "debug": false,
            },
            "models": {
                "default_provider": "openai",
                "providers": {
                    "openai": {
                        "api_key_env": "OPENAI_API_KEY",
                        "base_url": "https://api.openai.com/v1",
                        "models": ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo"],
                    },
                    "anthropic": {
                        "api_key_env": "ANTHROPIC_API_KEY",
                        "base_url": "https://api.anthropic.com/v1",
                        "models": [
                            "claude-3-5-haiku-latest",
                            "claude-3-5-sonnet-latest",
                        ],
                    },
                    "gemini": {
                        "api_key_env": "GEMINI_API_KEY",
                        "base_url": "https://generativelanguage.googleapis.com/v1beta/openai",
                        "models": ["gemini-1.5-flash", "gemini-1.5-pro"],
                    },
                },
            },
            "database": {
                "type": "sqlite",
                "path": "data/agents.db",
            },
            "ui": {
                "theme": "light",
                "items_per_page": 10,
                "auto_save": true,
            },
            "security": {
                "enable_auth": false,
                "session_timeout": 3600,
            },
        })
    }

    /// Get a value by dot path. Returns `None` when any segment is absent.
    pub async fn get(&self, path: &str) -> Option<Value> {
        let doc = self.doc.read().await;
        let mut cursor = &*doc;
        for segment in path.split('.') {
            cursor = cursor.get(segment)?;
        }
        Some(cursor.clone())
    }

    /// Get a string value by dot path.
    pub async fn get_str(&self, path: &str) -> Option<String> {
        self.get(path)
            .await
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Set a value by dot path, creating intermediate maps as needed, and
    /// persist to disk before returning.
    pub async fn set(&self, path: &str, value: Value) -> Result<(), HubError> {
        {
            let mut doc = self.doc.write().await;
            let mut cursor = &mut *doc;
            let segments: Vec<&str> = path.split('.').collect();
            for segment in &segments[..segments.len() - 1] {
                if !cursor.is_object() {
                    *cursor = json!({});
                }
                cursor = cursor
                    .as_object_mut()
                    .expect("just ensured object")
                    .entry(segment.to_string())
                    .or_insert_with(|| json!({}));
            }
            if !cursor.is_object() {
                *cursor = json!({});
            }
            cursor
                .as_object_mut()
                .expect("just ensured object")
                .insert(segments[segments.len() - 1].to_string(), value);
        }
        self.save_to_disk().await
    }

    /// The configured default model provider.
    pub async fn default_provider(&self) -> String {
        self.get_str("models.default_provider")
            .await
            .unwrap_or_else(|| "openai".to_string())
    }

    /// The catalog entry for one provider.
    pub async fn provider_config(&self, provider: &str) -> Option<Value> {
        self.get(&format!("models.providers.{}", provider)).await
    }

    /// The ledger database path, relative to the data root.
    pub async fn database_path(&self) -> String {
        self.get_str("database.path")
            .await
            .unwrap_or_else(|| "data/agents.db".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn default_document_written_on_first_open() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(dir.path()).await.unwrap();

        assert!(dir.path().join("config/settings.yaml").exists());
        assert_eq!(store.default_provider().await, "openai");
        assert_eq!(store.database_path().await, "data/agents.db");
        assert!(store.provider_config("anthropic").await.is_some());
        assert!(store.provider_config("nonsense").await.is_none());
    }

    #[tokio::test]
    async fn set_persists_and_survives_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = ConfigStore::open(dir.path()).await.unwrap();
            store
                .set("models.default_provider", json!("anthropic"))
                .await
                .unwrap();
            store.set("ui.items_per_page", json!(25)).await.unwrap();
        }

        let reopened = ConfigStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.default_provider().await, "anthropic");
        assert_eq!(reopened.get("ui.items_per_page").await, Some(json!(25)));
    }

    #[tokio::test]
    async fn set_creates_intermediate_maps() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(dir.path()).await.unwrap();

        store
            .set("models.providers.local.api_key_env", json!("LOCAL_KEY"))
            .await
            .unwrap();

        assert_eq!(
            store.get_str("models.providers.local.api_key_env").await,
            Some("LOCAL_KEY".to_string())
        );
    }
}
