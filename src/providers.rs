//! Provider catalog derived from settings plus live environment credentials.
//!
//! A provider is usable iff its catalog entry declares an `api_key_env` key
//! and that variable resolves to a non-empty value at call time. The check is
//! deliberately never cached so credential rotation takes effect without a
//! restart. This component holds no state of its own and has no side effects.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::error::HubError;

/// Resolved connection details for one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: String,
}

/// Read-only view over the configured model providers.
#[derive(Clone)]
pub struct ProviderCatalog {
    config: Arc<ConfigStore>,
}

impl ProviderCatalog {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }

    /// Map of provider id to supported model ids, restricted to providers
    /// whose credential is present in the process environment right now.
    pub async fn available_providers(&self) -> BTreeMap<String, Vec<String>> {
        let mut available = BTreeMap::new();

        let providers = match self.config.get("models.providers").await {
            Some(serde_json::Value::Object(map)) => map,
            _ => return available,
        };

        for (name, entry) in providers {
            if credential_for(&entry).is_none() {
                continue;
            }
            let models = entry
                .get("models")
                .and_then(|m| m.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|m| m.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            available.insert(name, models);
        }

        available
    }

    /// Whether `provider` is configured and its credential resolves.
    pub async fn is_available(&self, provider: &str) -> bool {
        match self.config.provider_config(provider).await {
            Some(entry) => credential_for(&entry).is_some(),
            None => false,
        }
    }

    /// Resolve base URL and credential for `provider`.
    pub async fn endpoint(&self, provider: &str) -> Result<ProviderEndpoint, HubError> {
        let entry = self
            .config
            .provider_config(provider)
            .await
            .ok_or_else(|| HubError::UnsupportedProvider(provider.to_string()))?;

        let api_key = credential_for(&entry)
            .ok_or_else(|| HubError::UnsupportedProvider(provider.to_string()))?;

        let base_url = entry
            .get("base_url")
            .and_then(|v| v.as_str())
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();

        Ok(ProviderEndpoint { base_url, api_key })
    }
}

/// Look up the credential declared by a catalog entry. Empty values count as
/// absent.
fn credential_for(entry: &serde_json::Value) -> Option<String> {
    let env_key = entry.get("api_key_env")?.as_str()?;
    std::env::var(env_key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn catalog_with_provider(env_key: &str) -> (TempDir, ProviderCatalog) {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(ConfigStore::open(dir.path()).await.unwrap());
        config
            .set(
                "models.providers.local",
                json!({
                    "api_key_env": env_key,
                    "base_url": "http://localhost:9000/v1",
                    "models": ["m1", "m2"],
                }),
            )
            .await
            .unwrap();
        (dir, ProviderCatalog::new(config))
    }

    #[tokio::test]
    async fn provider_appears_only_when_credential_present() {
        let (_dir, catalog) = catalog_with_provider("AGENTHUB_TEST_CRED_PRESENT").await;

        std::env::remove_var("AGENTHUB_TEST_CRED_PRESENT");
        assert!(!catalog.is_available("local").await);
        assert!(!catalog.available_providers().await.contains_key("local"));

        std::env::set_var("AGENTHUB_TEST_CRED_PRESENT", "sk-test");
        assert!(catalog.is_available("local").await);
        let available = catalog.available_providers().await;
        assert_eq!(
            available.get("local"),
            Some(&vec!["m1".to_string(), "m2".to_string()])
        );
    }

    #[tokio::test]
    async fn empty_credential_counts_as_absent() {
        let (_dir, catalog) = catalog_with_provider("AGENTHUB_TEST_CRED_EMPTY").await;

        std::env::set_var("AGENTHUB_TEST_CRED_EMPTY", "");
        assert!(!catalog.is_available("local").await);
        assert!(catalog.endpoint("local").await.is_err());
    }

    #[tokio::test]
    async fn endpoint_resolves_base_url_and_key() {
        let (_dir, catalog) = catalog_with_provider("AGENTHUB_TEST_CRED_EP").await;
        std::env::set_var("AGENTHUB_TEST_CRED_EP", "sk-ep");

        let ep = catalog.endpoint("local").await.unwrap();
        assert_eq!(ep.base_url, "http://localhost:9000/v1");
        assert_eq!(ep.api_key, "sk-ep");

        let err = catalog.endpoint("unknown").await.unwrap_err();
        assert!(matches!(err, HubError::UnsupportedProvider(_)));
    }
}
