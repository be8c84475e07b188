//! Runtime handles and the session cache.
//!
//! A `RuntimeHandle` is the expensive-to-build, ready-to-invoke form of an
//! agent definition: resolved tools, tuning parameters, and a shared model
//! client. The `SessionCache` builds handles lazily and guarantees that for
//! any agent identity at most one build runs at a time, no matter how many
//! callers ask concurrently; the losers wait and share the winner's handle.
//! Eviction simply forgets the cached entry, so the next request rebuilds
//! from the current definition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::agents::AgentStore;
use crate::error::HubError;
use crate::llm::{ChatRequest, ModelClient, ModelReply};
use crate::providers::ProviderCatalog;
use crate::tools::{self, ToolKind};

/// A ready-to-invoke snapshot of one agent definition.
pub struct RuntimeHandle {
    agent_id: String,
    provider: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    tools: Vec<ToolKind>,
    client: Arc<dyn ModelClient>,
}

impl RuntimeHandle {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Tools granted to this agent, in definition order.
    pub fn tools(&self) -> &[ToolKind] {
        &self.tools
    }

    /// Send one user message through the model client. Holds no locks while
    /// the call is in flight.
    pub async fn invoke(&self, message: &str) -> Result<ModelReply, HubError> {
        let request = ChatRequest {
            provider: self.provider.clone(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            message: message.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        self.client.complete(request).await
    }

    /// Run one of this handle's tools by name. `None` if the tool was not
    /// granted to this agent.
    pub fn run_tool(&self, name: &str, input: &str) -> Option<String> {
        let kind = ToolKind::from_name(name)?;
        if !self.tools.contains(&kind) {
            return None;
        }
        Some(kind.run(input))
    }
}

type HandleCell = Arc<OnceCell<Arc<RuntimeHandle>>>;

/// Lazily-built cache of runtime handles, one per agent identity.
pub struct SessionCache {
    store: Arc<AgentStore>,
    catalog: Arc<ProviderCatalog>,
    client: Arc<dyn ModelClient>,
    handles: Mutex<HashMap<String, HandleCell>>,
    built: AtomicU64,
}

impl SessionCache {
    pub fn new(
        store: Arc<AgentStore>,
        catalog: Arc<ProviderCatalog>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            store,
            catalog,
            client,
            handles: Mutex::new(HashMap::new()),
            built: AtomicU64::new(0),
        }
    }

    /// Fetch the handle for `agent_id`, building it if absent. Concurrent
    /// callers for the same identity share a single build; a failed build
    /// leaves no residue, so the next call retries from scratch.
    pub async fn get(&self, agent_id: &str) -> Result<Arc<RuntimeHandle>, HubError> {
        let cell = {
            let mut handles = self.handles.lock().await;
            handles
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // The map lock is released; only same-identity callers contend here.
        let handle = cell
            .get_or_try_init(|| self.build(agent_id))
            .await?
            .clone();
        Ok(handle)
    }

    async fn build(&self, agent_id: &str) -> Result<Arc<RuntimeHandle>, HubError> {
        let def = self.store.get(agent_id).await?;
        if !def.enabled {
            return Err(HubError::Disabled(agent_id.to_string()));
        }
        if !self.catalog.is_available(&def.provider).await {
            return Err(HubError::UnsupportedProvider(def.provider.clone()));
        }

        let tools = tools::resolve_tools(&def.tools);
        self.built.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "Built runtime handle for agent {} ({}/{})",
            agent_id,
            def.provider,
            def.model
        );

        Ok(Arc::new(RuntimeHandle {
            agent_id: def.id,
            provider: def.provider,
            model: def.model,
            system_prompt: def.system_prompt,
            temperature: def.temperature,
            max_tokens: def.max_tokens,
            tools,
            client: self.client.clone(),
        }))
    }

    /// Forget the cached handle for `agent_id`. Safe to call for identities
    /// that were never cached. In-flight invocations on the old handle run
    /// to completion; only future `get` calls see the rebuild.
    pub async fn evict(&self, agent_id: &str) {
        let mut handles = self.handles.lock().await;
        if handles.remove(agent_id).is_some() {
            tracing::debug!("Evicted runtime handle for agent {}", agent_id);
        }
    }

    /// How many handle builds have completed since startup.
    pub fn built_count(&self) -> u64 {
        self.built.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDraft;
    use crate::config::ConfigStore;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    struct SlowClient;

    #[async_trait]
    impl ModelClient for SlowClient {
        async fn complete(&self, request: ChatRequest) -> Result<ModelReply, HubError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(ModelReply {
                text: format!("echo: {}", request.message),
                usage: None,
            })
        }
    }

    async fn harness(env_key: &str) -> (TempDir, Arc<AgentStore>, SessionCache) {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(ConfigStore::open(dir.path()).await.unwrap());
        config
            .set(
                "models.providers.local",
                serde_json::json!({
                    "api_key_env": env_key,
                    "base_url": "http://localhost:9000/v1",
                    "models": ["m1"],
                }),
            )
            .await
            .unwrap();
        std::env::set_var(env_key, "sk-test");

        let store = Arc::new(AgentStore::open(dir.path()).await.unwrap());
        let catalog = Arc::new(ProviderCatalog::new(config));
        let cache = SessionCache::new(store.clone(), catalog, Arc::new(SlowClient));
        (dir, store, cache)
    }

    fn draft() -> AgentDraft {
        AgentDraft {
            name: "runtime test".to_string(),
            description: String::new(),
            system_prompt: "You are concise.".to_string(),
            provider: "local".to_string(),
            model: "m1".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            tools: vec!["calculator".to_string(), "bogus_tool".to_string()],
            enabled: true,
        }
    }

    #[tokio::test]
    async fn concurrent_gets_build_exactly_once() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_ONCE").await;
        let id = store.create(draft()).await.unwrap().id;
        let cache = Arc::new(cache);

        let mut set = JoinSet::new();
        for _ in 0..32 {
            let cache = cache.clone();
            let id = id.clone();
            set.spawn(async move { cache.get(&id).await.map(|h| Arc::as_ptr(&h) as usize) });
        }

        let mut pointers = Vec::new();
        while let Some(result) = set.join_next().await {
            pointers.push(result.unwrap().unwrap());
        }

        assert_eq!(pointers.len(), 32);
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.built_count(), 1);
    }

    #[tokio::test]
    async fn build_resolves_tools_and_drops_unknown_names() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_TOOLS").await;
        let id = store.create(draft()).await.unwrap().id;

        let handle = cache.get(&id).await.unwrap();
        assert_eq!(handle.tools(), &[ToolKind::Calculator]);
        assert_eq!(handle.run_tool("calculator", "2 + 3"), Some("5".to_string()));
        assert_eq!(handle.run_tool("web_search", "x"), None);
        assert_eq!(handle.run_tool("bogus_tool", "x"), None);
    }

    #[tokio::test]
    async fn disabled_and_missing_agents_do_not_build() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_DISABLED").await;
        let mut d = draft();
        d.enabled = false;
        let id = store.create(d).await.unwrap().id;

        assert!(matches!(
            cache.get(&id).await,
            Err(HubError::Disabled(_))
        ));
        assert!(matches!(
            cache.get("missing").await,
            Err(HubError::NotFound(_))
        ));
        assert_eq!(cache.built_count(), 0);
    }

    #[tokio::test]
    async fn uncredentialed_provider_fails_then_recovers() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_CRED").await;
        let id = store.create(draft()).await.unwrap().id;

        std::env::remove_var("AGENTHUB_TEST_RT_CRED");
        assert!(matches!(
            cache.get(&id).await,
            Err(HubError::UnsupportedProvider(_))
        ));

        // A failed build leaves nothing cached, so restoring the credential
        // makes the next get succeed.
        std::env::set_var("AGENTHUB_TEST_RT_CRED", "sk-test");
        let handle = cache.get(&id).await.unwrap();
        assert_eq!(handle.model(), "m1");
        assert_eq!(cache.built_count(), 1);
    }

    #[tokio::test]
    async fn evict_forces_a_rebuild_from_the_current_definition() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_EVICT").await;
        let id = store.create(draft()).await.unwrap().id;

        let first = cache.get(&id).await.unwrap();
        assert_eq!(first.system_prompt(), "You are concise.");

        let mut d = draft();
        d.system_prompt = "You are verbose.".to_string();
        store.update(&id, d).await.unwrap();
        cache.evict(&id).await;
        cache.evict("never-cached").await;

        let second = cache.get(&id).await.unwrap();
        assert_eq!(second.system_prompt(), "You are verbose.");
        assert_eq!(cache.built_count(), 2);
    }

    #[tokio::test]
    async fn invoke_round_trips_through_the_client() {
        let (_dir, store, cache) = harness("AGENTHUB_TEST_RT_INVOKE").await;
        let id = store.create(draft()).await.unwrap().id;

        let handle = cache.get(&id).await.unwrap();
        let reply = handle.invoke("ping").await.unwrap();
        assert_eq!(reply.text, "echo: ping");
    }
}
