//! Top-level dispatch façade.
//!
//! The `Hub` wires the settings store, agent store, provider catalog,
//! session cache, and conversation ledger together and is the only surface
//! callers are expected to hold. Definition mutations go through the store
//! first and evict the cached runtime handle only after the durable write
//! has committed, so a handle never outlives the definition it was built
//! from. `send` records an exchange in the ledger only after the model call
//! succeeded; failed invocations leave no trace.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::agents::{AgentDefinition, AgentDraft, AgentStore, Template};
use crate::config::ConfigStore;
use crate::error::HubError;
use crate::ledger::{AgentStats, ConversationLedger, Exchange, SystemLogEntry};
use crate::llm::{HttpModelClient, ModelClient, ModelReply};
use crate::providers::ProviderCatalog;
use crate::runtime::SessionCache;

pub struct Hub {
    config: Arc<ConfigStore>,
    store: Arc<AgentStore>,
    catalog: Arc<ProviderCatalog>,
    sessions: SessionCache,
    ledger: ConversationLedger,
}

impl Hub {
    /// Open all subsystems under `root` with the production HTTP model
    /// client.
    pub async fn open(root: &Path) -> Result<Self, HubError> {
        let config = Arc::new(ConfigStore::open(root).await?);
        let catalog = Arc::new(ProviderCatalog::new(config.clone()));
        let client: Arc<dyn ModelClient> = Arc::new(HttpModelClient::new(catalog.clone()));
        Self::assemble(root, config, catalog, client).await
    }

    /// Open all subsystems under `root` with a caller-supplied model client.
    pub async fn with_client(root: &Path, client: Arc<dyn ModelClient>) -> Result<Self, HubError> {
        let config = Arc::new(ConfigStore::open(root).await?);
        let catalog = Arc::new(ProviderCatalog::new(config.clone()));
        Self::assemble(root, config, catalog, client).await
    }

    async fn assemble(
        root: &Path,
        config: Arc<ConfigStore>,
        catalog: Arc<ProviderCatalog>,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, HubError> {
        let store = Arc::new(AgentStore::open(root).await?);
        let db_path = root.join(config.database_path().await);
        let ledger = ConversationLedger::open(db_path).await?;
        let sessions = SessionCache::new(store.clone(), catalog.clone(), client);

        tracing::info!("Hub ready under {}", root.display());
        Ok(Self {
            config,
            store,
            catalog,
            sessions,
            ledger,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    // ---- agent definitions ----

    pub async fn create_agent(&self, draft: AgentDraft) -> Result<AgentDefinition, HubError> {
        self.store.create(draft).await
    }

    pub async fn get_agent(&self, id: &str) -> Result<AgentDefinition, HubError> {
        self.store.get(id).await
    }

    pub async fn list_agents(&self) -> Vec<AgentDefinition> {
        self.store.list().await
    }

    /// Overwrite an agent's mutable fields and drop its cached handle, so
    /// the next invocation reflects the new definition.
    pub async fn update_agent(
        &self,
        id: &str,
        draft: AgentDraft,
    ) -> Result<AgentDefinition, HubError> {
        let def = self.store.update(id, draft).await?;
        self.sessions.evict(id).await;
        Ok(def)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<AgentDefinition, HubError> {
        let def = self.store.set_enabled(id, enabled).await?;
        self.sessions.evict(id).await;
        Ok(def)
    }

    pub async fn delete_agent(&self, id: &str) -> Result<(), HubError> {
        self.store.delete(id).await?;
        self.sessions.evict(id).await;
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, HubError> {
        self.store.list_templates().await
    }

    // ---- providers ----

    pub async fn available_providers(
        &self,
    ) -> std::collections::BTreeMap<String, Vec<String>> {
        self.catalog.available_providers().await
    }

    // ---- dispatch ----

    /// Send one user message to an agent. Resolves the runtime handle (a
    /// cache hit or a single-flight build), invokes the model with no locks
    /// held, and records the exchange durably before returning. An
    /// invocation failure is returned as-is and writes nothing.
    pub async fn send(&self, agent_id: &str, message: &str) -> Result<ModelReply, HubError> {
        let handle = self.sessions.get(agent_id).await?;

        let sent_at = Utc::now();
        let reply = handle.invoke(message).await?;
        let replied_at = Utc::now();

        self.ledger
            .append(
                agent_id,
                message,
                sent_at,
                &reply.text,
                replied_at,
                reply.usage.clone(),
            )
            .await?;

        Ok(reply)
    }

    // ---- ledger ----

    pub async fn history(&self, agent_id: &str, limit: usize) -> Result<Vec<Exchange>, HubError> {
        self.ledger.history(agent_id, limit).await
    }

    pub async fn stats(&self, agent_id: &str) -> Result<Option<AgentStats>, HubError> {
        self.ledger.stats(agent_id).await
    }

    pub async fn all_stats(&self) -> Result<Vec<AgentStats>, HubError> {
        self.ledger.all_stats().await
    }

    pub async fn total_conversations(&self) -> Result<u64, HubError> {
        self.ledger.total_conversations().await
    }

    pub async fn purge_older_than(&self, days: u32) -> Result<(usize, usize), HubError> {
        self.ledger.purge_older_than(days).await
    }

    pub async fn log_event(
        &self,
        level: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), HubError> {
        self.ledger.log_event(level, message, details).await
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<SystemLogEntry>, HubError> {
        self.ledger.recent_events(limit).await
    }
}
