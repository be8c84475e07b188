//! Agent definition storage.
//!
//! The store owns the authoritative copy of every `AgentDefinition`. Records
//! persist as one JSON file per identity under `{root}/agents/` and are
//! mirrored in an in-memory map; every create/update/delete rewrites the
//! file before the call returns, so no in-memory state is ever ahead of
//! disk. Identities are store-assigned and immutable, as is `created_at`.

mod templates;

pub use templates::Template;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::HubError;

/// Caller-supplied fields for creating or updating an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_enabled() -> bool {
    true
}

/// A persisted agent definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentDefinition {
    fn from_draft(id: String, draft: AgentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            system_prompt: draft.system_prompt,
            provider: draft.provider,
            model: draft.model,
            temperature: draft.temperature,
            max_tokens: draft.max_tokens,
            tools: draft.tools,
            enabled: draft.enabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// The mutable fields of this definition as a draft.
    pub fn to_draft(&self) -> AgentDraft {
        AgentDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            system_prompt: self.system_prompt.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
            enabled: self.enabled,
        }
    }
}

fn validate(draft: &AgentDraft) -> Result<(), HubError> {
    if draft.name.trim().is_empty() {
        return Err(HubError::Validation("name must not be empty".to_string()));
    }
    if draft.system_prompt.trim().is_empty() {
        return Err(HubError::Validation(
            "system_prompt must not be empty".to_string(),
        ));
    }
    if draft.provider.trim().is_empty() {
        return Err(HubError::Validation(
            "provider must not be empty".to_string(),
        ));
    }
    if draft.model.trim().is_empty() {
        return Err(HubError::Validation("model must not be empty".to_string()));
    }
    if !(0.0..=2.0).contains(&draft.temperature) {
        return Err(HubError::Validation(format!(
            "temperature must be within [0, 2], got {}",
            draft.temperature
        )));
    }
    if draft.max_tokens == 0 {
        return Err(HubError::Validation(
            "max_tokens must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Durable CRUD store for agent definitions plus the builtin template set.
pub struct AgentStore {
    agents: RwLock<HashMap<String, AgentDefinition>>,
    agents_dir: PathBuf,
    templates_dir: PathBuf,
    // Serializes template seeding so the first two concurrent calls cannot
    // both observe an empty directory.
    seed_lock: Mutex<()>,
}

impl AgentStore {
    /// Open the store under `root`, loading every persisted definition.
    pub async fn open(root: &Path) -> Result<Self, HubError> {
        let agents_dir = root.join("agents");
        let templates_dir = agents_dir.join("templates");
        std::fs::create_dir_all(&templates_dir)?;

        let mut agents = HashMap::new();
        for entry in std::fs::read_dir(&agents_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(HubError::from)
                .and_then(|s| serde_json::from_str::<AgentDefinition>(&s).map_err(HubError::from))
            {
                Ok(def) => {
                    agents.insert(def.id.clone(), def);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable agent record {}: {}", path.display(), e);
                }
            }
        }
        tracing::info!("Loaded {} agent definitions", agents.len());

        Ok(Self {
            agents: RwLock::new(agents),
            agents_dir,
            templates_dir,
            seed_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.agents_dir.join(format!("{}.json", id))
    }

    fn persist(&self, def: &AgentDefinition) -> Result<(), HubError> {
        let contents = serde_json::to_string_pretty(def)?;
        std::fs::write(self.record_path(&def.id), contents)?;
        Ok(())
    }

    /// All known definitions, sorted by identity.
    pub async fn list(&self) -> Vec<AgentDefinition> {
        let agents = self.agents.read().await;
        let mut list: Vec<_> = agents.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Fetch one definition.
    pub async fn get(&self, id: &str) -> Result<AgentDefinition, HubError> {
        let agents = self.agents.read().await;
        agents
            .get(id)
            .cloned()
            .ok_or_else(|| HubError::NotFound(id.to_string()))
    }

    /// Validate a draft, assign a fresh identity, and persist it.
    pub async fn create(&self, draft: AgentDraft) -> Result<AgentDefinition, HubError> {
        validate(&draft)?;

        let mut agents = self.agents.write().await;
        let id = Uuid::new_v4().to_string();
        let def = AgentDefinition::from_draft(id.clone(), draft, Utc::now());

        self.persist(&def)?;
        agents.insert(id.clone(), def.clone());
        tracing::info!("Created agent {} ({})", def.name, id);
        Ok(def)
    }

    /// Overwrite all mutable fields of an existing definition. Identity and
    /// `created_at` are preserved; `updated_at` strictly increases.
    pub async fn update(&self, id: &str, draft: AgentDraft) -> Result<AgentDefinition, HubError> {
        validate(&draft)?;

        let mut agents = self.agents.write().await;
        let prev = agents
            .get(id)
            .ok_or_else(|| HubError::NotFound(id.to_string()))?;

        let def = Self::updated_record(prev, draft);
        self.persist(&def)?;
        agents.insert(id.to_string(), def.clone());
        tracing::debug!("Updated agent {}", id);
        Ok(def)
    }

    /// Flip the enabled flag. Runs through the same stamping rules as
    /// `update`.
    pub async fn set_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<AgentDefinition, HubError> {
        let mut agents = self.agents.write().await;
        let prev = agents
            .get(id)
            .ok_or_else(|| HubError::NotFound(id.to_string()))?;

        let mut draft = prev.to_draft();
        draft.enabled = enabled;
        let def = Self::updated_record(prev, draft);
        self.persist(&def)?;
        agents.insert(id.to_string(), def.clone());
        tracing::info!(
            "Agent {} {}",
            id,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(def)
    }

    fn updated_record(prev: &AgentDefinition, draft: AgentDraft) -> AgentDefinition {
        // The clock may not tick between back-to-back updates; updated_at
        // must still strictly increase.
        let mut now = Utc::now();
        if now <= prev.updated_at {
            now = prev.updated_at + chrono::Duration::nanoseconds(1);
        }
        let mut def = AgentDefinition::from_draft(prev.id.clone(), draft, now);
        def.created_at = prev.created_at;
        def
    }

    /// Remove a definition durably.
    pub async fn delete(&self, id: &str) -> Result<(), HubError> {
        let mut agents = self.agents.write().await;
        if !agents.contains_key(id) {
            return Err(HubError::NotFound(id.to_string()));
        }

        let path = self.record_path(id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        agents.remove(id);
        tracing::info!("Deleted agent {}", id);
        Ok(())
    }

    /// The builtin template set, seeding the templates directory exactly
    /// once. A non-empty directory is never re-seeded.
    pub async fn list_templates(&self) -> Result<Vec<Template>, HubError> {
        let _guard = self.seed_lock.lock().await;
        templates::ensure_seeded(&self.templates_dir)?;
        templates::load(&self.templates_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(name: &str) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            description: "test agent".to_string(),
            system_prompt: "You are a test assistant.".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            tools: vec!["calculator".to_string()],
            enabled: true,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_the_draft() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();

        let created = store.create(draft("echo")).await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();

        assert_eq!(fetched.to_draft(), draft("echo"));
        assert!(!fetched.id.is_empty());
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn create_rejects_invalid_drafts() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();

        let mut d = draft("x");
        d.name = "  ".to_string();
        assert!(matches!(
            store.create(d).await,
            Err(HubError::Validation(_))
        ));

        let mut d = draft("x");
        d.temperature = 2.5;
        assert!(matches!(
            store.create(d).await,
            Err(HubError::Validation(_))
        ));

        let mut d = draft("x");
        d.max_tokens = 0;
        assert!(matches!(
            store.create(d).await,
            Err(HubError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_preserves_identity_and_bumps_updated_at() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();
        let created = store.create(draft("original")).await.unwrap();

        let first = store.update(&created.id, draft("renamed")).await.unwrap();
        let second = store.update(&created.id, draft("renamed again")).await.unwrap();

        assert_eq!(first.id, created.id);
        assert_eq!(first.created_at, created.created_at);
        assert!(first.updated_at > created.updated_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.name, "renamed again");
    }

    #[tokio::test]
    async fn update_and_delete_report_not_found() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.update("missing", draft("x")).await,
            Err(HubError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("missing").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_record_and_file() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();
        let created = store.create(draft("doomed")).await.unwrap();

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get(&created.id).await,
            Err(HubError::NotFound(_))
        ));
        assert!(!dir
            .path()
            .join("agents")
            .join(format!("{}.json", created.id))
            .exists());
    }

    #[tokio::test]
    async fn definitions_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = AgentStore::open(dir.path()).await.unwrap();
            store.create(draft("durable")).await.unwrap().id
        };

        let reopened = AgentStore::open(dir.path()).await.unwrap();
        let fetched = reopened.get(&id).await.unwrap();
        assert_eq!(fetched.name, "durable");
    }

    #[tokio::test]
    async fn templates_seed_once_and_stay_fixed() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();

        let first = store.list_templates().await.unwrap();
        let second = store.list_templates().await.unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        let names: Vec<_> = first.iter().map(|t| t.draft.name.as_str()).collect();
        assert!(names.contains(&"General Assistant"));
        assert!(names.contains(&"Code Assistant"));
        assert!(names.contains(&"Research Assistant"));
        assert!(names.contains(&"Math Tutor"));
    }

    #[tokio::test]
    async fn set_enabled_flips_only_the_flag() {
        let dir = TempDir::new().unwrap();
        let store = AgentStore::open(dir.path()).await.unwrap();
        let created = store.create(draft("toggle")).await.unwrap();

        let disabled = store.set_enabled(&created.id, false).await.unwrap();
        assert!(!disabled.enabled);
        assert_eq!(disabled.name, created.name);
        assert!(disabled.updated_at > created.updated_at);
    }
}
