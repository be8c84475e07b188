//! Conversation ledger with aggregate statistics.
//!
//! An append-only SQLite log of exchanges plus one stats row per agent,
//! updated in the same transaction as each append: either both the exchange
//! and the stats delta commit, or neither does. Exchanges are never updated
//! in place; retention sweeps delete old exchange and system-log rows but
//! deliberately leave `agent_stats` intact so historical aggregates survive.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::HubError;
use crate::llm::Usage;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    user_message TEXT NOT NULL,
    agent_response TEXT NOT NULL,
    user_message_timestamp TEXT NOT NULL,
    agent_response_timestamp TEXT NOT NULL,
    usage_data TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_conversations_agent ON conversations(agent_id, id);
CREATE INDEX IF NOT EXISTS idx_conversations_created ON conversations(created_at);

CREATE TABLE IF NOT EXISTS agent_stats (
    agent_id TEXT PRIMARY KEY NOT NULL,
    total_conversations INTEGER NOT NULL DEFAULT 0,
    total_tokens_used INTEGER NOT NULL DEFAULT 0,
    last_used TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS system_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    details TEXT,
    timestamp TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_system_logs_timestamp ON system_logs(timestamp);
"#;

/// One recorded user/response pair. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub id: i64,
    pub agent_id: String,
    pub user_message: String,
    pub agent_response: String,
    pub user_timestamp: String,
    pub agent_timestamp: String,
    pub usage: Option<Usage>,
    pub created_at: String,
}

/// Aggregate statistics for one agent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent_id: String,
    pub total_conversations: i64,
    pub total_tokens_used: i64,
    pub last_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One system log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

/// Durable append-only exchange log plus per-agent aggregates.
pub struct ConversationLedger {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationLedger {
    /// Open (or create) the ledger database at `db_path`.
    pub async fn open(db_path: PathBuf) -> Result<Self, HubError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, HubError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Record one exchange and fold it into the agent's stats row as a
    /// single atomic unit.
    pub async fn append(
        &self,
        agent_id: &str,
        user_message: &str,
        user_timestamp: DateTime<Utc>,
        agent_response: &str,
        agent_timestamp: DateTime<Utc>,
        usage: Option<Usage>,
    ) -> Result<(), HubError> {
        let conn = self.conn.clone();
        let agent_id = agent_id.to_string();
        let user_message = user_message.to_string();
        let agent_response = agent_response.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            insert_exchange(
                &tx,
                &agent_id,
                &user_message,
                user_timestamp,
                &agent_response,
                agent_timestamp,
                usage.as_ref(),
            )?;
            bump_stats(&tx, &agent_id, usage.as_ref())?;
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    /// The most recent `limit` exchanges for `agent_id`, newest first.
    pub async fn history(&self, agent_id: &str, limit: usize) -> Result<Vec<Exchange>, HubError> {
        let conn = self.conn.clone();
        let agent_id = agent_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, user_message, agent_response,
                        user_message_timestamp, agent_response_timestamp,
                        usage_data, created_at
                 FROM conversations
                 WHERE agent_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let exchanges = stmt
                .query_map(params![agent_id, limit as i64], parse_exchange)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(exchanges)
        })
        .await?
    }

    /// The stats row for one agent, if any exchange was ever recorded.
    pub async fn stats(&self, agent_id: &str) -> Result<Option<AgentStats>, HubError> {
        let conn = self.conn.clone();
        let agent_id = agent_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let row = conn
                .query_row(
                    "SELECT agent_id, total_conversations, total_tokens_used,
                            last_used, created_at, updated_at
                     FROM agent_stats WHERE agent_id = ?1",
                    params![agent_id],
                    parse_stats,
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }

    /// All stats rows, most recently used first.
    pub async fn all_stats(&self) -> Result<Vec<AgentStats>, HubError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT agent_id, total_conversations, total_tokens_used,
                        last_used, created_at, updated_at
                 FROM agent_stats
                 ORDER BY last_used DESC",
            )?;
            let stats = stmt
                .query_map([], parse_stats)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(stats)
        })
        .await?
    }

    /// Count of all exchange rows across all agents.
    pub async fn total_conversations(&self) -> Result<u64, HubError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
            Ok(total as u64)
        })
        .await?
    }

    /// Delete exchange and system-log rows older than `days`. Aggregate
    /// stats are retained so dashboards stay meaningful after sweeps.
    pub async fn purge_older_than(&self, days: u32) -> Result<(usize, usize), HubError> {
        let conn = self.conn.clone();
        let cutoff = format!("-{} days", days);

        let (exchanges, logs) = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let exchanges = conn.execute(
                "DELETE FROM conversations WHERE created_at < datetime('now', ?1)",
                params![cutoff],
            )?;
            let logs = conn.execute(
                "DELETE FROM system_logs WHERE timestamp < datetime('now', ?1)",
                params![cutoff],
            )?;
            Ok::<_, HubError>((exchanges, logs))
        })
        .await??;

        tracing::info!(
            "Purged {} exchanges and {} system log rows older than {} days",
            exchanges,
            logs,
            days
        );
        Ok((exchanges, logs))
    }

    /// Record a system event.
    pub async fn log_event(
        &self,
        level: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), HubError> {
        let conn = self.conn.clone();
        let level = level.to_string();
        let message = message.to_string();
        let details = details.map(|d| d.to_string());

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO system_logs (level, message, details) VALUES (?1, ?2, ?3)",
                params![level, message, details],
            )?;
            Ok(())
        })
        .await?
    }

    /// The most recent `limit` system log rows, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<SystemLogEntry>, HubError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT id, level, message, details, timestamp
                 FROM system_logs
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;
            let events = stmt
                .query_map(params![limit as i64], |row| {
                    let details: Option<String> = row.get(3)?;
                    Ok(SystemLogEntry {
                        id: row.get(0)?,
                        level: row.get(1)?,
                        message: row.get(2)?,
                        details: details.and_then(|d| serde_json::from_str(&d).ok()),
                        timestamp: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await?
    }

    /// Run the exchange insert and then fail before the stats update, so
    /// tests can verify the transaction leaves nothing behind.
    #[cfg(test)]
    async fn append_with_injected_failure(
        &self,
        agent_id: &str,
        user_message: &str,
        agent_response: &str,
    ) -> Result<(), HubError> {
        let conn = self.conn.clone();
        let agent_id = agent_id.to_string();
        let user_message = user_message.to_string();
        let agent_response = agent_response.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            let now = Utc::now();
            insert_exchange(&tx, &agent_id, &user_message, now, &agent_response, now, None)?;
            // Dropping the transaction here rolls the exchange back.
            Err(HubError::Storage("injected fault".to_string()))
        })
        .await?
    }

    /// Shift every row's retention timestamp into the past.
    #[cfg(test)]
    async fn backdate_all(&self, days: u32) -> Result<(), HubError> {
        let conn = self.conn.clone();
        let shift = format!("-{} days", days);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "UPDATE conversations SET created_at = datetime('now', ?1)",
                params![shift],
            )?;
            conn.execute(
                "UPDATE system_logs SET timestamp = datetime('now', ?1)",
                params![shift],
            )?;
            Ok(())
        })
        .await?
    }
}

fn insert_exchange(
    tx: &Transaction<'_>,
    agent_id: &str,
    user_message: &str,
    user_timestamp: DateTime<Utc>,
    agent_response: &str,
    agent_timestamp: DateTime<Utc>,
    usage: Option<&Usage>,
) -> Result<(), HubError> {
    let usage_data = usage.map(serde_json::to_string).transpose()?;
    tx.execute(
        "INSERT INTO conversations
         (agent_id, user_message, agent_response,
          user_message_timestamp, agent_response_timestamp, usage_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            agent_id,
            user_message,
            agent_response,
            user_timestamp.to_rfc3339(),
            agent_timestamp.to_rfc3339(),
            usage_data,
        ],
    )?;
    Ok(())
}

fn bump_stats(tx: &Transaction<'_>, agent_id: &str, usage: Option<&Usage>) -> Result<(), HubError> {
    let tokens = usage.map(|u| u.total_tokens as i64).unwrap_or(0);
    tx.execute(
        "INSERT INTO agent_stats (agent_id, total_conversations, total_tokens_used, last_used)
         VALUES (?1, 1, ?2, datetime('now'))
         ON CONFLICT(agent_id) DO UPDATE SET
             total_conversations = total_conversations + 1,
             total_tokens_used = total_tokens_used + excluded.total_tokens_used,
             last_used = excluded.last_used,
             updated_at = datetime('now')",
        params![agent_id, tokens],
    )?;
    Ok(())
}

fn parse_exchange(row: &rusqlite::Row<'_>) -> Result<Exchange, rusqlite::Error> {
    let usage_data: Option<String> = row.get(6)?;
    Ok(Exchange {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        user_message: row.get(2)?,
        agent_response: row.get(3)?,
        user_timestamp: row.get(4)?,
        agent_timestamp: row.get(5)?,
        usage: usage_data.and_then(|d| serde_json::from_str(&d).ok()),
        created_at: row.get(7)?,
    })
}

fn parse_stats(row: &rusqlite::Row<'_>) -> Result<AgentStats, rusqlite::Error> {
    Ok(AgentStats {
        agent_id: row.get(0)?,
        total_conversations: row.get(1)?,
        total_tokens_used: row.get(2)?,
        last_used: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
