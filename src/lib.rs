//! Agent registry and runtime session cache.
//!
//! This crate keeps a durable registry of AI agent definitions, builds
//! cached runtime handles for them on demand, and dispatches user messages
//! through a provider-agnostic model client while recording every completed
//! exchange in a SQLite ledger.
//!
//! The [`Hub`] façade is the intended entry point:
//!
//! - agent definitions persist as JSON records and survive restarts
//!   ([`agents`]);
//! - runtime handles are built lazily with single-flight deduplication and
//!   evicted whenever their definition changes ([`runtime`]);
//! - provider availability is derived from settings plus live environment
//!   credentials, never cached ([`providers`]);
//! - exchanges and per-agent aggregates commit atomically ([`ledger`]).

pub mod agents;
pub mod config;
pub mod error;
pub mod hub;
pub mod ledger;
pub mod llm;
pub mod providers;
pub mod runtime;
pub mod tools;

pub use agents::{AgentDefinition, AgentDraft, AgentStore, Template};
pub use config::ConfigStore;
pub use error::HubError;
pub use hub::Hub;
pub use ledger::{AgentStats, ConversationLedger, Exchange, SystemLogEntry};
pub use llm::{ChatRequest, HttpModelClient, ModelClient, ModelReply, Usage};
pub use providers::{ProviderCatalog, ProviderEndpoint};
pub use runtime::{RuntimeHandle, SessionCache};
pub use tools::ToolKind;
