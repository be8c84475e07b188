//! Builtin agent templates.
//!
//! Templates are immutable seed records used to pre-populate the create
//! flow. They live in their own directory keyed by a template slot, outside
//! the agent identity space, and are written exactly once.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::AgentDraft;
use crate::error::HubError;

/// A seed record for the create flow. Not an agent; carries no identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub template_id: String,
    #[serde(flatten)]
    pub draft: AgentDraft,
}

/// Seed the builtin templates if the directory holds none. Idempotent: a
/// non-empty directory is left untouched.
pub(super) fn ensure_seeded(dir: &Path) -> Result<(), HubError> {
    let has_templates = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"));
    if has_templates {
        return Ok(());
    }

    let builtin = builtin_templates();
    for template in &builtin {
        let path = dir.join(format!("{}.json", template.template_id));
        std::fs::write(&path, serde_json::to_string_pretty(template)?)?;
    }
    tracing::info!("Seeded {} builtin agent templates", builtin.len());
    Ok(())
}

/// Load every template in the directory, ordered by slot.
pub(super) fn load(dir: &Path) -> Result<Vec<Template>, HubError> {
    let mut templates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|x| x.to_str()) != Some("json") {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        let mut template: Template = serde_json::from_str(&contents)?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            template.template_id = stem.to_string();
        }
        templates.push(template);
    }
    templates.sort_by(|a, b| a.template_id.cmp(&b.template_id));
    Ok(templates)
}

fn template(id: &str, draft: AgentDraft) -> Template {
    Template {
        template_id: id.to_string(),
        draft,
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "template_1",
            AgentDraft {
                name: "General Assistant".to_string(),
                description: "A helpful general-purpose AI assistant".to_string(),
                system_prompt: "You are a helpful, harmless, and honest AI assistant. \
                    Provide clear, accurate, and helpful responses to user queries."
                    .to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 1000,
                tools: vec![],
                enabled: true,
            },
        ),
        template(
            "template_2",
            AgentDraft {
                name: "Code Assistant".to_string(),
                description: "An AI assistant specialized in programming and software development"
                    .to_string(),
                system_prompt: "You are an expert software developer and programming assistant. \
                    Help users with coding questions, debugging, code review, and software \
                    architecture. Provide clear explanations and working code examples."
                    .to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                temperature: 0.3,
                max_tokens: 2000,
                tools: vec!["file_reader".to_string()],
                enabled: true,
            },
        ),
        template(
            "template_3",
            AgentDraft {
                name: "Research Assistant".to_string(),
                description: "An AI assistant for research and information gathering".to_string(),
                system_prompt: "You are a research assistant that helps users find, analyze, \
                    and synthesize information. Provide well-researched, accurate, and \
                    comprehensive responses with proper citations when possible."
                    .to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                temperature: 0.5,
                max_tokens: 1500,
                tools: vec!["web_search".to_string()],
                enabled: true,
            },
        ),
        template(
            "template_4",
            AgentDraft {
                name: "Math Tutor".to_string(),
                description: "An AI tutor specialized in mathematics".to_string(),
                system_prompt: "You are a patient and knowledgeable mathematics tutor. Help \
                    students understand mathematical concepts, solve problems step-by-step, \
                    and provide clear explanations. Encourage learning and build confidence."
                    .to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.4,
                max_tokens: 1200,
                tools: vec!["calculator".to_string()],
                enabled: true,
            },
        ),
    ]
}
