//! Narrow contracts for the external services a report run calls into.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

/// Role-tagged message sent to a text generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// LLM call constrained to return JSON matching `schema`.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Stateless text generation, one call per invocation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// Research lookup returning result snippets, possibly none.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

pub type DynStructuredGenerator = Arc<dyn StructuredGenerator>;
pub type DynTextGenerator = Arc<dyn TextGenerator>;
pub type DynSearchProvider = Arc<dyn SearchProvider>;

/// The three collaborators injected into a report engine.
#[derive(Clone)]
pub struct Collaborators {
    pub structured: DynStructuredGenerator,
    pub text: DynTextGenerator,
    pub search: DynSearchProvider,
}

impl Collaborators {
    pub fn new(
        structured: DynStructuredGenerator,
        text: DynTextGenerator,
        search: DynSearchProvider,
    ) -> Self {
        Self {
            structured,
            text,
            search,
        }
    }
}
