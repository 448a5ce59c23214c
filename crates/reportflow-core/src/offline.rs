//! Deterministic in-process collaborators for offline runs and demos.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};

use crate::planner::extract_urls;
use crate::providers::{
    ChatMessage, Collaborators, Role, SearchProvider, StructuredGenerator, TextGenerator,
};

/// Plans a background section plus, when allowed, a findings section that
/// researches every URL in the topic.
#[derive(Default)]
pub struct OfflinePlanner;

#[async_trait]
impl StructuredGenerator for OfflinePlanner {
    async fn generate_structured(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
    ) -> anyhow::Result<Value> {
        let topic = user_prompt
            .strip_prefix("Topic:")
            .unwrap_or(user_prompt)
            .trim();
        let max_sections = schema["properties"]["sections"]["maxItems"]
            .as_u64()
            .unwrap_or(1);
        let urls = extract_urls(topic);

        let mut background_queries = vec![topic.to_string()];
        let mut sections = Vec::new();
        if max_sections >= 2 {
            sections.push(json!({
                "name": "Key Findings",
                "description": format!("Summarise the most important findings about {topic}."),
                "search_queries": urls,
            }));
        } else {
            background_queries.extend(urls);
        }
        sections.insert(
            0,
            json!({
                "name": "Background",
                "description": format!("Introduce {topic} and the context needed to follow the report."),
                "search_queries": background_queries,
            }),
        );

        Ok(json!({ "sections": sections }))
    }
}

/// Template-based writer.
///
/// Section requests produce a heading plus the brief; any other request
/// returns the last user message unchanged.
#[derive(Default)]
pub struct OfflineWriter;

#[async_trait]
impl TextGenerator for OfflineWriter {
    async fn generate_text(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let brief = messages
            .iter()
            .find_map(|m| m.content.strip_prefix("Section: "));

        if let Some(brief) = brief {
            let (name, description) = brief
                .split_once("\nDescription: ")
                .unwrap_or((brief, ""));
            let research = messages
                .iter()
                .filter(|m| m.content.starts_with("Search Results for query"))
                .count();
            return Ok(format!(
                "## {name}\n\n{description}\n\n_Drafted offline with {research} research block(s)._"
            ));
        }

        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .ok_or_else(|| anyhow::anyhow!("no user message to respond to"))
    }
}

/// In-memory search index keyed by exact query text.
#[derive(Default)]
pub struct StaticSearch {
    store: DashMap<String, Vec<String>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    pub fn insert(&self, query: impl Into<String>, snippets: Vec<String>) {
        self.store.entry(query.into()).or_default().extend(snippets);
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .store
            .get(query)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

/// Offline collaborators with an empty search index.
pub fn offline_collaborators() -> Collaborators {
    Collaborators::new(
        Arc::new(OfflinePlanner),
        Arc::new(OfflineWriter),
        Arc::new(StaticSearch::new()),
    )
}
