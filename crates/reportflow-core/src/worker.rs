//! Section worker: researches and drafts a single section.

use std::time::Instant;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::accumulator::SectionAccumulator;
use crate::dispatcher::WorkerInput;
use crate::error::ReportError;
use crate::metrics::record_section_draft;
use crate::providers::{ChatMessage, DynSearchProvider, DynTextGenerator};
use crate::section::Section;

/// Prefix of the note added when a query produced nothing usable.
pub const NO_RESULTS_MARKER: &str = "No search results were found for query";

const WRITER_SYSTEM_PROMPT: &str = "You are an expert writer tasked with creating a detailed and accurate report section. \
Incorporate external search results as a primary source for verifying facts, and cite them as references. \
If search results are provided, use them to correct inaccuracies and add up-to-date information to your narrative.";

/// Result of one research lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Vec<String>),
    Empty,
    /// Lookup failed; handled exactly like `Empty`.
    Failed(String),
}

impl SearchOutcome {
    fn into_message(self, query: &str) -> ChatMessage {
        match self {
            SearchOutcome::Found(results) => ChatMessage::user(format!(
                "Search Results for query '{query}': {}\n\n\
                 Use these results to verify facts, correct any inaccuracies, and enrich your content.",
                results.join("\n")
            )),
            SearchOutcome::Empty | SearchOutcome::Failed(_) => ChatMessage::user(format!(
                "{NO_RESULTS_MARKER} '{query}'. \
                 If possible, consider related topics or rephrase the query in your writing."
            )),
        }
    }
}

/// Drafts the prose for one planned section.
pub struct SectionWriter {
    text: DynTextGenerator,
    search: DynSearchProvider,
}

impl SectionWriter {
    pub fn new(text: DynTextGenerator, search: DynSearchProvider) -> Self {
        Self { text, search }
    }

    async fn lookup(&self, query: &str) -> SearchOutcome {
        match self.search.search(query).await {
            Ok(results) => {
                let results: Vec<String> = results
                    .into_iter()
                    .filter(|snippet| !snippet.trim().is_empty())
                    .collect();
                if results.is_empty() {
                    SearchOutcome::Empty
                } else {
                    SearchOutcome::Found(results)
                }
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(%query, error = %reason, "search lookup failed; treating as no results");
                SearchOutcome::Failed(reason)
            }
        }
    }

    /// Assemble the drafting context: instructions, section brief, and one
    /// block per search query.
    pub async fn build_messages(&self, section: &Section) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(WRITER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Section: {}\nDescription: {}",
                section.name, section.description
            )),
        ];

        for query in &section.search_queries {
            let outcome = self.lookup(query).await;
            debug!(
                section = %section.name,
                %query,
                found = matches!(outcome, SearchOutcome::Found(_)),
                "search lookup complete"
            );
            messages.push(outcome.into_message(query));
        }

        messages
    }

    /// Draft the text for one section.
    pub async fn write(&self, section: &Section) -> Result<String, ReportError> {
        let span = info_span!("worker.section", section = %section.name);
        async {
            let started = Instant::now();
            let messages = self.build_messages(section).await;

            let result = self
                .text
                .generate_text(&messages)
                .await
                .map_err(|err| ReportError::drafting(&section.name, format!("{err:#}")));

            let duration_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(text) => {
                    record_section_draft("success", duration_ms);
                    info!(chars = text.len(), duration_ms, "section drafted");
                }
                Err(err) => {
                    record_section_draft("failure", duration_ms);
                    warn!(error = %err, duration_ms, "section drafting failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Draft the section and append the text to the run's accumulator.
    pub async fn write_into(
        &self,
        input: &WorkerInput,
        accumulator: &SectionAccumulator,
    ) -> Result<String, ReportError> {
        let text = self.write(&input.section).await?;
        accumulator.append(input.index, &input.section.name, text.clone())?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{SearchProvider, TextGenerator};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct MapSearch(HashMap<String, anyhow::Result<Vec<String>>>);

    #[async_trait]
    impl SearchProvider for MapSearch {
        async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
            match self.0.get(query) {
                Some(Ok(results)) => Ok(results.clone()),
                Some(Err(err)) => Err(anyhow::anyhow!("{err}")),
                None => Ok(Vec::new()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingText {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingText {
        async fn generate_text(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(format!("draft with {} messages", messages.len()))
        }
    }

    struct FailingText;

    #[async_trait]
    impl TextGenerator for FailingText {
        async fn generate_text(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            anyhow::bail!("model overloaded")
        }
    }

    fn writer_with(
        search: HashMap<String, anyhow::Result<Vec<String>>>,
    ) -> (SectionWriter, Arc<RecordingText>) {
        let text = Arc::new(RecordingText::default());
        let writer = SectionWriter::new(text.clone(), Arc::new(MapSearch(search)));
        (writer, text)
    }

    #[tokio::test]
    async fn found_results_become_a_labelled_block() {
        let mut search = HashMap::new();
        search.insert("rust async".to_string(), Ok(vec!["tokio".to_string()]));
        let (writer, _) = writer_with(search);

        let section = Section::new("Runtime", "Explain runtimes").with_query("rust async");
        let messages = writer.build_messages(&section).await;

        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("Section: Runtime"));
        assert!(
            messages[2]
                .content
                .starts_with("Search Results for query 'rust async': tokio")
        );
    }

    #[tokio::test]
    async fn empty_results_add_marker_and_still_draft() {
        let (writer, text) = writer_with(HashMap::new());
        let section = Section::new("Obscure", "Nothing to find").with_query("zzz");

        let draft = writer.write(&section).await.unwrap();
        assert!(!draft.is_empty());

        let calls = text.calls.lock().unwrap();
        let context = &calls[0];
        assert!(context[2].content.contains(NO_RESULTS_MARKER));
        assert!(!context.iter().any(|m| m.content.contains("Search Results for")));
    }

    #[tokio::test]
    async fn failed_lookup_degrades_to_no_results() {
        let mut search = HashMap::new();
        search.insert("bad".to_string(), Err(anyhow::anyhow!("timeout")));
        search.insert("good".to_string(), Ok(vec!["fact".to_string()]));
        let (writer, _) = writer_with(search);

        let section = Section::new("Mixed", "Both")
            .with_query("bad")
            .with_query("good");
        let messages = writer.build_messages(&section).await;

        assert!(messages[2].content.contains(NO_RESULTS_MARKER));
        assert!(messages[3].content.starts_with("Search Results for query 'good'"));
    }

    #[tokio::test]
    async fn no_queries_means_no_search_block() {
        let (writer, _) = writer_with(HashMap::new());
        let messages = writer.build_messages(&Section::new("Plain", "Just write")).await;
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn generation_failure_is_tagged_with_section() {
        let writer = SectionWriter::new(Arc::new(FailingText), Arc::new(MapSearch(HashMap::new())));
        let err = writer.write(&Section::new("S1", "desc")).await.unwrap_err();

        assert_eq!(err.section(), Some("S1"));
        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn write_into_appends_at_plan_index() {
        let (writer, _) = writer_with(HashMap::new());
        let acc = SectionAccumulator::new();
        let input = WorkerInput {
            index: 0,
            section: Section::new("Only", "one"),
        };

        let text = writer.write_into(&input, &acc).await.unwrap();
        let entries = acc.plan_ordered(1).unwrap();
        assert_eq!(entries[0].text, text);
        assert_eq!(entries[0].name, "Only");
    }
}
