//! Aggregation stage: combines drafted sections into the final report.

use async_trait::async_trait;
use tracing::info;

use crate::config::{AggregationConfig, AggregationMode};
use crate::error::ReportError;
use crate::providers::{ChatMessage, DynTextGenerator};

/// Separator placed between sections in the combined report.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// How the final report is produced from the drafted sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationStrategy {
    Concatenate,
    NormalizeTone { tone: String },
}

impl AggregationStrategy {
    /// An explicit run tone always selects tone normalisation; otherwise the
    /// configured mode decides.
    pub fn select(tone: Option<&str>, config: &AggregationConfig) -> Self {
        match tone.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tone) => Self::NormalizeTone {
                tone: tone.to_string(),
            },
            None => match config.mode {
                AggregationMode::Concatenate => Self::Concatenate,
                AggregationMode::Tone => Self::NormalizeTone {
                    tone: config.default_tone.clone(),
                },
            },
        }
    }

    pub fn build(self, text: DynTextGenerator) -> Box<dyn Aggregator> {
        match self {
            Self::Concatenate => Box::new(ConcatenateSections),
            Self::NormalizeTone { tone } => Box::new(ToneNormalizer::new(text, tone)),
        }
    }
}

/// Join section texts, already in plan order, with [`SECTION_SEPARATOR`].
pub fn concatenate(sections: &[String]) -> String {
    sections.join(SECTION_SEPARATOR)
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Short label used in logs and traces.
    fn name(&self) -> &'static str;

    /// Produce the final report from the plan-ordered section texts.
    async fn aggregate(&self, sections: &[String]) -> Result<String, ReportError>;
}

pub struct ConcatenateSections;

#[async_trait]
impl Aggregator for ConcatenateSections {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    async fn aggregate(&self, sections: &[String]) -> Result<String, ReportError> {
        Ok(concatenate(sections))
    }
}

/// Rewrites the combined sections in a uniform tone.
pub struct ToneNormalizer {
    text: DynTextGenerator,
    tone: String,
}

impl ToneNormalizer {
    pub fn new(text: DynTextGenerator, tone: impl Into<String>) -> Self {
        Self {
            text,
            tone: tone.into(),
        }
    }
}

#[async_trait]
impl Aggregator for ToneNormalizer {
    fn name(&self) -> &'static str {
        "normalize_tone"
    }

    async fn aggregate(&self, sections: &[String]) -> Result<String, ReportError> {
        let combined = concatenate(sections);
        let messages = vec![
            ChatMessage::system(format!(
                "You are an editor. Rewrite the report below so that every section reads in a consistent {} tone. \
                 Keep the section order, headings, facts, and references intact.",
                self.tone
            )),
            ChatMessage::user(combined),
        ];

        let report = self
            .text
            .generate_text(&messages)
            .await
            .map_err(|err| ReportError::aggregation(format!("tone rewrite failed: {err:#}")))?;

        info!(tone = %self.tone, chars = report.len(), "report tone normalised");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TextGenerator;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct EchoEditor {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for EchoEditor {
        async fn generate_text(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok(format!("EDITED: {}", messages[1].content))
        }
    }

    struct BrokenEditor;

    #[async_trait]
    impl TextGenerator for BrokenEditor {
        async fn generate_text(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            anyhow::bail!("quota exhausted")
        }
    }

    fn sections() -> Vec<String> {
        vec!["alpha".to_string(), "beta".to_string()]
    }

    #[test]
    fn selection_routes_on_tone() {
        let config = AggregationConfig::default();
        assert_eq!(
            AggregationStrategy::select(Some("simple"), &config),
            AggregationStrategy::NormalizeTone {
                tone: "simple".into()
            }
        );
        assert_eq!(
            AggregationStrategy::select(None, &config),
            AggregationStrategy::Concatenate
        );
    }

    #[test]
    fn tone_mode_without_tone_uses_default() {
        let config = AggregationConfig {
            mode: AggregationMode::Tone,
            ..AggregationConfig::default()
        };
        assert_eq!(
            AggregationStrategy::select(None, &config),
            AggregationStrategy::NormalizeTone {
                tone: "professional".into()
            }
        );
    }

    #[tokio::test]
    async fn concatenation_joins_with_separator() {
        let report = ConcatenateSections.aggregate(&sections()).await.unwrap();
        assert_eq!(report, "alpha\n\n---\n\nbeta");
    }

    #[tokio::test]
    async fn tone_mode_rewrites_combined_text() {
        let editor = Arc::new(EchoEditor::default());
        let aggregator = ToneNormalizer::new(editor.clone(), "simple");

        let report = aggregator.aggregate(&sections()).await.unwrap();
        assert_eq!(report, "EDITED: alpha\n\n---\n\nbeta");
        assert!(editor.prompts.lock().unwrap()[0].contains("simple tone"));
    }

    #[tokio::test]
    async fn tone_rewrite_failure_is_an_aggregation_error() {
        let aggregator = ToneNormalizer::new(Arc::new(BrokenEditor), "simple");
        let err = aggregator.aggregate(&sections()).await.unwrap_err();
        assert!(matches!(err, ReportError::Aggregation { .. }));
    }
}
