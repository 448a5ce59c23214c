//! Plan stage: turns a topic into an ordered list of report sections.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::ReportError;
use crate::providers::DynStructuredGenerator;
use crate::section::{Section, SectionPlan};

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("invalid url regex"));

/// URLs embedded literally in `text`, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_PATTERN.find_iter(text) {
        let url = found.as_str().trim_end_matches(['.', ',', ';', ':']);
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// JSON Schema handed to the structured generator.
pub fn plan_schema(max_sections: usize) -> Value {
    json!({
        "type": "object",
        "required": ["sections"],
        "properties": {
            "sections": {
                "type": "array",
                "minItems": 1,
                "maxItems": max_sections,
                "items": {
                    "type": "object",
                    "required": ["name", "description"],
                    "properties": {
                        "name": {"type": "string", "minLength": 1},
                        "description": {"type": "string", "minLength": 1},
                        "search_queries": {
                            "type": "array",
                            "items": {"type": "string", "minLength": 1}
                        }
                    }
                }
            }
        }
    })
}

fn system_prompt(max_sections: usize, urls: &[String]) -> String {
    let mut prompt = format!(
        "You are a meticulous content planner for in-depth articles. \
         Generate a report plan with at most {max_sections} section(s). Each section must include:\n\
         1. A clear and concise name (required, unique within the plan).\n\
         2. A detailed description outlining what the section should cover (required).\n\
         3. An optional list of search queries if additional research is necessary.\n\n\
         Encourage the use of external search results wherever possible to verify and update the information."
    );
    if !urls.is_empty() {
        prompt.push_str(
            "\n\nThe topic references the following URLs. Each must appear verbatim in the search queries of some section:\n",
        );
        for url in urls {
            prompt.push_str("- ");
            prompt.push_str(url);
            prompt.push('\n');
        }
    }
    prompt
}

/// Plan stage backed by a structured-output generator.
pub struct Planner {
    generator: DynStructuredGenerator,
    max_sections: usize,
}

impl Planner {
    pub fn new(generator: DynStructuredGenerator, max_sections: usize) -> Self {
        Self {
            generator,
            max_sections,
        }
    }

    /// Decompose `topic` into between one and `max_sections` sections.
    #[instrument(name = "planner.plan", skip(self))]
    pub async fn plan(&self, topic: &str) -> Result<Vec<Section>, ReportError> {
        let urls = extract_urls(topic);
        let system = system_prompt(self.max_sections, &urls);
        let user = format!("Topic: {topic}");
        let schema = plan_schema(self.max_sections);

        debug!(urls = ?urls, max_sections = self.max_sections, "requesting report plan");

        let raw = self
            .generator
            .generate_structured(&system, &user, &schema)
            .await
            .map_err(|err| ReportError::planning(format!("structured generation failed: {err:#}")))?;

        let plan = SectionPlan::from_value(raw, self.max_sections)?;

        for url in &urls {
            let routed = plan
                .sections
                .iter()
                .any(|s| s.search_queries.iter().any(|q| q.contains(url.as_str())));
            if !routed {
                warn!(%url, "planner did not route topic url into any search query");
            }
        }

        info!(section_count = plan.len(), "report plan ready");
        Ok(plan.into_sections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StructuredGenerator;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct CannedPlan {
        response: anyhow::Result<Value>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedPlan {
        fn ok(value: Value) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(value),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StructuredGenerator for CannedPlan {
        async fn generate_structured(
            &self,
            system_prompt: &str,
            _user_prompt: &str,
            _schema: &Value,
        ) -> anyhow::Result<Value> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    #[test]
    fn extracts_urls_without_trailing_punctuation() {
        let urls = extract_urls("Summarise https://example.com/a, and http://foo.org/b.");
        assert_eq!(urls, vec!["https://example.com/a", "http://foo.org/b"]);
    }

    #[test]
    fn schema_caps_section_count() {
        let schema = plan_schema(2);
        assert_eq!(schema["properties"]["sections"]["maxItems"], 2);
        assert_eq!(schema["properties"]["sections"]["minItems"], 1);
    }

    #[tokio::test]
    async fn plan_returns_validated_sections() {
        let generator = CannedPlan::ok(json!({
            "sections": [
                {"name": "Intro", "description": "Background",
                 "search_queries": ["https://example.com/post"]},
                {"name": "Impact", "description": "Consequences"}
            ]
        }));
        let planner = Planner::new(generator.clone(), 2);

        let sections = planner
            .plan("Explain https://example.com/post")
            .await
            .unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "Intro");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("https://example.com/post"));
    }

    #[tokio::test]
    async fn generator_failure_is_a_planning_error() {
        let generator = Arc::new(CannedPlan {
            response: Err(anyhow::anyhow!("rate limited")),
            prompts: Mutex::new(Vec::new()),
        });
        let planner = Planner::new(generator, 2);

        let err = planner.plan("anything").await.unwrap_err();
        assert!(matches!(err, ReportError::Planning { .. }));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn malformed_list_is_a_planning_error() {
        let generator = CannedPlan::ok(json!({"sections": "not a list"}));
        let planner = Planner::new(generator, 2);

        let err = planner.plan("anything").await.unwrap_err();
        assert!(matches!(err, ReportError::Planning { .. }));
    }
}
