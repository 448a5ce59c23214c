//! Scripted collaborators for workflow tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reportflow_core::{
    ChatMessage, Collaborators, SearchProvider, StructuredGenerator, TextGenerator,
};
use serde_json::{Value, json};

pub struct ScriptedPlanner {
    response: Result<Value, String>,
    pub calls: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn sections(sections: Vec<(&str, &str, Vec<&str>)>) -> Arc<Self> {
        let sections: Vec<Value> = sections
            .into_iter()
            .map(|(name, description, queries)| {
                json!({"name": name, "description": description, "search_queries": queries})
            })
            .collect();
        Self::raw(json!({ "sections": sections }))
    }

    pub fn raw(value: Value) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(value),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StructuredGenerator for ScriptedPlanner {
    async fn generate_structured(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _schema: &Value,
    ) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(anyhow::Error::msg)
    }
}

#[derive(Default, Clone)]
pub struct SectionScript {
    pub delay_ms: u64,
    pub fail: bool,
    pub panic: bool,
}

impl SectionScript {
    pub fn delayed(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }
}

/// Drafts `text for <name>` per section and rewrites tone requests as
/// `TONED: <combined>`.
#[derive(Default)]
pub struct ScriptedWriter {
    scripts: HashMap<String, SectionScript>,
    fail_editor: bool,
    pub drafted: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
    pub contexts: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub editor_calls: AtomicUsize,
    pub slow_finished: AtomicBool,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, name: &str, script: SectionScript) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn failing_editor(mut self) -> Self {
        self.fail_editor = true;
        self
    }

    pub fn drafted(&self) -> Vec<String> {
        self.drafted.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn context_for(&self, name: &str) -> Vec<ChatMessage> {
        self.contexts
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl ScriptedWriter {
    async fn draft(&self, name: &str, script: &SectionScript) -> anyhow::Result<String> {
        if script.fail {
            anyhow::bail!("generation failed for {name}");
        }
        if script.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
            self.slow_finished.store(true, Ordering::SeqCst);
        }

        self.completed.lock().unwrap().push(name.to_string());
        Ok(format!("text for {name}"))
    }
}

fn section_name(messages: &[ChatMessage]) -> Option<String> {
    messages.iter().find_map(|m| {
        m.content
            .strip_prefix("Section: ")
            .and_then(|rest| rest.split('\n').next())
            .map(str::to_string)
    })
}

#[async_trait]
impl TextGenerator for ScriptedWriter {
    async fn generate_text(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let Some(name) = section_name(messages) else {
            self.editor_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_editor {
                anyhow::bail!("editor unavailable");
            }
            return Ok(format!("TONED: {}", messages[1].content));
        };

        self.drafted.lock().unwrap().push(name.clone());
        self.contexts
            .lock()
            .unwrap()
            .insert(name.clone(), messages.to_vec());

        let script = self.scripts.get(&name).cloned().unwrap_or_default();
        if script.panic {
            panic!("text client bug while drafting {name}");
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.draft(&name, &script).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Search returning canned snippets; queries listed in `failing` error out.
#[derive(Default)]
pub struct ScriptedSearch {
    results: HashMap<String, Vec<String>>,
    failing: Vec<String>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, results: &[&str]) -> Self {
        self.results.insert(
            query.to_string(),
            results.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        if self.failing.iter().any(|q| q == query) {
            anyhow::bail!("search backend unreachable");
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

pub fn collaborators(
    planner: Arc<ScriptedPlanner>,
    writer: Arc<ScriptedWriter>,
    search: ScriptedSearch,
) -> Collaborators {
    Collaborators::new(planner, writer, Arc::new(search))
}
