//! Planned report sections and the validation applied to a plan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// One planned unit of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Identifies the unit; unique within a plan.
    pub name: String,
    /// Instructions for the section worker.
    pub description: String,
    /// Research lookups to perform before drafting, in order.
    #[serde(default, alias = "searchQueries")]
    pub search_queries: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            search_queries: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.search_queries.push(query.into());
        self
    }
}

/// Wire shape of a single section as emitted by the structured generator.
///
/// Accepts the older single `search_query` field next to the list form.
#[derive(Debug, Deserialize)]
struct RawSection {
    name: String,
    description: String,
    #[serde(default, alias = "searchQueries")]
    search_queries: Vec<String>,
    #[serde(default)]
    search_query: Option<String>,
}

impl From<RawSection> for Section {
    fn from(raw: RawSection) -> Self {
        let mut search_queries = raw.search_queries;
        if let Some(query) = raw.search_query {
            if !search_queries.contains(&query) {
                search_queries.push(query);
            }
        }
        Self {
            name: raw.name,
            description: raw.description,
            search_queries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    sections: Vec<RawSection>,
}

/// Ordered list of sections produced by the plan stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub sections: Vec<Section>,
}

impl SectionPlan {
    /// Parse and validate structured-generator output.
    pub fn from_value(value: serde_json::Value, max_sections: usize) -> Result<Self, ReportError> {
        let raw: RawPlan = serde_json::from_value(value)
            .map_err(|err| ReportError::planning(format!("plan does not match schema: {err}")))?;
        let plan = Self {
            sections: raw.sections.into_iter().map(Section::from).collect(),
        };
        plan.validate(max_sections)?;
        Ok(plan)
    }

    pub fn validate(&self, max_sections: usize) -> Result<(), ReportError> {
        if self.sections.is_empty() {
            return Err(ReportError::planning("plan contains no sections"));
        }
        if self.sections.len() > max_sections {
            return Err(ReportError::planning(format!(
                "plan contains {} sections; at most {max_sections} allowed",
                self.sections.len()
            )));
        }

        let mut seen = HashSet::new();
        for (idx, section) in self.sections.iter().enumerate() {
            if section.name.trim().is_empty() {
                return Err(ReportError::planning(format!(
                    "section {} has an empty name",
                    idx + 1
                )));
            }
            if section.description.trim().is_empty() {
                return Err(ReportError::planning(format!(
                    "section '{}' has an empty description",
                    section.name
                )));
            }
            if !seen.insert(section.name.trim()) {
                return Err(ReportError::planning(format!(
                    "duplicate section name '{}'",
                    section.name
                )));
            }
            if section.search_queries.iter().any(|q| q.trim().is_empty()) {
                return Err(ReportError::planning(format!(
                    "section '{}' has a blank search query",
                    section.name
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }
}
