use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Drafted text of one section, tagged with its position in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSection {
    pub index: usize,
    pub name: String,
    pub text: String,
}

/// Concurrency-safe collector receiving one entry per section worker.
///
/// Entries are keyed by plan index, so completion order never affects the
/// order in which they are read back.
#[derive(Debug, Clone, Default)]
pub struct SectionAccumulator {
    entries: Arc<DashMap<usize, CompletedSection>>,
}

impl SectionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the drafted text for the section at `index`.
    ///
    /// A second append for the same index is rejected; the first entry stays.
    pub fn append(
        &self,
        index: usize,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), ReportError> {
        let name = name.into();
        match self.entries.entry(index) {
            Entry::Occupied(_) => Err(ReportError::drafting(
                name,
                format!("section {index} already has a completed entry"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(CompletedSection {
                    index,
                    name,
                    text: text.into(),
                });
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read back all entries in plan order, requiring exactly `expected` of them.
    pub fn plan_ordered(&self, expected: usize) -> Result<Vec<CompletedSection>, ReportError> {
        let mut ordered = Vec::with_capacity(expected);
        for index in 0..expected {
            let entry = self.entries.get(&index).ok_or_else(|| {
                ReportError::aggregation(format!(
                    "section {index} has not completed ({} of {expected} present)",
                    self.entries.len()
                ))
            })?;
            ordered.push(entry.value().clone());
        }

        if self.entries.len() != expected {
            return Err(ReportError::aggregation(format!(
                "expected {expected} completed sections, found {}",
                self.entries.len()
            )));
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_completion_reads_back_in_plan_order() {
        let acc = SectionAccumulator::new();
        acc.append(1, "B", "beta").unwrap();
        acc.append(0, "A", "alpha").unwrap();

        let ordered = acc.plan_ordered(2).unwrap();
        let texts: Vec<_> = ordered.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn duplicate_append_never_clobbers() {
        let acc = SectionAccumulator::new();
        acc.append(0, "A", "first").unwrap();
        assert!(acc.append(0, "A", "second").is_err());

        let ordered = acc.plan_ordered(1).unwrap();
        assert_eq!(ordered[0].text, "first");
    }

    #[test]
    fn incomplete_accumulator_is_rejected() {
        let acc = SectionAccumulator::new();
        acc.append(0, "A", "alpha").unwrap();
        assert!(acc.plan_ordered(2).is_err());
    }

    #[tokio::test]
    async fn concurrent_appends_merge() {
        let acc = SectionAccumulator::new();
        let mut handles = Vec::new();
        for index in 0..16 {
            let acc = acc.clone();
            handles.push(tokio::spawn(async move {
                acc.append(index, format!("s{index}"), format!("text {index}"))
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(acc.len(), 16);
        let ordered = acc.plan_ordered(16).unwrap();
        assert!(ordered.iter().enumerate().all(|(i, c)| c.index == i));
    }
}
