//! Shared state threaded through one report run, and the phase machine that
//! guards it.
//!
//! ```text
//! Start -> Planning -> Dispatched -> Working -> Aggregating -> Done
//!              \            \           \            \
//!               +------------+-----------+------------+--> Failed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accumulator::{CompletedSection, SectionAccumulator};
use crate::dispatcher::{WorkerInput, dispatch};
use crate::error::{FailureRecord, ReportError, Stage};
use crate::section::Section;
use crate::trace::TraceCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    Planning,
    Dispatched,
    Working,
    Aggregating,
    Done,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Start => "start",
            RunPhase::Planning => "planning",
            RunPhase::Dispatched => "dispatched",
            RunPhase::Working => "working",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state container for a single report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    topic: String,
    tone: Option<String>,
    phase: RunPhase,
    sections: Vec<Section>,
    completed_sections: Vec<CompletedSection>,
    final_report: Option<String>,
    failure: Option<FailureRecord>,
    trace: TraceCollector,
}

impl SharedState {
    pub fn new(topic: impl Into<String>, tone: Option<String>) -> Self {
        Self {
            topic: topic.into(),
            tone,
            phase: RunPhase::Start,
            sections: Vec::new(),
            completed_sections: Vec::new(),
            final_report: None,
            failure: None,
            trace: TraceCollector::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tone(&self) -> Option<&str> {
        self.tone.as_deref()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn completed_sections(&self) -> &[CompletedSection] {
        &self.completed_sections
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    pub fn trace(&self) -> &TraceCollector {
        &self.trace
    }

    pub fn record(&mut self, task_id: &str, message: impl Into<String>) {
        self.trace.record(task_id, message);
    }

    fn transition(&mut self, from: &[RunPhase], to: RunPhase) -> Result<(), ReportError> {
        if !from.contains(&self.phase) {
            return Err(ReportError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    pub fn begin_planning(&mut self) -> Result<(), ReportError> {
        self.transition(&[RunPhase::Start], RunPhase::Planning)
    }

    /// Store the plan. Sections are written once and read-only afterwards.
    pub fn record_plan(&mut self, sections: Vec<Section>) -> Result<(), ReportError> {
        if self.phase != RunPhase::Planning || !self.sections.is_empty() {
            return Err(ReportError::InvalidTransition {
                from: self.phase,
                to: RunPhase::Planning,
            });
        }
        self.sections = sections;
        Ok(())
    }

    /// Mark the plan as dispatched and return one input per section.
    ///
    /// Succeeds at most once per run.
    pub fn begin_dispatch(&mut self) -> Result<Vec<WorkerInput>, ReportError> {
        if self.sections.is_empty() {
            return Err(ReportError::InvalidTransition {
                from: self.phase,
                to: RunPhase::Dispatched,
            });
        }
        self.transition(&[RunPhase::Planning], RunPhase::Dispatched)?;
        Ok(dispatch(&self.sections))
    }

    pub fn begin_working(&mut self) -> Result<(), ReportError> {
        self.transition(&[RunPhase::Dispatched], RunPhase::Working)
    }

    /// Append every worker entry from the accumulator, in plan order.
    pub fn absorb(&mut self, accumulator: &SectionAccumulator) -> Result<(), ReportError> {
        if self.phase != RunPhase::Working {
            return Err(ReportError::InvalidTransition {
                from: self.phase,
                to: RunPhase::Working,
            });
        }
        let entries = accumulator.plan_ordered(self.sections.len())?;
        self.completed_sections.extend(entries);
        Ok(())
    }

    /// Enter aggregation, returning the section texts in plan order.
    ///
    /// Refused until every planned section has exactly one completed entry.
    pub fn begin_aggregation(&mut self) -> Result<Vec<String>, ReportError> {
        if self.phase == RunPhase::Working
            && self.completed_sections.len() != self.sections.len()
        {
            return Err(ReportError::aggregation(format!(
                "only {} of {} sections completed",
                self.completed_sections.len(),
                self.sections.len()
            )));
        }
        self.transition(&[RunPhase::Working], RunPhase::Aggregating)?;

        let mut ordered = self.completed_sections.clone();
        ordered.sort_by_key(|entry| entry.index);
        Ok(ordered.into_iter().map(|entry| entry.text).collect())
    }

    pub fn finish(&mut self, report: String) -> Result<(), ReportError> {
        self.transition(&[RunPhase::Aggregating], RunPhase::Done)?;
        self.final_report = Some(report);
        Ok(())
    }

    pub fn fail(&mut self, stage: Stage, err: &ReportError) {
        self.failure = Some(FailureRecord::from_error(stage, err));
        self.phase = RunPhase::Failed;
    }

    /// Final report on success, or the tagged failure.
    pub fn outcome(&self) -> Result<String, ReportError> {
        match (self.phase, &self.final_report, &self.failure) {
            (RunPhase::Done, Some(report), _) => Ok(report.clone()),
            (RunPhase::Failed, _, Some(failure)) => Err(failure.clone().into_error()),
            (phase, _, _) => Err(ReportError::Workflow(format!(
                "run stopped in non-terminal phase {phase}"
            ))),
        }
    }
}
