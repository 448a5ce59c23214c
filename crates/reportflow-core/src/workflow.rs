use std::path::PathBuf;
use std::sync::Arc;

use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ReportError;
use crate::metrics::record_run;
use crate::planner::Planner;
use crate::providers::Collaborators;
use crate::section::Section;
use crate::state::SharedState;
use crate::tasks::{FanOutTask, PlanTask, STATE_KEY, SynthesizeTask};
use crate::trace::{TraceEvent, TraceSummary, persist_trace};
use crate::worker::SectionWriter;

/// The tasks wired into a report graph.
#[derive(Clone)]
pub struct ReportGraphTasks {
    pub plan: Arc<PlanTask>,
    pub fan_out: Arc<FanOutTask>,
    pub synthesize: Arc<SynthesizeTask>,
}

/// Input for one report run.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub topic: String,
    pub tone: Option<String>,
    pub run_id: Option<String>,
}

impl ReportRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            tone: None,
            run_id: None,
        }
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Result of a successful report run.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub run_id: String,
    pub report: String,
    pub sections: Vec<Section>,
    pub trace_events: Vec<TraceEvent>,
    pub trace_summary: TraceSummary,
    pub trace_path: Option<PathBuf>,
}

/// Plans, drafts, and assembles reports using injected collaborators.
pub struct ReportEngine {
    collaborators: Collaborators,
    config: Config,
}

impl ReportEngine {
    pub fn new(collaborators: Collaborators, config: Config) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    fn build_graph(&self) -> (Arc<graph_flow::Graph>, ReportGraphTasks) {
        let planner = Arc::new(Planner::new(
            self.collaborators.structured.clone(),
            self.config.planner.max_sections,
        ));
        let writer = Arc::new(SectionWriter::new(
            self.collaborators.text.clone(),
            self.collaborators.search.clone(),
        ));

        let tasks = ReportGraphTasks {
            plan: Arc::new(PlanTask::new(planner)),
            fan_out: Arc::new(FanOutTask::new(
                writer,
                self.config.workers.max_concurrency,
            )),
            synthesize: Arc::new(SynthesizeTask::new(
                self.collaborators.text.clone(),
                self.config.aggregation.clone(),
            )),
        };

        let graph = GraphBuilder::new("reportflow")
            .add_task(tasks.plan.clone())
            .add_task(tasks.fan_out.clone())
            .add_task(tasks.synthesize.clone())
            .add_edge(tasks.plan.id(), tasks.fan_out.id())
            .add_edge(tasks.fan_out.id(), tasks.synthesize.id())
            .set_start_task(tasks.plan.id())
            .build();

        (Arc::new(graph), tasks)
    }

    /// Run one report end-to-end: plan, draft every section, then aggregate.
    pub async fn run(&self, request: ReportRequest) -> Result<ReportOutcome, ReportError> {
        let (graph, tasks) = self.build_graph();

        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(%run_id, topic = %request.topic, tone = ?request.tone, "starting report run");

        let session = Session::new_from_task(run_id.clone(), tasks.plan.id());
        let state = SharedState::new(request.topic, request.tone);
        session.context.set(STATE_KEY, &state).await;

        storage
            .save(session)
            .await
            .map_err(|err| ReportError::Workflow(format!("failed to persist session: {err}")))?;

        // Every task either continues straight into the next one or ends the
        // graph, so a single runner pass reaches a terminal phase.
        let result = runner
            .run(&run_id)
            .await
            .map_err(|err| ReportError::Workflow(format!("graph execution failure: {err}")))?;

        match result.status {
            ExecutionStatus::Completed => {}
            ExecutionStatus::Error(message) => return Err(ReportError::Workflow(message)),
            _ => {
                return Err(ReportError::Workflow(
                    "report graph paused before completion".to_string(),
                ));
            }
        }

        let session = storage
            .get(&run_id)
            .await
            .map_err(|err| ReportError::Workflow(format!("failed to reload session: {err}")))?
            .ok_or_else(|| ReportError::Workflow("session missing after execution".to_string()))?;

        let state: SharedState = session
            .context
            .get(STATE_KEY)
            .await
            .ok_or_else(|| ReportError::Workflow("report state missing after execution".into()))?;

        let trace_path = self.persist_trace(&run_id, &state);
        let status = state.phase();

        match state.outcome() {
            Ok(report) => {
                record_run("success", state.sections().len());
                info!(%run_id, %status, sections = state.sections().len(), "report run finished");
                let trace_summary = state.trace().summary();
                Ok(ReportOutcome {
                    run_id,
                    report,
                    sections: state.sections().to_vec(),
                    trace_events: state.trace().events().to_vec(),
                    trace_summary,
                    trace_path,
                })
            }
            Err(err) => {
                record_run("failure", state.sections().len());
                warn!(%run_id, %status, error = %err, "report run failed");
                Err(err)
            }
        }
    }

    fn persist_trace(&self, run_id: &str, state: &SharedState) -> Option<PathBuf> {
        let dir = self.config.trace.dir.as_ref()?;
        match persist_trace(dir, run_id, state.trace().events()) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(error = %err, dir = %dir.display(), "failed to persist run trace");
                None
            }
        }
    }
}
