use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::accumulator::SectionAccumulator;
use crate::aggregator::AggregationStrategy;
use crate::config::AggregationConfig;
use crate::error::{ReportError, Stage};
use crate::planner::Planner;
use crate::providers::DynTextGenerator;
use crate::state::SharedState;
use crate::worker::SectionWriter;

/// Context key holding the serialised [`SharedState`].
pub(crate) const STATE_KEY: &str = "report.state";

async fn load_state(context: &Context) -> Option<SharedState> {
    context.get::<SharedState>(STATE_KEY).await
}

fn missing_state(task_id: &str) -> TaskResult {
    warn!(task = task_id, "report state missing from context");
    TaskResult::new(
        Some(format!("{task_id}: report state missing")),
        NextAction::End,
    )
}

/// Store the state after a stage and choose the next step.
///
/// Failures are recorded on the state and end the graph, so the caller always
/// finds a terminal phase with the tagged error attached.
async fn complete_stage(
    context: &Context,
    mut state: SharedState,
    task_id: &str,
    stage: Stage,
    result: Result<String, ReportError>,
    next: NextAction,
) -> TaskResult {
    let (response, next) = match result {
        Ok(message) => {
            state.record(task_id, message.clone());
            (message, next)
        }
        Err(err) => {
            warn!(task = task_id, stage = %stage, error = %err, "stage failed");
            state.record(task_id, format!("failed: {err}"));
            state.fail(stage, &err);
            (err.to_string(), NextAction::End)
        }
    };

    context.set(STATE_KEY, &state).await;
    TaskResult::new(Some(response), next)
}

pub struct PlanTask {
    planner: Arc<Planner>,
}

impl PlanTask {
    pub fn new(planner: Arc<Planner>) -> Self {
        Self { planner }
    }

    async fn plan(&self, state: &mut SharedState) -> Result<String, ReportError> {
        state.begin_planning()?;
        let sections = self.planner.plan(state.topic()).await?;
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        let message = format!("planned {} section(s): {}", names.len(), names.join(", "));
        state.record_plan(sections)?;
        Ok(message)
    }
}

#[async_trait]
impl Task for PlanTask {
    fn id(&self) -> &str {
        "planner"
    }

    #[instrument(name = "task.plan", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(mut state) = load_state(&context).await else {
            return Ok(missing_state(self.id()));
        };

        let result = self.plan(&mut state).await;
        Ok(complete_stage(
            &context,
            state,
            self.id(),
            Stage::Planning,
            result,
            NextAction::ContinueAndExecute,
        )
        .await)
    }
}

/// Dispatches one worker per planned section and waits for all of them.
///
/// Fail-fast: the first drafting error cancels the remaining workers.
pub struct FanOutTask {
    writer: Arc<SectionWriter>,
    max_concurrency: usize,
}

impl FanOutTask {
    pub fn new(writer: Arc<SectionWriter>, max_concurrency: usize) -> Self {
        Self {
            writer,
            max_concurrency,
        }
    }

    async fn fan_out(&self, state: &mut SharedState) -> Result<String, ReportError> {
        let inputs = state.begin_dispatch()?;
        let worker_count = inputs.len();
        state.record(self.id(), format!("dispatched {worker_count} worker(s)"));
        state.begin_working()?;

        let accumulator = SectionAccumulator::new();
        let limiter =
            (self.max_concurrency > 0).then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        let mut workers = JoinSet::new();
        let mut sections_by_task = HashMap::with_capacity(worker_count);
        for input in inputs {
            let writer = Arc::clone(&self.writer);
            let accumulator = accumulator.clone();
            let limiter = limiter.clone();
            let section_name = input.section.name.clone();
            let handle = workers.spawn(async move {
                let name = input.section.name.clone();
                let _permit = match limiter {
                    Some(limiter) => Some(
                        limiter
                            .acquire_owned()
                            .await
                            .map_err(|err| ReportError::drafting(&name, err.to_string()))?,
                    ),
                    None => None,
                };
                let text = writer.write_into(&input, &accumulator).await?;
                Ok::<_, ReportError>((name, text.len()))
            });
            sections_by_task.insert(handle.id(), section_name);
        }

        while let Some(joined) = workers.join_next_with_id().await {
            let failure = match joined {
                Ok((_, Ok((name, chars)))) => {
                    debug!(section = %name, chars, "worker finished");
                    state.record(self.id(), format!("section '{name}' drafted ({chars} chars)"));
                    continue;
                }
                Ok((_, Err(err))) => err,
                Err(join_err) => {
                    let section = sections_by_task
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    let reason = if join_err.is_panic() {
                        format!("worker panicked: {join_err}")
                    } else {
                        format!("worker aborted: {join_err}")
                    };
                    ReportError::drafting(section, reason)
                }
            };

            let outstanding = workers.len();
            workers.shutdown().await;
            warn!(outstanding, "cancelled outstanding section workers");
            return Err(failure);
        }

        state.absorb(&accumulator)?;
        info!(sections = worker_count, "all section workers completed");
        Ok(format!("{worker_count} section(s) drafted"))
    }
}

#[async_trait]
impl Task for FanOutTask {
    fn id(&self) -> &str {
        "fan_out"
    }

    #[instrument(name = "task.fan_out", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(mut state) = load_state(&context).await else {
            return Ok(missing_state(self.id()));
        };

        let result = self.fan_out(&mut state).await;
        Ok(complete_stage(
            &context,
            state,
            self.id(),
            Stage::Drafting,
            result,
            NextAction::ContinueAndExecute,
        )
        .await)
    }
}

pub struct SynthesizeTask {
    text: DynTextGenerator,
    config: AggregationConfig,
}

impl SynthesizeTask {
    pub fn new(text: DynTextGenerator, config: AggregationConfig) -> Self {
        Self { text, config }
    }

    async fn synthesize(&self, state: &mut SharedState) -> Result<String, ReportError> {
        let texts = state.begin_aggregation()?;
        let aggregator =
            AggregationStrategy::select(state.tone(), &self.config).build(self.text.clone());

        let report = aggregator.aggregate(&texts).await?;
        let chars = report.len();
        state.finish(report)?;

        info!(strategy = aggregator.name(), chars, "final report assembled");
        Ok(format!("report assembled via {} ({chars} chars)", aggregator.name()))
    }
}

#[async_trait]
impl Task for SynthesizeTask {
    fn id(&self) -> &str {
        "synthesizer"
    }

    #[instrument(name = "task.synthesize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(mut state) = load_state(&context).await else {
            return Ok(missing_state(self.id()));
        };

        let result = self.synthesize(&mut state).await;
        Ok(complete_stage(
            &context,
            state,
            self.id(),
            Stage::Aggregation,
            result,
            NextAction::End,
        )
        .await)
    }
}
