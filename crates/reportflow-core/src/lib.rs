//! ReportFlow core: plan a report, draft every section concurrently, then
//! assemble the result, all driven through `graph_flow`.
//!
//! A run moves through three graph tasks. The planner asks a structured-output
//! generator for the sections, the fan-out task launches one worker per
//! section against a shared accumulator, and the synthesizer combines the
//! drafts once every worker has reported back.

mod accumulator;
mod aggregator;
mod config;
mod dispatcher;
mod error;
mod metrics;
mod offline;
mod planner;
mod providers;
mod section;
mod state;
mod tasks;
mod telemetry;
mod trace;
mod worker;
mod workflow;

pub use accumulator::{CompletedSection, SectionAccumulator};
pub use aggregator::{
    AggregationStrategy, Aggregator, ConcatenateSections, SECTION_SEPARATOR, ToneNormalizer,
    concatenate,
};
pub use config::{
    AggregationConfig, AggregationMode, Config, ConfigLoader, LoggingConfig, MAX_PLAN_SECTIONS,
    PlannerConfig, TraceConfig, WorkerConfig,
};
pub use dispatcher::{WorkerInput, dispatch};
pub use error::{FailureRecord, ReportError, Stage};
pub use offline::{OfflinePlanner, OfflineWriter, StaticSearch, offline_collaborators};
pub use planner::{Planner, extract_urls, plan_schema};
pub use providers::{
    ChatMessage, Collaborators, DynSearchProvider, DynStructuredGenerator, DynTextGenerator, Role,
    SearchProvider, StructuredGenerator, TextGenerator,
};
pub use section::{Section, SectionPlan};
pub use state::{RunPhase, SharedState};
pub use tasks::{FanOutTask, PlanTask, SynthesizeTask};
pub use telemetry::init_telemetry;
pub use trace::{TraceCollector, TraceEvent, TraceStep, TraceSummary, persist_trace};
pub use worker::{NO_RESULTS_MARKER, SearchOutcome, SectionWriter};
pub use workflow::{ReportEngine, ReportGraphTasks, ReportOutcome, ReportRequest};
