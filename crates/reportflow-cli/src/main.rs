use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use reportflow_core::{
    ConfigLoader, ReportEngine, ReportRequest, init_telemetry, offline_collaborators,
};
use tokio::runtime::Runtime;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "reportflow-cli",
    version,
    about = "Plan, draft, and assemble multi-section reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a report for a topic using the offline collaborators.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to report on; embedded URLs are routed into research queries.
    #[arg(long)]
    topic: String,

    /// Rewrite the assembled report in this tone.
    #[arg(long)]
    tone: Option<String>,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optional run ID (a UUID is generated otherwise).
    #[arg(long)]
    run_id: Option<String>,

    /// Directory to write the run trace to (overrides `trace.dir`).
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Print the run trace after the report.
    #[arg(long, default_value_t = false)]
    show_trace: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await,
        }
    })
}

async fn run_command(args: RunArgs) -> Result<ExitCode> {
    let mut config = ConfigLoader::load(args.config)?;
    if let Some(dir) = args.trace_dir {
        config.trace.dir = Some(dir);
    }

    init_telemetry(&config.logging)?;

    info!(topic = %args.topic, "starting report run");

    let mut request = ReportRequest::new(args.topic);
    if let Some(tone) = args.tone {
        request = request.with_tone(tone);
    }
    if let Some(run_id) = args.run_id {
        request = request.with_run_id(run_id);
    }

    let engine = ReportEngine::new(offline_collaborators(), config);
    match engine.run(request).await {
        Ok(outcome) => {
            println!("{}", outcome.report);
            if args.show_trace {
                println!("\n{}", outcome.trace_summary.render_markdown());
            }
            if let Some(path) = outcome.trace_path {
                info!(path = %path.display(), "trace written");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let stage = err.stage().map(|s| s.as_str()).unwrap_or("workflow");
            error!(stage, section = ?err.section(), "report run failed");
            eprintln!("report failed during {stage}: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
