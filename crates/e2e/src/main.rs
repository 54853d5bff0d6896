//! VAAS E2E runner entry point
//!
//! Exit codes: 0 when every scenario passed, 1 when any scenario failed,
//! 2 on a fatal orchestration error (build, spawn, readiness, config).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use vaas_e2e::config::HarnessConfig;
use vaas_e2e::scenario::ScenarioFile;
use vaas_e2e::{report, suite, E2eResult};

const EXIT_SCENARIO_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "vaas-e2e")]
#[command(about = "E2E test runner for the VAAS mood embedding backend")]
struct Args {
    /// Use an already-running backend instead of building and spawning one
    #[arg(long, env = "BACKEND_URL")]
    backend_url: Option<String>,

    /// Port for the spawned backend
    #[arg(long, env = "E2E_PORT")]
    port: Option<u16>,

    /// Harness configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scenario list (YAML) to run instead of the built-in suite
    #[arg(short, long)]
    scenarios: Option<PathBuf>,

    /// Directory for archived outputs
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let result = rt.block_on(async_main(args));
    match &result {
        Err(e) if e.is_fatal() => error!("❌ Run aborted: {}", e),
        Err(e) => error!("❌ Unexpected error: {}", e),
        Ok(_) => {}
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status for the outcome of a run
fn exit_status(result: &E2eResult<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) => EXIT_SCENARIO_FAILURES,
        Err(_) => EXIT_FATAL,
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let api_key_present = std::env::var_os("OPENAI_API_KEY").is_some();
    let config = build_config(&args, api_key_present)?;

    let scenarios = match &args.scenarios {
        Some(path) => ScenarioFile::from_file(path)?,
        None => suite::default_scenarios(),
    };

    let summary = vaas_e2e::run_suite(&config, &scenarios).await?;
    report::print_summary(&summary);

    if let Some(path) = &args.output {
        summary.write_json(path)?;
    }

    Ok(summary.is_success())
}

/// Defaults, then the config file, then command line and environment
fn build_config(args: &Args, api_key_present: bool) -> E2eResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(url) = &args.backend_url {
        config.external_base_url = Some(url.clone());
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.artifacts_dir {
        config.artifacts_dir = dir.clone();
    }
    config.api_key_present = api_key_present;

    config.validate()?;
    Ok(config)
}
