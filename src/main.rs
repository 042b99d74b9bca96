//! Worker control-plane entry point. Spawned by a Studio host as a
//! long-lived subprocess, reading JSON-RPC requests on stdin and writing
//! responses and pipeline events on stdout.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ingestor_worker::config::{WorkerConfig, SERVER_VERSION};
use ingestor_worker::executor::Executor;
use ingestor_worker::framing::Framing;
use ingestor_worker::{dispatcher, env_file, reader, watchdog};

#[derive(Parser)]
#[command(name = "ingestor-worker")]
#[command(about = "Control-plane worker for Studio ingestion adapters", version)]
struct Cli {
    /// Root of the Studio project to discover adapters in.
    #[arg(long)]
    project: PathBuf,

    /// Default `step_mode` for executions that do not specify one.
    #[arg(long)]
    step_mode: bool,

    /// Interpreter used to run the bootstrap bridge script.
    #[arg(long, default_value = "python3")]
    python: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    env_file::load(&cli.project);

    let mut config = WorkerConfig::new(cli.project.clone());
    config.default_step_mode = cli.step_mode;
    config.python_executable = cli.python.clone();

    let discovery = worker_discovery::discover(&cli.project, SERVER_VERSION);

    let sink = Arc::new(Framing::stdout());
    let executor = Executor::new(
        discovery.project,
        discovery.adapters,
        discovery_data_clients(&cli.project),
        config.python_executable.clone(),
        Arc::clone(&sink),
    );

    let running = watchdog::RunningFlag::new();
    if let Err(e) = watchdog::install_signal_handlers(Arc::clone(&running)) {
        log::warn!("failed to install signal handlers: {e}");
    }
    let parent_pid = watchdog::current_parent_pid();
    let _watchdog_handle = watchdog::spawn(Arc::clone(&running), parent_pid);

    let rx = reader::spawn(BufReader::new(std::io::stdin()));
    let dispatcher = dispatcher::Dispatcher::new(config, executor, sink, running);
    dispatcher.run(rx);

    ExitCode::SUCCESS
}

/// Separate from [`worker_discovery::discover`] (which only surfaces
/// linked adapters) because the real-fetch path in the executor needs
/// the raw, unlinked data-client records too.
fn discovery_data_clients(project_root: &std::path::Path) -> Vec<worker_discovery::ClassRecord> {
    let all_classes = worker_discovery::discover_classes(project_root);
    let (_adapters, data_clients) = worker_discovery::partition(all_classes);
    data_clients
}
