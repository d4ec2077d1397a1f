//! Standalone graph test server.
//!
//! Starts a server the way a test suite would and keeps it up until Ctrl-C,
//! for poking at the REST API by hand.

use clap::Parser;
use std::path::PathBuf;

use graph_test_server::config::{ResourceLocator, ServerConfig, DEFAULT_CONFIGURATION_RESOURCE};
use graph_test_server::observability::logging;
use graph_test_server::LifecycleController;

#[derive(Parser)]
#[command(name = "graph-test-server")]
#[command(about = "Run an in-process graph database server", long_about = None)]
struct Cli {
    #[arg(long, default_value = "localhost")]
    hostname: String,

    #[arg(short, long, default_value_t = 7473)]
    port: u16,

    /// Configuration resource name
    #[arg(short, long, default_value = DEFAULT_CONFIGURATION_RESOURCE)]
    config: String,

    /// Extra directory searched for the configuration resource (repeatable)
    #[arg(long = "search-path")]
    search_path: Vec<PathBuf>,

    /// Default log directive when RUST_LOG is unset
    #[arg(long, default_value = logging::DEFAULT_DIRECTIVE)]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    tracing::info!("graph-test-server v{} starting", env!("CARGO_PKG_VERSION"));

    let mut locator = ResourceLocator::from_env();
    for dir in cli.search_path.into_iter().rev() {
        locator = locator.prepend(dir);
    }

    let config = ServerConfig::new(cli.hostname, cli.port)
        .with_configuration_resource(cli.config)
        .with_resource_locator(locator);

    let mut controller = LifecycleController::new(config);
    controller.start()?;
    println!("{}", controller.base_uri()?);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    tracing::info!("Shutdown signal received");
    controller.stop();
    if let Some(warning) = controller.last_teardown_warning() {
        eprintln!("{warning}");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
