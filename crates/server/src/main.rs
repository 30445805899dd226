use clap::Parser;
use tracing_subscriber::EnvFilter;

use mrqa_server::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    mrqa_core::config::load_dotenv();
    let config = mrqa_core::Config::from_env();
    config.log_summary();

    cli::run(cli, config).await
}
