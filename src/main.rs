use anyhow::Result;
use clap::Parser;

use llm_bridge::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        // The bridge owns its own runtime, so `call` stays off Tokio on
        // the main thread the way the host engine would.
        Commands::Call(args) => cli::call::run(args, cli.config.as_deref()),
        Commands::Serve(args) => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(cli::serve::run(args, cli.config.as_deref())),
    }
}
