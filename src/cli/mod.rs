pub mod call;
pub mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "llm-bridge")]
#[command(author, version, about = "Game-to-LLM bridge and provider proxy")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "LLM_BRIDGE_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the provider-normalizing proxy
    Serve(serve::ServeArgs),

    /// Invoke a bridge function the way the host engine would
    Call(call::CallArgs),
}
