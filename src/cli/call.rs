use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use crate::bridge::{Bridge, MSG_PROCESSING, MSG_STARTED};
use crate::config::Config;

#[derive(Args)]
pub struct CallArgs {
    /// Function name: hello, ping, fibonacci, prompt, chat_with_ai
    pub function: String,

    /// Arguments, parsed as JSON when possible, taken as strings otherwise
    pub args: Vec<String>,

    /// Poll until the request completes (prompt/chat_with_ai only)
    #[arg(long)]
    pub wait: bool,

    /// Poll interval in milliseconds with --wait
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}

pub fn run(args: CallArgs, config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path)?;
    let bridge = Bridge::new(&config)?;

    let values: Vec<Value> = args
        .args
        .iter()
        .map(|a| serde_json::from_str(a).unwrap_or_else(|_| Value::String(a.clone())))
        .collect();

    let reply = bridge.dispatch(&args.function, &values);
    print_value(&reply);

    if args.wait
        && reply == Value::String(MSG_STARTED.to_string())
        && matches!(args.function.as_str(), "prompt" | "chat_with_ai")
    {
        let request_id = values.get(3).and_then(Value::as_str).unwrap_or("");
        loop {
            std::thread::sleep(Duration::from_millis(args.poll_ms));
            let reply = bridge.prompt("", "", "", request_id);
            if reply != MSG_PROCESSING {
                println!("{reply}");
                break;
            }
        }
    }

    Ok(())
}

fn print_value(value: &Value) {
    match value.as_str() {
        Some(s) => println!("{s}"),
        None => println!("{value}"),
    }
}
