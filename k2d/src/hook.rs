//! k2d-hook - records one conversational turn
//!
//! Installed as the assistant's stop hook. Reads the hook payload as JSON on
//! stdin and prints a JSON summary on stdout:
//!
//! ```text
//! {"skipped":false,"turnId":12}
//! {"skipped":true,"reason":"stop_hook_active"}
//! ```
//!
//! The process always exits successfully; failures are reported in the
//! summary and the log file (`$XDG_STATE_HOME/k2d/`).

use anyhow::{Context, Result};
use k2d_core::{Config, HookInput, HookOutput, TurnRecorder};
use std::io::Read;

fn main() {
    let output = run();
    let json = serde_json::to_string(&output)
        .unwrap_or_else(|_| r#"{"skipped":true,"reason":"unserializable output"}"#.to_string());
    println!("{}", json);
}

fn run() -> HookOutput {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => return HookOutput::skipped(format!("failed to load configuration: {}", e)),
    };

    // Keep going without a log file rather than losing the turn
    let _log_guard = match k2d_core::logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("k2d-hook: logging disabled: {}", e);
            None
        }
    };

    match record(&config) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "k2d-hook failed");
            HookOutput::skipped(format!("{:#}", e))
        }
    }
}

fn record(config: &Config) -> Result<HookOutput> {
    let mut payload = String::new();
    std::io::stdin()
        .read_to_string(&mut payload)
        .context("failed to read hook payload")?;
    let input = HookInput::parse(&payload)?;

    tracing::debug!(
        session_id = %input.session_id,
        transcript = %input.transcript_path.display(),
        "k2d-hook invoked"
    );

    Ok(TurnRecorder::new(config).run(&input))
}
