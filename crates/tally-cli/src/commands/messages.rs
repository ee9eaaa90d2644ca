//! Intent and chat command implementations

use std::io::Read;

use anyhow::{Context, Result};
use tally_core::{DispatchResult, Dispatcher, Outcome};

use super::print_entries;

/// Read a whole intent document from stdin
pub fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read intent from stdin")?;
    Ok(buf)
}

fn print_result(result: &DispatchResult, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", result.message);
    if let Outcome::Entries { entries, .. } = &result.outcome {
        if !entries.is_empty() {
            print_entries(entries);
        }
    }
    Ok(())
}

/// Dispatch a JSON intent exactly as the classifier would have produced it
pub fn cmd_intent(dispatcher: &Dispatcher, user: &str, raw: &str, json_output: bool) -> Result<()> {
    let result = dispatcher.dispatch_json(user, raw)?;
    print_result(&result, json_output)
}

/// Run one free-text message through the classifier pipeline
pub async fn cmd_chat(
    dispatcher: &Dispatcher,
    user: &str,
    message: &str,
    json_output: bool,
) -> Result<()> {
    if dispatcher.classifier().is_none() {
        anyhow::bail!(
            "No intent classifier configured. Set AI_API_URL or OPENAI_COMPATIBLE_HOST, \
             or use 'tally intent' with a JSON intent."
        );
    }

    let result = dispatcher
        .handle_message(user, message)
        .await
        .context("Failed to handle message")?;
    print_result(&result, json_output)
}
