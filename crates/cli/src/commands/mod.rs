//! CLI command implementations.

pub mod accounts;
pub mod content;

use serde_json::Value;

/// Print a JSON document to stdout.
#[allow(clippy::print_stdout)]
fn emit(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a pre-built JSON value to stdout.
fn emit_value(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    emit(value)
}
