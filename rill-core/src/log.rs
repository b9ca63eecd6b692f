//! Shared log helpers. Every line the engine or the front end prints for a
//! human goes through one of these, so labels and colors stay consistent
//! between engine traces and driver reports.

use colored::Colorize;

use crate::error::EngineError;

/// Engine/driver diagnostics: lexer and parser traces, frame dumps,
/// `@load` confirmations.
pub fn log_debug(msg: &str) {
    println!("{} {}", "debug:".blue().bold(), msg.blue());
}

/// Result values echoed to an interactive session.
pub fn log_interactive(msg: &str) {
    println!("{}", msg.green());
}

pub fn log_warn(msg: &str) {
    println!("{} {}", "warn:".yellow().bold(), msg.yellow());
}

/// Reports an error with its kind-specific label. Never exits; termination
/// policy belongs to the mode that observed the error.
pub fn log_error(err: &EngineError) {
    println!(
        "{} {}",
        format!("{}:", err.kind.label()).red().bold(),
        err.message.as_str().red()
    );
}
