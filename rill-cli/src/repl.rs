use std::io::Write;
use std::iter;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rill_core::{log_debug, log_error, log_warn, EngineError, ErrorKind};

use crate::driver::{Driver, ValueSink};

const HISTORY_FILENAME: &str = ".rill-history.txt";

fn get_history_path() -> Option<PathBuf> {
    // std::env::home_dir is deprecated because it misbehaves under
    // Cygwin/Mingw-style environments; those are out of scope and the
    // replacement crates pull in a lot of dependencies.
    #[allow(deprecated)]
    match std::env::home_dir() {
        Some(path) if path.exists() => Some(path.join(HISTORY_FILENAME)),
        _ => None,
    }
}

/// Session commands recognized ahead of the engine. A directive mutates
/// driver state instead of being fed to a request.
#[derive(Debug, PartialEq, Eq)]
enum Directive<'a> {
    Dump,
    Clear,
    Exit,
    Load(&'a str),
}

impl<'a> Directive<'a> {
    /// Matched by prefix: text after the directive on the same line is
    /// ignored rather than executed.
    fn parse(line: &'a str) -> Option<Self> {
        if line.starts_with("@dump") {
            Some(Directive::Dump)
        } else if line.starts_with("@clear") {
            Some(Directive::Clear)
        } else if line.starts_with("@exit") {
            Some(Directive::Exit)
        } else if let Some(rest) = line.strip_prefix("@load ") {
            Some(Directive::Load(rest.trim()))
        } else {
            None
        }
    }
}

/// Runs the interactive session to completion and returns the process exit
/// code. History handling follows the usual editor convention: load before
/// the loop, save after, both best-effort.
pub fn run_repl(driver: &mut Driver) -> i32 {
    let Ok(mut editor) = DefaultEditor::new() else {
        log_error(&EngineError::new(
            ErrorKind::System,
            "could not initialize the line editor",
        ));
        return ErrorKind::System.exit_code();
    };

    let history_path = get_history_path();
    if let Some(path) = &history_path {
        // a missing history file is fine; it is created on save
        let _ = editor.load_history(path);
    }

    let exit_code = repl_loop(driver, &mut editor);

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }

    exit_code
}

fn repl_loop(driver: &mut Driver, editor: &mut DefaultEditor) -> i32 {
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            // Ctrl-C at the prompt ends the session cleanly
            Err(ReadlineError::Interrupted) => return 0,
            Err(err) => {
                // losing the interactive transport itself is the one fatal
                // error of this mode
                log_error(&EngineError::new(
                    ErrorKind::System,
                    format!("unexpected stop to input:\n\t-> {}", err),
                ));
                return ErrorKind::System.exit_code();
            }
        };

        if !line.trim().is_empty() {
            if let Err(err) = editor.add_history_entry(&line) {
                log_warn(&format!("failed to add history entry: {}", err));
            }
        }

        match Directive::parse(&line) {
            Some(Directive::Dump) => driver.context().dump(),
            Some(Directive::Clear) => {
                print!("\x1b[2J\x1b[H");
                let _ = std::io::stdout().flush();
            }
            Some(Directive::Exit) => return 0,
            Some(Directive::Load(path)) => {
                if let Ok(None) = driver.exec_file(path) {
                    log_debug(&format!("loaded file:\n\t-> {}", path));
                }
            }
            None => {
                // any error was reported by the join; the session prompts
                // again either way
                let _ = driver.exec_chars(
                    line.chars().chain(iter::once('\n')),
                    ValueSink::Display,
                    None,
                );
            }
        }
    }
}
