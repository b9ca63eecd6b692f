mod error;
mod eval;
mod lexer;
mod log;
mod parser;

pub use error::{EngineError, ErrorKind};
pub use eval::{Context, DebugFlags, Value, ValueEvent};
pub use log::{log_debug, log_error, log_interactive, log_warn};
