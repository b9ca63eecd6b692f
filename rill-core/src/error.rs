use std::error::Error;
use std::fmt::Display;

/// Closed classification of engine faults. Each kind has a fixed nonzero
/// identifier that batch modes reuse as the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Runtime,
    System,
    Assert,
    Unknown,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Syntax => 1,
            ErrorKind::Runtime => 2,
            ErrorKind::System => 40,
            ErrorKind::Assert => 100,
            ErrorKind::Unknown => 125,
        }
    }

    /// Label printed in front of the message when the error is reported.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::System => "system error",
            ErrorKind::Assert => "invariant violation",
            ErrorKind::Unknown => "error",
        }
    }
}

/// One fault produced by a request. At most one of these travels on a
/// request's error stream before the engine closes it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        EngineError {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Syntax, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Runtime, message)
    }

    /// Returns a copy of this error with its message qualified by the
    /// source it came from, e.g. a file path.
    pub fn qualified(&self, origin: &str) -> Self {
        EngineError {
            kind: self.kind,
            message: format!("in {}\n\t-> {}", origin, self.message),
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_fixed_and_nonzero() {
        assert_eq!(ErrorKind::Syntax.exit_code(), 1);
        assert_eq!(ErrorKind::Runtime.exit_code(), 2);
        assert_eq!(ErrorKind::System.exit_code(), 40);
        assert_eq!(ErrorKind::Assert.exit_code(), 100);
        assert_eq!(ErrorKind::Unknown.exit_code(), 125);
    }

    #[test]
    fn display_includes_kind_label() {
        let err = EngineError::syntax("unexpected ')'");
        assert_eq!(err.to_string(), "syntax error: unexpected ')'");
    }

    #[test]
    fn qualified_prefixes_the_origin() {
        let err = EngineError::runtime("x is not defined").qualified("demo.rill");
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert_eq!(err.message, "in demo.rill\n\t-> x is not defined");
    }
}
