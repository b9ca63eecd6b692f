use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{EngineError, ErrorKind};
use crate::lexer::Lexer;
use crate::log::{log_debug, log_error};
use crate::parser::{BinaryOp, Node, Parser};

/// Per-request trace switches. Not persisted on the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub lexer: bool,
    pub parser: bool,
    pub dump: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Str(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
        }
    }

    /// Raw form written by `out`: strings lose their quotes.
    pub fn to_output(&self) -> String {
        match self {
            Value::Str(string) => string.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "()"),
            Value::Number(number) => write!(f, "{}", number),
            Value::Str(string) => write!(f, "'{}'", string),
        }
    }
}

/// Events on the context's shared value stream. The stream outlives any one
/// request, so the engine marks the end of each request's values with
/// `RequestDone` rather than closing the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEvent {
    Value(Value),
    RequestDone,
}

/// The persistent global frame. Bindings made by one request are visible to
/// every later request against the same context.
#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
}

impl Frame {
    fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    fn set(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    fn dump(&self) -> String {
        if self.bindings.is_empty() {
            return "\t(empty)".to_string();
        }
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        names
            .iter()
            .map(|name| format!("\t{} -> {}", name, self.bindings[*name]))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Process-wide execution context: the global frame plus the write end of
/// the shared value stream. Created once at startup; never torn down.
pub struct Context {
    frame: Arc<Mutex<Frame>>,
    values: Sender<ValueEvent>,
}

impl Context {
    /// Returns the context and the read end of its value stream. The
    /// receiver is handed out exactly once; every request's values arrive
    /// on it in production order.
    pub fn new() -> (Context, Receiver<ValueEvent>) {
        let (values, value_source) = mpsc::channel();
        let context = Context {
            frame: Arc::new(Mutex::new(Frame::default())),
            values,
        };
        (context, value_source)
    }

    /// Opens one execution request: a fresh input sink and error source,
    /// plus an engine thread scoped to the request. Dropping the sender
    /// signals end-of-source; the engine closes the error stream once no
    /// more errors for this request can be produced.
    ///
    /// All three channels are unbounded, so a caller may feed the entire
    /// source before anything drains the output sides.
    pub fn exec_stream(&self, flags: DebugFlags) -> (Sender<char>, Receiver<EngineError>) {
        let (input_sink, input) = mpsc::channel();
        let (error_sink, error_source) = mpsc::channel();
        let frame = Arc::clone(&self.frame);
        let values = self.values.clone();
        thread::spawn(move || run_request(input, values, error_sink, frame, flags));
        (input_sink, error_source)
    }

    /// Synchronously logs the current frame.
    pub fn dump(&self) {
        match self.frame.lock() {
            Ok(frame) => log_debug(&format!("frame dump:\n{}", frame.dump())),
            Err(_) => log_error(&EngineError::new(
                ErrorKind::Assert,
                "global frame mutex poisoned",
            )),
        }
    }
}

fn run_request(
    input: Receiver<char>,
    values: Sender<ValueEvent>,
    errors: Sender<EngineError>,
    frame: Arc<Mutex<Frame>>,
    flags: DebugFlags,
) {
    if let Err(err) = exec_request(input, &values, &frame, flags) {
        // sends fail only if the request was abandoned; nothing to do then
        let _ = errors.send(err);
    }
    if flags.dump {
        if let Ok(frame) = frame.lock() {
            log_debug(&format!("frame dump:\n{}", frame.dump()));
        }
    }
    let _ = values.send(ValueEvent::RequestDone);
    // dropping `errors` here closes the request's error stream
}

fn exec_request(
    input: Receiver<char>,
    values: &Sender<ValueEvent>,
    frame: &Arc<Mutex<Frame>>,
    flags: DebugFlags,
) -> Result<(), EngineError> {
    let tokens = Lexer::new(input.into_iter(), flags.lexer).tokenize()?;
    let nodes = Parser::new(tokens, flags.parser).parse()?;
    let mut frame = frame
        .lock()
        .map_err(|_| EngineError::new(ErrorKind::Assert, "global frame mutex poisoned"))?;
    for node in nodes {
        // bindings mutate the frame silently; everything else is a
        // top-level evaluated unit and emits its value
        let is_binding = matches!(node, Node::Define { .. });
        let value = eval_node(&node, &mut frame)?;
        if !is_binding {
            let _ = values.send(ValueEvent::Value(value));
        }
    }
    Ok(())
}

fn eval_node(node: &Node, frame: &mut Frame) -> Result<Value, EngineError> {
    match node {
        Node::NullLiteral => Ok(Value::Null),
        Node::NumberLiteral(number) => Ok(Value::Number(*number)),
        Node::StringLiteral(string) => Ok(Value::Str(string.clone())),
        Node::Ident(name) => match frame.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(EngineError::runtime(format!("{} is not defined", name))),
        },
        Node::Negate(operand) => match eval_node(operand, frame)? {
            Value::Number(number) => Ok(Value::Number(-number)),
            value => Err(EngineError::runtime(format!(
                "cannot negate a {}",
                value.type_name()
            ))),
        },
        Node::Binary { op, left, right } => {
            let left = eval_node(left, frame)?;
            let right = eval_node(right, frame)?;
            eval_binary(*op, left, right)
        }
        Node::Define { name, value } => {
            let value = eval_node(value, frame)?;
            frame.set(name.clone(), value.clone());
            Ok(value)
        }
        Node::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval_node(arg, frame)?);
            }
            call_builtin(name, evaluated)
        }
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EngineError> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
        (BinaryOp::Add, Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
        (BinaryOp::Subtract, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),
        (BinaryOp::Multiply, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),
        (BinaryOp::Divide, Value::Number(_), Value::Number(r)) if r == 0.0 => {
            Err(EngineError::runtime("division by zero"))
        }
        (BinaryOp::Divide, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l / r)),
        (op, left, right) => Err(EngineError::runtime(format!(
            "'{}' is not defined for {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value, EngineError> {
    match name {
        "out" => {
            let mut stdout = std::io::stdout();
            for arg in &args {
                let _ = stdout.write_all(arg.to_output().as_bytes());
            }
            let _ = stdout.flush();
            Ok(Value::Null)
        }
        _ => Err(EngineError::runtime(format!(
            "{} is not a function",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Evaluates source against a frame directly, skipping the channel
    /// plumbing, and returns the values the non-binding expressions produce.
    fn eval_str(frame: &mut Frame, source: &str) -> Result<Vec<Value>, EngineError> {
        let tokens = Lexer::new(source.chars(), false).tokenize()?;
        let nodes = Parser::new(tokens, false).parse()?;
        let mut values = Vec::new();
        for node in nodes {
            let is_binding = matches!(node, Node::Define { .. });
            let value = eval_node(&node, frame)?;
            if !is_binding {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn eval_one(source: &str) -> Value {
        let mut frame = Frame::default();
        let mut values = eval_str(&mut frame, source).unwrap();
        assert_eq!(values.len(), 1, "evaluating '{}'", source);
        values.pop().unwrap()
    }

    #[test]
    fn integral_numbers_display_without_a_fraction() {
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn strings_display_quoted_but_output_raw() {
        let value = Value::Str("hi".to_string());
        assert_eq!(value.to_string(), "'hi'");
        assert_eq!(value.to_output(), "hi");
    }

    #[test]
    fn null_displays_as_empty_parens() {
        assert_eq!(Value::Null.to_string(), "()");
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        assert_eq!(eval_one("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval_one("(1 + 2) * 3"), Value::Number(9.0));
    }

    #[test]
    fn concatenates_strings_with_plus() {
        assert_eq!(eval_one("'a' + 'b'"), Value::Str("ab".to_string()));
    }

    #[test]
    fn bindings_are_visible_to_later_expressions() {
        let mut frame = Frame::default();
        assert_eq!(eval_str(&mut frame, "x := 1\n").unwrap(), vec![]);
        assert_eq!(
            eval_str(&mut frame, "x + 1\n").unwrap(),
            vec![Value::Number(2.0)]
        );
    }

    #[test]
    fn undefined_identifier_is_a_runtime_error() {
        let mut frame = Frame::default();
        let err = eval_str(&mut frame, "ghost\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert_eq!(err.message, "ghost is not defined");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let mut frame = Frame::default();
        let err = eval_str(&mut frame, "1 / 0\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }

    #[test]
    fn mixed_type_arithmetic_is_a_runtime_error() {
        let mut frame = Frame::default();
        let err = eval_str(&mut frame, "'a' * 2\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }

    #[test]
    fn calling_an_unknown_function_is_a_runtime_error() {
        let mut frame = Frame::default();
        let err = eval_str(&mut frame, "launch(1)\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert_eq!(err.message, "launch is not a function");
    }

    #[test]
    fn frame_dump_lists_bindings_sorted() {
        let mut frame = Frame::default();
        eval_str(&mut frame, "b := 2\na := 'hi'\n").unwrap();
        assert_eq!(frame.dump(), "\ta -> 'hi'\n\tb -> 2");
    }
}
