use std::io::Read;
use std::iter;
use std::sync::mpsc::Receiver;
use std::thread;

use rill_core::{
    log_error, log_interactive, Context, DebugFlags, EngineError, ErrorKind, ValueEvent,
};

/// What a join does with each value event: echo its display form, or drain
/// it silently (batch runs are expected to produce effects through `out`,
/// not through the value stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSink {
    Display,
    Discard,
}

/// The streaming execution driver. Owns the process-wide context and the
/// read end of its shared value stream; every mode (file, eval, stdin,
/// interactive line) funnels through `exec_chars`, so there is exactly one
/// feed-and-join implementation.
///
/// Requests are strictly sequential: `exec_chars` does not return until the
/// previous request's listeners have both finished, so no two joins ever
/// read the shared value stream concurrently.
pub struct Driver {
    context: Context,
    values: Receiver<ValueEvent>,
    flags: DebugFlags,
}

impl Driver {
    pub fn new(flags: DebugFlags) -> Self {
        let (context, values) = Context::new();
        Driver {
            context,
            values,
            flags,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Runs one request: opens it, feeds every character, closes the input,
    /// then joins both output streams. Returns the first error the request
    /// produced, already reported (qualified with `origin` if given).
    pub fn exec_chars(
        &mut self,
        chars: impl Iterator<Item = char>,
        sink: ValueSink,
        origin: Option<&str>,
    ) -> Option<EngineError> {
        let (input, errors) = self.context.exec_stream(self.flags);
        for ch in chars {
            // a request that failed early stops consuming; the error is
            // waiting for the join below
            if input.send(ch).is_err() {
                break;
            }
        }
        drop(input);
        self.join(errors, sink, origin)
    }

    /// Drains the request's error stream and the shared value stream with
    /// two concurrent listeners. The scope's implicit join is the
    /// completion latch: it returns only when both listeners are done, and
    /// each listener completes exactly once by returning.
    ///
    /// There is deliberately no timeout here; a hung engine blocks the
    /// driver.
    fn join(
        &mut self,
        errors: Receiver<EngineError>,
        sink: ValueSink,
        origin: Option<&str>,
    ) -> Option<EngineError> {
        let values = &mut self.values;
        thread::scope(|scope| {
            scope.spawn(move || {
                for event in values.iter() {
                    match event {
                        ValueEvent::Value(value) => {
                            if sink == ValueSink::Display {
                                log_interactive(&value.to_string());
                            }
                        }
                        // leave the stream open for the next request's join
                        ValueEvent::RequestDone => break,
                    }
                }
            });
            let error_listener = scope.spawn(move || {
                // at most one error per request; stop observing after the
                // first rather than waiting for the stream to close
                let err = errors.recv().ok()?;
                match origin {
                    Some(origin) => log_error(&err.qualified(origin)),
                    None => log_error(&err),
                }
                Some(err)
            });
            error_listener.join().expect("error listener panicked")
        })
    }

    /// Executes a file against the shared context. An unreadable path is a
    /// `System` error reported without opening a request; evaluation errors
    /// are reported path-qualified by the join and returned in the `Ok`.
    pub fn exec_file(&mut self, path: &str) -> Result<Option<EngineError>, EngineError> {
        let code = match std::fs::read_to_string(path) {
            Ok(code) => code,
            Err(io_err) => {
                let err = EngineError::new(
                    ErrorKind::System,
                    format!("could not open {} for execution:\n\t-> {}", path, io_err),
                );
                log_error(&err);
                return Err(err);
            }
        };
        let chars = code
            .lines()
            .flat_map(|line| line.chars().chain(iter::once('\n')));
        Ok(self.exec_chars(chars, ValueSink::Discard, Some(path)))
    }

    /// Eval mode: display each value, first error is fatal.
    pub fn run_eval(&mut self, source: &str) -> i32 {
        match self.exec_chars(source.chars(), ValueSink::Display, None) {
            Some(err) => err.kind.exit_code(),
            None => 0,
        }
    }

    /// Stdin mode: drain values silently, first error is fatal. Characters
    /// read before a mid-stream encoding fault are still executed; only a
    /// failure to read at all is a `System` error.
    pub fn run_stdin(&mut self) -> i32 {
        let mut bytes = Vec::new();
        if let Err(io_err) = std::io::stdin().read_to_end(&mut bytes) {
            let err = EngineError::new(
                ErrorKind::System,
                format!("could not read from stdin:\n\t-> {}", io_err),
            );
            log_error(&err);
            return err.kind.exit_code();
        }
        let source = valid_utf8_prefix(bytes);
        match self.exec_chars(source.chars(), ValueSink::Discard, None) {
            Some(err) => err.kind.exit_code(),
            None => 0,
        }
    }

    /// File-batch mode: every file is attempted independently, and per-file
    /// errors never escalate the overall exit status.
    pub fn run_files(&mut self, paths: &[String]) -> i32 {
        for path in paths {
            let _ = self.exec_file(path);
        }
        0
    }
}

/// Decodes as much of the stream as is valid UTF-8 and drops the rest, so
/// a source truncated by garbage bytes still runs up to that point.
fn valid_utf8_prefix(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(source) => source,
        Err(err) => {
            let valid = err.utf8_error().valid_up_to();
            let mut bytes = err.into_bytes();
            bytes.truncate(valid);
            String::from_utf8(bytes).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_driver() -> Driver {
        Driver::new(DebugFlags::default())
    }

    fn exec(driver: &mut Driver, source: &str) -> Option<EngineError> {
        driver.exec_chars(source.chars(), ValueSink::Discard, None)
    }

    /// Writes a throwaway script under the OS temp dir and returns its path.
    fn write_script(name: &str, contents: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("rill-driver-{}-{}.rill", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn clean_request_observes_no_error() {
        let mut driver = create_driver();
        assert_eq!(exec(&mut driver, "1 + 1\n"), None);
    }

    #[test]
    fn bindings_persist_across_requests() {
        let mut driver = create_driver();
        assert_eq!(exec(&mut driver, "x := 1\n"), None);
        assert_eq!(exec(&mut driver, "x\n"), None);
    }

    #[test]
    fn first_error_is_returned_with_its_kind() {
        let mut driver = create_driver();
        let err = exec(&mut driver, "(1 + 2\n").unwrap();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn session_keeps_working_after_an_error() {
        let mut driver = create_driver();
        assert_eq!(exec(&mut driver, "kept := 4\n"), None);
        assert!(exec(&mut driver, "ghost\n").is_some());
        assert_eq!(exec(&mut driver, "kept\n"), None);
    }

    #[test]
    fn eval_mode_maps_error_kinds_to_exit_codes() {
        let mut driver = create_driver();
        assert_eq!(driver.run_eval("1 + 1"), 0);
        assert_eq!(driver.run_eval("(1 + 2"), ErrorKind::Syntax.exit_code());
        assert_eq!(driver.run_eval("ghost"), ErrorKind::Runtime.exit_code());
    }

    #[test]
    fn garbage_bytes_only_truncate_the_stdin_source() {
        let mut bytes = b"x := 1\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert_eq!(valid_utf8_prefix(bytes), "x := 1\n");
        assert_eq!(valid_utf8_prefix(b"1 + 1\n".to_vec()), "1 + 1\n");
    }

    #[test]
    fn missing_file_is_a_system_error() {
        let mut driver = create_driver();
        let err = driver.exec_file("no-such-file.rill").unwrap_err();
        assert_eq!(err.kind, ErrorKind::System);
    }

    #[test]
    fn loaded_file_mutates_the_shared_context() {
        let path = write_script("load", "y := 2 * 3\n");
        let mut driver = create_driver();
        assert_eq!(driver.exec_file(path.to_str().unwrap()), Ok(None));
        assert_eq!(exec(&mut driver, "y\n"), None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn file_eval_error_is_returned_not_fatal() {
        let path = write_script("err", "1 / 0\n");
        let mut driver = create_driver();
        let observed = driver.exec_file(path.to_str().unwrap()).unwrap();
        assert_eq!(observed.unwrap().kind, ErrorKind::Runtime);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn run_files_exit_status_stays_zero_after_file_error() {
        let path = write_script("batch", "z := 7\n");
        let mut driver = create_driver();
        let paths = vec![
            "no-such-file.rill".to_string(),
            path.to_str().unwrap().to_string(),
        ];
        // the missing first file must not keep the second from running,
        // and must not escalate the exit status
        assert_eq!(driver.run_files(&paths), 0);
        assert_eq!(exec(&mut driver, "z\n"), None);
        std::fs::remove_file(path).unwrap();
    }
}
