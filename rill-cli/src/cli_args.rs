use clap::Parser;

use rill_core::DebugFlags;

const LONG_ABOUT: &str = "\
rill is a minimal scripting language.

By default, rill interprets from stdin.
    rill < main.rill
Run a script from files with --input.
    rill --input main.rill
Run from the command line with --eval.
    rill --eval \"x := 1, out(x)\"
Or start an interactive session with --repl.";

#[derive(Parser)]
#[command(
    name = "rill",
    version,
    about = "rill is a minimal scripting language",
    long_about = LONG_ABOUT
)]
pub struct CliArgs {
    /// Log all interpreter debug information
    #[arg(long)]
    pub verbose: bool,

    /// Log lexer output
    #[arg(long = "debug-lex")]
    pub debug_lex: bool,

    /// Log parser output
    #[arg(long = "debug-parse")]
    pub debug_parse: bool,

    /// Dump the global frame after each evaluation
    #[arg(long)]
    pub dump: bool,

    /// Run as an interactive repl
    #[arg(long)]
    pub repl: bool,

    /// Evaluate the argument as a rill script
    #[arg(long, value_name = "SCRIPT")]
    pub eval: Option<String>,

    /// Source file to execute; may be given multiple times
    #[arg(long = "input", value_name = "PATH")]
    pub inputs: Vec<String>,
}

/// The effective operating mode; exactly one applies per invocation.
#[derive(Debug, PartialEq)]
pub enum Mode<'a> {
    Repl,
    Eval(&'a str),
    Files(&'a [String]),
    Stdin,
}

impl CliArgs {
    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags {
            lexer: self.debug_lex || self.verbose,
            parser: self.debug_parse || self.verbose,
            dump: self.dump || self.verbose,
        }
    }

    /// Chosen in priority order: repl, eval, input files, stdin fallback.
    pub fn mode(&self) -> Mode {
        if self.repl {
            Mode::Repl
        } else if let Some(source) = self.eval.as_deref().filter(|s| !s.is_empty()) {
            Mode::Eval(source)
        } else if !self.inputs.is_empty() {
            Mode::Files(&self.inputs)
        } else {
            Mode::Stdin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["rill"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn stdin_is_the_fallback_mode() {
        assert_eq!(parse(&[]).mode(), Mode::Stdin);
    }

    #[test]
    fn repl_takes_priority_over_everything() {
        let args = parse(&["--repl", "--eval", "1", "--input", "a.rill"]);
        assert_eq!(args.mode(), Mode::Repl);
    }

    #[test]
    fn eval_takes_priority_over_files() {
        let args = parse(&["--eval", "1 + 1", "--input", "a.rill"]);
        assert_eq!(args.mode(), Mode::Eval("1 + 1"));
    }

    #[test]
    fn empty_eval_falls_through() {
        assert_eq!(parse(&["--eval", ""]).mode(), Mode::Stdin);
    }

    #[test]
    fn input_is_repeatable_and_ordered() {
        let args = parse(&["--input", "a.rill", "--input", "b.rill"]);
        let Mode::Files(paths) = args.mode() else {
            panic!("expected file mode");
        };
        assert_eq!(paths.to_vec(), vec!["a.rill".to_string(), "b.rill".to_string()]);
    }

    #[test]
    fn verbose_enables_every_debug_flag() {
        let flags = parse(&["--verbose"]).debug_flags();
        assert!(flags.lexer && flags.parser && flags.dump);
    }

    #[test]
    fn debug_flags_are_independent_without_verbose() {
        let flags = parse(&["--debug-parse"]).debug_flags();
        assert!(!flags.lexer && flags.parser && !flags.dump);
    }
}
