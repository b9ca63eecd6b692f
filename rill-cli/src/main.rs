mod cli_args;
mod driver;
mod repl;

use clap::Parser;

use cli_args::{CliArgs, Mode};
use driver::Driver;
use repl::run_repl;

fn main() {
    let args = CliArgs::parse();
    let mut driver = Driver::new(args.debug_flags());
    let exit_code = match args.mode() {
        Mode::Repl => run_repl(&mut driver),
        Mode::Eval(source) => driver.run_eval(source),
        Mode::Files(paths) => driver.run_files(paths),
        Mode::Stdin => driver.run_stdin(),
    };
    std::process::exit(exit_code);
}
