#![deny(unsafe_code)]

use std::{env, process::ExitCode};

fn main() -> ExitCode {
    let status = cli::run(env::args_os());
    cli::exit_code_from(status)
}
