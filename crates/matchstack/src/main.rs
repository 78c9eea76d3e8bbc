use std::process::ExitCode;

use clap::Parser;
use matchstack::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    matchstack::init(cli.verbose);

    match matchstack::cli::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
