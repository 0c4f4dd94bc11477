mod cli;
mod config;
mod run;

use std::process::ExitCode;

use anyhow::Result;
use cli::Command;
use shaderlink::builtin;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Builtin { stage }) => {
            print!("{}", builtin::source_for(stage));
            Ok(ExitCode::SUCCESS)
        }
        None => run::run(cli.run),
    }
}
