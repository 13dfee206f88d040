use clap::Parser;
use tradegate::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
