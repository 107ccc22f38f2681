use clap::Parser;
use stockmetrics::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();
    run(Cli::parse())
}
