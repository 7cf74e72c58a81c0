use std::process::ExitCode;

use clap::Parser;
use shipcheck_lib::cli::{run, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    shipcheck_lib::init_logging();
    run(cli).await
}
