//! Financial QA Assistant entry point

use clap::Parser;
use financial_qa::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    financial_qa::logging::init();

    let cli = Cli::parse();
    run(cli).await
}
