use clap::Parser;

use helm_wrapper::bootstrap::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::init_tracing();
    bootstrap::run(cli).await
}
