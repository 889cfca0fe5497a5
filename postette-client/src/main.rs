use clap::Parser;
use postette_client::{Cli, run};

#[tokio::main]
async fn main() -> Result<(), postette_client::AppError> {
    run(Cli::parse()).await
}
