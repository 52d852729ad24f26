//! Trailwatch binary

use anyhow::Result;

use trailwatch::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the TOML config)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
