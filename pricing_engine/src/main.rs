//! Entry point for the Pricing Engine binary.
//!
//! Running this binary starts an HTTP server exposing quotes,
//! cancellation fees and tier lookups.  Rate tables are read from the
//! directory given by `--rate-table-dir` / `PRICING_RATE_TABLE_DIR`
//! (default `rate_tables`).

use clap::Parser;
use pricing_engine::provider::{ConfigProvider, FileConfigProvider};
use pricing_engine::settings::Settings;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();
    pricing_engine::logging::init_tracing(settings.log_json);

    let provider: Arc<dyn ConfigProvider> = Arc::new(FileConfigProvider::open(
        settings.rate_table_dir.clone(),
        settings.rate_table_version.clone(),
    ));
    if let Err(err) = pricing_engine::api::serve(settings.bind_addr, provider).await {
        tracing::error!(error = %err, "server terminated with error");
        return Err(err);
    }
    Ok(())
}
