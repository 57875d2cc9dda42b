use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dca_common::{
    exchange::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS},
    plan::DEFAULT_PRODUCT_CODE,
    write_trade_history, BitflyerClient, ClientConfig, Credentials,
};
use tracing::info;

const DEFAULT_COUNT: u32 = 1_000;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export recent bitFlyer executions to CSV",
    disable_help_subcommand = true
)]
struct Cli {
    /// API key for private endpoints
    #[arg(long, env = "BITFLYER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API secret used to sign private requests
    #[arg(long, env = "BITFLYER_API_SECRET", hide_env_values = true)]
    api_secret: String,

    /// REST API base URL
    #[arg(long, env = "BITFLYER_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Product whose executions are exported
    #[arg(long, env = "DCA_PRODUCT_CODE", default_value = DEFAULT_PRODUCT_CODE)]
    product_code: String,

    /// Number of most recent executions to request (the exchange caps this)
    #[arg(long, env = "DCA_HISTORY_COUNT", default_value_t = DEFAULT_COUNT)]
    count: u32,

    /// Output CSV, replaced on every run
    #[arg(long, env = "DCA_HISTORY_FILE", default_value = "trade_history.csv")]
    out: PathBuf,

    /// HTTP request timeout in seconds
    #[arg(long, env = "DCA_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let (key, secret) = (self.api_key.trim(), self.api_secret.trim());
        if key.is_empty() || secret.is_empty() {
            return Err(anyhow!("API key and secret must not be empty"));
        }
        let mut config =
            ClientConfig::new(self.endpoint.clone(), Some(Credentials::new(key, secret)));
        config.timeout = Duration::from_secs(self.timeout_secs);
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let client = BitflyerClient::new(cli.client_config()?)?;

    let records = client
        .get_executions(&cli.product_code, cli.count)
        .await
        .with_context(|| format!("failed to fetch executions for {}", cli.product_code))?;
    let written = write_trade_history(&cli.out, &records)?;
    info!(
        "wrote {} {} executions to {}",
        written,
        cli.product_code,
        cli.out.display()
    );
    Ok(())
}
