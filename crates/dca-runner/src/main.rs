use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dca_common::{
    exchange::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS},
    log_timestamp,
    plan::{DEFAULT_BUDGET, DEFAULT_MINUTE_TO_EXPIRE, DEFAULT_PRODUCT_CODE, DEFAULT_ROUNDING_UNIT},
    BitflyerClient, ClientConfig, Credentials, LogRecord, OrderPlanner, OrderSide, PlannerConfig,
    PurchaseLog, TimeInForce,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Place the daily dollar-cost-averaging limit order on bitFlyer"
)]
struct Cli {
    /// API key for private endpoints
    #[arg(long, env = "BITFLYER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API secret used to sign private requests
    #[arg(long, env = "BITFLYER_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// REST API base URL
    #[arg(long, env = "BITFLYER_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Product to buy
    #[arg(long, env = "DCA_PRODUCT_CODE", default_value = DEFAULT_PRODUCT_CODE)]
    product_code: String,

    /// Order prices are rounded down to a multiple of this many currency units
    #[arg(long, env = "DCA_ROUNDING_UNIT", default_value_t = DEFAULT_ROUNDING_UNIT)]
    unit: u64,

    /// Fiat amount to spend per run
    #[arg(long, env = "DCA_BUDGET", default_value_t = DEFAULT_BUDGET)]
    budget: u64,

    /// Minutes until the resting order expires
    #[arg(long, env = "DCA_MINUTE_TO_EXPIRE", default_value_t = DEFAULT_MINUTE_TO_EXPIRE)]
    minute_to_expire: u32,

    /// CSV file that receives one row per run
    #[arg(long, env = "DCA_LOG_FILE", default_value = "log.csv")]
    log_file: PathBuf,

    /// HTTP request timeout in seconds
    #[arg(long, env = "DCA_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Compute and print the order without logging or submitting it
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Print account balances and exit
    #[arg(long, default_value_t = false, conflicts_with = "dry_run")]
    balance: bool,
}

impl Cli {
    fn credentials(&self) -> Option<Credentials> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Some(Credentials::new(key.trim(), secret.trim()))
            }
            _ => None,
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.endpoint.clone(), self.credentials());
        config.timeout = Duration::from_secs(self.timeout_secs);
        config
    }

    fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            product_code: self.product_code.clone(),
            rounding_unit: self.unit,
            budget: self.budget,
            side: OrderSide::Buy,
            minute_to_expire: self.minute_to_expire,
            time_in_force: TimeInForce::Gtc,
        }
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
    let config = cli.client_config();
    if config.credentials.is_none() && !cli.dry_run {
        return Err(anyhow!(
            "--api-key/--api-secret or BITFLYER_API_KEY/BITFLYER_API_SECRET must be provided unless --dry-run is set"
        ));
    }
    let client = BitflyerClient::new(config)?;

    if cli.balance {
        let balance = client
            .get_balance()
            .await
            .context("failed to fetch account balance")?;
        println!("{}", serde_json::to_string_pretty(&balance)?);
        return Ok(());
    }

    let planner = OrderPlanner::new(cli.planner_config())?;

    // Nothing is logged or submitted without a fresh price.
    let ticker = client
        .get_ticker(&cli.product_code)
        .await
        .context("failed to fetch last traded price, no order placed")?;
    info!(
        "{} last traded at {} on {}",
        ticker.product_code,
        ticker.ltp,
        client.endpoint()
    );

    let plan = planner.plan(ticker.ltp)?;
    info!(
        "planned {:?} {} {} @ {} (budget {}, unit {})",
        plan.side, plan.size, plan.product_code, plan.price, cli.budget, cli.unit
    );

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan.as_json())?);
        info!("--dry-run set, skipped purchase log and order submission");
        return Ok(());
    }

    let log = PurchaseLog::new(&cli.log_file);
    log.append(&LogRecord::from_plan(&plan, ticker.ltp, log_timestamp()))?;
    info!("appended purchase to {}", log.path().display());

    let result = client
        .send_child_order(&plan)
        .await
        .context("failed to submit child order")?;
    println!("{}", result);
    Ok(())
}
