pub mod artifacts;
pub mod error;
pub mod exchange;
pub mod plan;
pub mod sig;
pub mod time;

pub use artifacts::{write_trade_history, LogRecord, PurchaseLog};
pub use error::{ExchangeError, PlanError};
pub use exchange::{BitflyerClient, ClientConfig, Ticker};
pub use plan::{
    order_price, order_size, ChildOrderType, OrderPlan, OrderPlanner, OrderSide, PlannerConfig,
    TimeInForce,
};
pub use sig::{Credentials, SignedRequest};
pub use time::{log_timestamp, timestamp_secs};
