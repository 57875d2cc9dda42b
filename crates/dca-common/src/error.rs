use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by [`crate::exchange::BitflyerClient`].
///
/// Every network-facing call returns one of these instead of an empty
/// sentinel, so callers must handle the failure before using the payload.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("signed call to {path} requires BITFLYER_API_KEY and BITFLYER_API_SECRET")]
    MissingCredentials { path: String },
    #[error("failed to encode request body for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned status {status} with body: {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("response from {path} is missing numeric field `{field}`")]
    MissingField { path: String, field: &'static str },
    #[error("response from {path} is not {expected}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
    },
}

/// Reasons the planner refuses to build an order.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("rounding unit must be positive")]
    ZeroUnit,
    #[error("last traded price {0} is not a finite non-negative number")]
    InvalidLastPrice(f64),
    #[error("order price {price} computed from last traded price {ltp} is not positive")]
    NonPositivePrice { price: f64, ltp: f64 },
    #[error("budget {budget} at price {price} rounds to a zero order size")]
    ZeroSize { budget: u64, price: u64 },
}
