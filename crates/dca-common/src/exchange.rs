use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::ExchangeError,
    plan::OrderPlan,
    sig::{Credentials, SignedRequest},
    time::timestamp_secs,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.bitflyer.jp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = "bitflyer-dca/0.1";

pub const TICKER_PATH: &str = "/v1/getticker";
pub const SEND_CHILD_ORDER_PATH: &str = "/v1/me/sendchildorder";
pub const BALANCE_PATH: &str = "/v1/me/getbalance";
pub const EXECUTIONS_PATH: &str = "/v1/me/getexecutions";

pub struct ClientConfig {
    pub endpoint: String,
    /// Only public endpoints are reachable without credentials.
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Last traded price for a product.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub product_code: String,
    pub ltp: f64,
}

/// REST client for the bitFlyer Lightning API.
///
/// Each call is a single request with no retry. Private endpoints are signed
/// with `ACCESS-KEY`/`ACCESS-TIMESTAMP`/`ACCESS-SIGN` headers.
pub struct BitflyerClient {
    client: Client,
    config: ClientConfig,
}

impl BitflyerClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub async fn public_get(&self, path: &str) -> Result<Value, ExchangeError> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| ExchangeError::Transport {
                path: path.to_string(),
                source,
            })?;
        read_json(path, response).await
    }

    pub async fn signed_get(&self, path: &str) -> Result<Value, ExchangeError> {
        let request = self.credentials(path)?.sign_request(
            Method::GET,
            path,
            None,
            timestamp_secs(),
        );
        self.dispatch(request).await
    }

    pub async fn signed_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ExchangeError> {
        let body = serde_json::to_string(body).map_err(|source| ExchangeError::Encode {
            path: path.to_string(),
            source,
        })?;
        let request = self.credentials(path)?.sign_request(
            Method::POST,
            path,
            Some(body),
            timestamp_secs(),
        );
        self.dispatch(request).await
    }

    pub async fn get_ticker(&self, product_code: &str) -> Result<Ticker, ExchangeError> {
        let path = ticker_path(product_code);
        let value = self.public_get(&path).await?;
        parse_ticker(&path, product_code, &value)
    }

    pub async fn send_child_order(&self, plan: &OrderPlan) -> Result<Value, ExchangeError> {
        self.signed_post(SEND_CHILD_ORDER_PATH, plan).await
    }

    pub async fn get_balance(&self) -> Result<Value, ExchangeError> {
        self.signed_get(BALANCE_PATH).await
    }

    pub async fn get_executions(
        &self,
        product_code: &str,
        count: u32,
    ) -> Result<Vec<Map<String, Value>>, ExchangeError> {
        let path = executions_path(product_code, count);
        let value = self.signed_get(&path).await?;
        parse_records(&path, value)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn credentials(&self, path: &str) -> Result<&Credentials, ExchangeError> {
        self.config
            .credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::MissingCredentials {
                path: path.to_string(),
            })
    }

    async fn dispatch(&self, request: SignedRequest) -> Result<Value, ExchangeError> {
        let credentials = self.credentials(&request.path)?;
        debug!("{} (signed) {}", request.method, request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        for (name, value) in request.headers(credentials) {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| ExchangeError::Transport {
                path: request.path.clone(),
                source,
            })?;
        read_json(&request.path, response).await
    }
}

async fn read_json(path: &str, response: Response) -> Result<Value, ExchangeError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| ExchangeError::Transport {
            path: path.to_string(),
            source,
        })?;

    if !status.is_success() {
        return Err(ExchangeError::Status {
            path: path.to_string(),
            status,
            body: text,
        });
    }
    parse_body(path, &text)
}

fn parse_body(path: &str, text: &str) -> Result<Value, ExchangeError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|source| ExchangeError::Decode {
        path: path.to_string(),
        source,
    })
}

pub fn ticker_path(product_code: &str) -> String {
    format!("{TICKER_PATH}?product_code={product_code}")
}

pub fn executions_path(product_code: &str, count: u32) -> String {
    format!("{EXECUTIONS_PATH}?product_code={product_code}&count={count}")
}

fn parse_ticker(path: &str, product_code: &str, value: &Value) -> Result<Ticker, ExchangeError> {
    let ltp = value
        .get("ltp")
        .and_then(Value::as_f64)
        .ok_or_else(|| ExchangeError::MissingField {
            path: path.to_string(),
            field: "ltp",
        })?;
    let product_code = value
        .get("product_code")
        .and_then(Value::as_str)
        .unwrap_or(product_code)
        .to_string();
    Ok(Ticker { product_code, ltp })
}

fn parse_records(path: &str, value: Value) -> Result<Vec<Map<String, Value>>, ExchangeError> {
    let unexpected = || ExchangeError::UnexpectedShape {
        path: path.to_string(),
        expected: "an array of objects",
    };
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(unexpected()),
            })
            .collect(),
        _ => Err(unexpected()),
    }
}
