use serde::Serialize;
use serde_json::Value;

use crate::error::PlanError;

pub const DEFAULT_PRODUCT_CODE: &str = "BTC_JPY";
pub const DEFAULT_ROUNDING_UNIT: u64 = 5_000;
pub const DEFAULT_BUDGET: u64 = 25_000;
/// 43200 minutes, i.e. 30 days.
pub const DEFAULT_MINUTE_TO_EXPIRE: u32 = 43_200;
/// Subtracted from the last traded price when it already sits on a unit boundary.
pub const BOUNDARY_UNDERCUT: f64 = 2_000.0;

const SIZE_SCALE: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChildOrderType {
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
}

/// Body of a `sendchildorder` request.
///
/// Field names and order match what the exchange expects; the serialized
/// form is what gets signed and sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlan {
    pub product_code: String,
    pub child_order_type: ChildOrderType,
    pub side: OrderSide,
    pub price: u64,
    pub size: f64,
    pub minute_to_expire: u32,
    pub time_in_force: TimeInForce,
}

impl OrderPlan {
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).expect("order plan must serialize")
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub product_code: String,
    pub rounding_unit: u64,
    pub budget: u64,
    pub side: OrderSide,
    pub minute_to_expire: u32,
    pub time_in_force: TimeInForce,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            product_code: DEFAULT_PRODUCT_CODE.to_string(),
            rounding_unit: DEFAULT_ROUNDING_UNIT,
            budget: DEFAULT_BUDGET,
            side: OrderSide::Buy,
            minute_to_expire: DEFAULT_MINUTE_TO_EXPIRE,
            time_in_force: TimeInForce::Gtc,
        }
    }
}

/// Turns a last traded price into the day's limit order.
#[derive(Debug, Clone)]
pub struct OrderPlanner {
    config: PlannerConfig,
}

impl OrderPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, PlanError> {
        if config.rounding_unit == 0 {
            return Err(PlanError::ZeroUnit);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, ltp: f64) -> Result<OrderPlan, PlanError> {
        if !ltp.is_finite() || ltp < 0.0 {
            return Err(PlanError::InvalidLastPrice(ltp));
        }

        let price = order_price(ltp, self.config.rounding_unit);
        if price <= 0.0 {
            return Err(PlanError::NonPositivePrice { price, ltp });
        }
        // Both branches yield whole numbers: a boundary hit implies an integral ltp.
        let price = price as u64;

        let size = order_size(self.config.budget, price);
        if size <= 0.0 {
            return Err(PlanError::ZeroSize {
                budget: self.config.budget,
                price,
            });
        }

        Ok(OrderPlan {
            product_code: self.config.product_code.clone(),
            child_order_type: ChildOrderType::Limit,
            side: self.config.side,
            price,
            size,
            minute_to_expire: self.config.minute_to_expire,
            time_in_force: self.config.time_in_force,
        })
    }
}

/// Limit price for `ltp`: rounded down to a multiple of `unit`, or undercut by
/// a fixed 2000 when `ltp` is already a multiple.
pub fn order_price(ltp: f64, unit: u64) -> f64 {
    let unit = unit as f64;
    if ltp % unit == 0.0 {
        ltp - BOUNDARY_UNDERCUT
    } else {
        unit * (ltp / unit).floor()
    }
}

/// `budget / price` rounded half-up to three decimals.
pub fn order_size(budget: u64, price: u64) -> f64 {
    let amount = budget as f64 / price as f64;
    (amount * SIZE_SCALE + 0.5).floor() / SIZE_SCALE
}
