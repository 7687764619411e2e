pub mod bar;
pub mod fill;
pub mod header;
pub mod order;
pub mod signal;

pub use bar::{BarError, BarEvent};
pub use fill::{FillEvent, FillType};
pub use header::{EventHeader, EventType, Priority};
pub use order::{OrderDirection, OrderEvent, OrderType, TimeInForce};
pub use signal::{RiskLevel, SignalCategory, SignalEnhancement, SignalEvent, SignalType};

use thiserror::Error;

//construction errors for events; values are never coerced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Priority {0} outside [1, 15]")]
    InvalidPriority(u8),
    #[error("Signal strength {0} outside [0, 1]")]
    InvalidStrength(f64),
    #[error("Position size {0} outside (0, 1]")]
    InvalidPositionSize(f64),
    #[error("Validity period must be positive, got {0} minutes")]
    InvalidValidityPeriod(i64),
    #[error("Non-positive {field}: {value}")]
    NonPositivePrice { field: &'static str, value: f64 },
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(u64),
    #[error("Negative commission: {0}")]
    NegativeCommission(f64),
    #[error("{0:?} order requires a limit price")]
    MissingLimitPrice(OrderType),
    #[error("{0:?} order requires a stop price")]
    MissingStopPrice(OrderType),
    #[error("Symbol must not be empty")]
    EmptySymbol,
    #[error(transparent)]
    Bar(#[from] BarError),
}

//shared positivity check for price-like fields
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<f64, EventError> {
    if value.is_nan() || value <= 0.0 {
        return Err(EventError::NonPositivePrice { field, value });
    }
    Ok(value)
}

pub(crate) fn require_symbol(symbol: String) -> Result<String, EventError> {
    if symbol.trim().is_empty() {
        return Err(EventError::EmptySymbol);
    }
    Ok(symbol)
}
