use crate::events::header::{EventHeader, EventType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarError {
    #[error("Non-positive {field} price: {value}")]
    NonPositivePrice { field: &'static str, value: f64 },
    #[error("Negative volume: {0}")]
    NegativeVolume(f64),
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close ({close}) outside high-low range [{low}, {high}]")]
    InvalidClose { close: f64, high: f64, low: f64 },
    #[error("Invalid OHLC values: open ({open}) outside high-low range [{low}, {high}]")]
    InvalidOpen { open: f64, high: f64, low: f64 },
}

//represents a single ohlcv bar of market data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarEvent {
    pub header: EventHeader,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: Option<f64>,
}

impl BarEvent {
    //creates a new bar, checking prices are positive and volume is not negative
    //the ohlc relationship is checked separately by validate_ohlc
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        turnover: Option<f64>,
    ) -> Result<Self, BarError> {
        for (field, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if value.is_nan() || value <= 0.0 {
                return Err(BarError::NonPositivePrice { field, value });
            }
        }

        if volume < 0.0 {
            return Err(BarError::NegativeVolume(volume));
        }

        Ok(Self::new_unchecked(
            symbol, timestamp, open, high, low, close, volume, turnover,
        ))
    }

    //creates a bar without validation
    #[allow(clippy::too_many_arguments)]
    pub fn new_unchecked(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        turnover: Option<f64>,
    ) -> Self {
        BarEvent {
            header: EventHeader::new(EventType::Bar, timestamp, "data_feed"),
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            turnover,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp()
    }

    //checks low <= {open, close} <= high
    pub fn validate_ohlc(&self) -> Result<(), BarError> {
        let (open, high, low, close) = (self.open, self.high, self.low, self.close);

        if high < low {
            return Err(BarError::InvalidHighLow { high, low });
        }

        if close < low || close > high {
            return Err(BarError::InvalidClose { close, high, low });
        }

        if open < low || open > high {
            return Err(BarError::InvalidOpen { open, high, low });
        }

        Ok(())
    }

    pub fn has_valid_ohlc(&self) -> bool {
        self.validate_ohlc().is_ok()
    }

    //returns the typical price (HLC/3)
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    //returns the range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl PartialEq for BarEvent {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}
