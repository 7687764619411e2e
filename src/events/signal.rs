use crate::events::header::{EventHeader, EventType};
use crate::events::{require_positive, require_symbol, EventError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    Close,
}

impl SignalType {
    //signals that open or add exposure
    pub fn is_entry(self) -> bool {
        matches!(self, SignalType::Buy)
    }

    //signals that reduce exposure
    pub fn is_exit(self) -> bool {
        matches!(self, SignalType::Sell | SignalType::Close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalCategory {
    Entry,
    Exit,
    Adjust,
}

//optional sizing and risk fields a strategy can attach to a signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalEnhancement {
    //fraction of equity to commit, in (0, 1]
    pub position_size: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub category: Option<SignalCategory>,
    //minutes after the signal timestamp at which it expires
    pub validity_minutes: Option<i64>,
}

impl SignalEnhancement {
    fn validate(&self) -> Result<(), EventError> {
        if let Some(size) = self.position_size {
            if size.is_nan() || size <= 0.0 || size > 1.0 {
                return Err(EventError::InvalidPositionSize(size));
            }
        }
        if let Some(price) = self.stop_loss_price {
            require_positive("stop loss price", price)?;
        }
        if let Some(price) = self.take_profit_price {
            require_positive("take profit price", price)?;
        }
        if let Some(trail) = self.trailing_stop {
            require_positive("trailing stop", trail)?;
        }
        if let Some(minutes) = self.validity_minutes {
            if minutes <= 0 {
                return Err(EventError::InvalidValidityPeriod(minutes));
            }
        }
        Ok(())
    }
}

//None when the period does not fit in a timestamp
fn expiry_after(timestamp: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    timestamp.checked_add_signed(Duration::try_minutes(minutes)?)
}

//advisory output of a strategy, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    header: EventHeader,
    symbol: String,
    signal_type: SignalType,
    strength: f64,
    strategy_name: String,
    comment: String,
    enhancement: Option<SignalEnhancement>,
}

impl SignalEvent {
    pub fn new(
        symbol: impl Into<String>,
        signal_type: SignalType,
        strength: f64,
        strategy_name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        if !(0.0..=1.0).contains(&strength) {
            return Err(EventError::InvalidStrength(strength));
        }

        let strategy_name = strategy_name.into();

        Ok(SignalEvent {
            header: EventHeader::new(EventType::Signal, timestamp, strategy_name.clone()),
            symbol: require_symbol(symbol.into())?,
            signal_type,
            strength,
            strategy_name,
            comment: String::new(),
            enhancement: None,
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    //attaches sizing/risk fields, validating them first
    pub fn with_enhancement(mut self, enhancement: SignalEnhancement) -> Result<Self, EventError> {
        enhancement.validate()?;
        if let Some(minutes) = enhancement.validity_minutes {
            if expiry_after(self.timestamp(), minutes).is_none() {
                return Err(EventError::InvalidValidityPeriod(minutes));
            }
        }
        self.enhancement = Some(enhancement);
        Ok(self)
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn enhancement(&self) -> Option<&SignalEnhancement> {
        self.enhancement.as_ref()
    }

    pub fn position_size(&self) -> Option<f64> {
        self.enhancement.as_ref().and_then(|e| e.position_size)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.enhancement
            .as_ref()
            .and_then(|e| e.validity_minutes)
            .and_then(|minutes| expiry_after(self.timestamp(), minutes))
    }

    //signals without a validity period never expire
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expires_at().map(|expiry| at >= expiry).unwrap_or(false)
    }
}

impl PartialEq for SignalEvent {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}
