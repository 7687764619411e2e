use crate::config::ConfigError;
use crate::events::{SignalEvent, SignalType};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MAX_POSITION_RATIO: &str = "max_position_ratio";
pub const MAX_DRAWDOWN: &str = "max_drawdown";
pub const DAILY_LOSS_LIMIT: &str = "daily_loss_limit";
pub const MAX_CONSECUTIVE_LOSSES: &str = "max_consecutive_losses";

//limits applied to entry signals; ratios are fractions of equity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_ratio: f64,
    pub max_drawdown: f64,
    pub daily_loss_limit: f64,
    pub max_consecutive_losses: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_position_ratio: 0.95,
            max_drawdown: 0.5,
            daily_loss_limit: 0.1,
            max_consecutive_losses: 10,
        }
    }
}

impl RiskLimits {
    //builds limits from the backtest risk-parameter map over the defaults
    pub fn from_parameters(parameters: &IndexMap<String, f64>) -> Result<Self, ConfigError> {
        let mut limits = RiskLimits::default();

        for (name, &value) in parameters {
            match name.as_str() {
                MAX_POSITION_RATIO => limits.max_position_ratio = unit_fraction(name, value)?,
                MAX_DRAWDOWN => limits.max_drawdown = unit_fraction(name, value)?,
                DAILY_LOSS_LIMIT => limits.daily_loss_limit = unit_fraction(name, value)?,
                MAX_CONSECUTIVE_LOSSES => {
                    if !(value >= 1.0) || value.fract() != 0.0 || value > u32::MAX as f64 {
                        return Err(ConfigError::invalid(
                            name.as_str(),
                            format!("must be a positive whole number, got {value}"),
                        ));
                    }
                    limits.max_consecutive_losses = value as u32;
                }
                other => warn!("Ignoring unknown risk parameter '{}'", other),
            }
        }

        Ok(limits)
    }
}

fn unit_fraction(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must lie in (0, 1], got {value}"),
        ))
    }
}

//point-in-time view of the portfolio handed to the risk gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
    pub cash: f64,
    //market value held in the signal's symbol
    pub position_value: f64,
    pub peak_value: f64,
    //total value at the start of the current trading day
    pub day_start_value: f64,
    pub consecutive_losses: u32,
}

impl RiskSnapshot {
    pub fn drawdown(&self) -> f64 {
        if self.peak_value <= 0.0 {
            return 0.0;
        }
        ((self.peak_value - self.total_value) / self.peak_value).max(0.0)
    }

    pub fn daily_loss(&self) -> f64 {
        if self.day_start_value <= 0.0 {
            return 0.0;
        }
        ((self.day_start_value - self.total_value) / self.day_start_value).max(0.0)
    }

    pub fn position_ratio(&self) -> f64 {
        if self.total_value <= 0.0 {
            return 1.0;
        }
        self.position_value / self.total_value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NoAction,
    Expired { expired_at: DateTime<Utc> },
    MaxDrawdown { drawdown: f64, limit: f64 },
    DailyLossLimit { loss: f64, limit: f64 },
    ConsecutiveLosses { losses: u32, limit: u32 },
    PositionLimit { ratio: f64, limit: f64 },
    PositionSizeTooLarge { requested: f64, limit: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoAction => write!(f, "hold signal carries no action"),
            RejectReason::Expired { expired_at } => write!(f, "signal expired at {}", expired_at),
            RejectReason::MaxDrawdown { drawdown, limit } => {
                write!(f, "drawdown {:.4} at or above limit {:.4}", drawdown, limit)
            }
            RejectReason::DailyLossLimit { loss, limit } => {
                write!(f, "daily loss {:.4} at or above limit {:.4}", loss, limit)
            }
            RejectReason::ConsecutiveLosses { losses, limit } => {
                write!(f, "{} consecutive losses (limit {})", losses, limit)
            }
            RejectReason::PositionLimit { ratio, limit } => {
                write!(f, "position ratio {:.4} at or above limit {:.4}", ratio, limit)
            }
            RejectReason::PositionSizeTooLarge { requested, limit } => {
                write!(f, "requested size {:.4} above limit {:.4}", requested, limit)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Accept,
    Reject(RejectReason),
}

impl RiskDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RiskDecision::Accept)
    }
}

//stateless gate between strategy output and order creation
#[derive(Debug, Default)]
pub struct RiskManager {
    limits: RiskLimits,
    rejections: AtomicU64,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        RiskManager {
            limits,
            rejections: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn rejection_count(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn validate(&self, signal: &SignalEvent, snapshot: &RiskSnapshot) -> RiskDecision {
        match self.check(signal, snapshot) {
            Some(reason) => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Rejected {:?} signal from {} for {}: {}",
                    signal.signal_type(),
                    signal.strategy_name(),
                    signal.symbol(),
                    reason
                );
                RiskDecision::Reject(reason)
            }
            None => RiskDecision::Accept,
        }
    }

    fn check(&self, signal: &SignalEvent, snapshot: &RiskSnapshot) -> Option<RejectReason> {
        match signal.signal_type() {
            SignalType::Hold => return Some(RejectReason::NoAction),
            //exits always reduce exposure
            SignalType::Sell | SignalType::Close => return None,
            SignalType::Buy => {}
        }

        let limits = &self.limits;

        if signal.is_expired(snapshot.timestamp) {
            if let Some(expired_at) = signal.expires_at() {
                return Some(RejectReason::Expired { expired_at });
            }
        }

        let drawdown = snapshot.drawdown();
        if drawdown >= limits.max_drawdown {
            return Some(RejectReason::MaxDrawdown {
                drawdown,
                limit: limits.max_drawdown,
            });
        }

        let loss = snapshot.daily_loss();
        if loss >= limits.daily_loss_limit {
            return Some(RejectReason::DailyLossLimit {
                loss,
                limit: limits.daily_loss_limit,
            });
        }

        if snapshot.consecutive_losses >= limits.max_consecutive_losses {
            return Some(RejectReason::ConsecutiveLosses {
                losses: snapshot.consecutive_losses,
                limit: limits.max_consecutive_losses,
            });
        }

        let ratio = snapshot.position_ratio();
        if ratio >= limits.max_position_ratio {
            return Some(RejectReason::PositionLimit {
                ratio,
                limit: limits.max_position_ratio,
            });
        }

        if let Some(requested) = signal.position_size() {
            if requested > limits.max_position_ratio {
                return Some(RejectReason::PositionSizeTooLarge {
                    requested,
                    limit: limits.max_position_ratio,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SignalEnhancement;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 1, 10, 0, 0).unwrap()
    }

    fn snapshot() -> RiskSnapshot {
        RiskSnapshot {
            timestamp: ts(),
            total_value: 100_000.0,
            cash: 100_000.0,
            position_value: 0.0,
            peak_value: 100_000.0,
            day_start_value: 100_000.0,
            consecutive_losses: 0,
        }
    }

    fn signal(signal_type: SignalType) -> SignalEvent {
        SignalEvent::new("ES", signal_type, 0.8, "test", ts()).unwrap()
    }

    fn sized_buy(size: f64) -> SignalEvent {
        signal(SignalType::Buy)
            .with_enhancement(SignalEnhancement {
                position_size: Some(size),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn accepts_buy_within_limits() {
        let risk = RiskManager::default();
        assert_eq!(risk.validate(&signal(SignalType::Buy), &snapshot()), RiskDecision::Accept);
        assert_eq!(risk.rejection_count(), 0);
    }

    #[test]
    fn hold_is_rejected_exits_are_accepted() {
        let risk = RiskManager::default();
        let mut stressed = snapshot();
        stressed.total_value = 10_000.0;
        stressed.consecutive_losses = 50;

        assert_eq!(
            risk.validate(&signal(SignalType::Hold), &snapshot()),
            RiskDecision::Reject(RejectReason::NoAction)
        );
        assert!(risk.validate(&signal(SignalType::Sell), &stressed).is_accepted());
        assert!(risk.validate(&signal(SignalType::Close), &stressed).is_accepted());
        assert_eq!(risk.rejection_count(), 1);
    }

    #[test]
    fn rejects_buy_on_drawdown() {
        let risk = RiskManager::new(RiskLimits {
            max_drawdown: 0.2,
            ..Default::default()
        });
        let mut snap = snapshot();
        snap.peak_value = 125_000.0;
        snap.day_start_value = 100_000.0;

        assert!(matches!(
            risk.validate(&signal(SignalType::Buy), &snap),
            RiskDecision::Reject(RejectReason::MaxDrawdown { .. })
        ));
    }

    #[test]
    fn rejects_buy_on_daily_loss() {
        let risk = RiskManager::default();
        let mut snap = snapshot();
        snap.day_start_value = 120_000.0;
        snap.peak_value = 120_000.0;

        assert!(matches!(
            risk.validate(&signal(SignalType::Buy), &snap),
            RiskDecision::Reject(RejectReason::DailyLossLimit { .. })
        ));
    }

    #[test]
    fn rejects_buy_after_losing_streak() {
        let risk = RiskManager::new(RiskLimits {
            max_consecutive_losses: 3,
            ..Default::default()
        });
        let mut snap = snapshot();
        snap.consecutive_losses = 3;

        assert!(matches!(
            risk.validate(&signal(SignalType::Buy), &snap),
            RiskDecision::Reject(RejectReason::ConsecutiveLosses { losses: 3, limit: 3 })
        ));
    }

    #[test]
    fn rejects_buy_on_position_ratio_and_requested_size() {
        let risk = RiskManager::new(RiskLimits {
            max_position_ratio: 0.5,
            ..Default::default()
        });

        let mut heavy = snapshot();
        heavy.position_value = 60_000.0;
        assert!(matches!(
            risk.validate(&signal(SignalType::Buy), &heavy),
            RiskDecision::Reject(RejectReason::PositionLimit { .. })
        ));

        assert!(matches!(
            risk.validate(&sized_buy(0.8), &snapshot()),
            RiskDecision::Reject(RejectReason::PositionSizeTooLarge { .. })
        ));
        assert!(risk.validate(&sized_buy(0.4), &snapshot()).is_accepted());
    }

    #[test]
    fn rejects_expired_signal() {
        let risk = RiskManager::default();
        let buy = signal(SignalType::Buy)
            .with_enhancement(SignalEnhancement {
                validity_minutes: Some(30),
                ..Default::default()
            })
            .unwrap();

        let mut snap = snapshot();
        snap.timestamp = ts() + Duration::minutes(10);
        assert!(risk.validate(&buy, &snap).is_accepted());

        snap.timestamp = ts() + Duration::minutes(30);
        assert!(matches!(
            risk.validate(&buy, &snap),
            RiskDecision::Reject(RejectReason::Expired { .. })
        ));
    }

    #[test]
    fn limits_from_parameters() {
        let mut params = IndexMap::new();
        params.insert(MAX_DRAWDOWN.to_string(), 0.25);
        params.insert(MAX_CONSECUTIVE_LOSSES.to_string(), 4.0);
        params.insert("leverage".to_string(), 3.0);

        let limits = RiskLimits::from_parameters(&params).unwrap();
        assert_eq!(limits.max_drawdown, 0.25);
        assert_eq!(limits.max_consecutive_losses, 4);
        assert_eq!(limits.daily_loss_limit, RiskLimits::default().daily_loss_limit);

        params.insert(DAILY_LOSS_LIMIT.to_string(), 1.5);
        assert!(RiskLimits::from_parameters(&params).is_err());

        let mut fractional = IndexMap::new();
        fractional.insert(MAX_CONSECUTIVE_LOSSES.to_string(), 2.5);
        assert!(RiskLimits::from_parameters(&fractional).is_err());
    }

    proptest! {
        #[test]
        fn decision_is_idempotent(
            total in 1_000.0f64..200_000.0,
            peak_extra in 0.0f64..100_000.0,
            day_start in 1_000.0f64..200_000.0,
            position in 0.0f64..150_000.0,
            losses in 0u32..20,
            kind in 0usize..4,
        ) {
            let snap = RiskSnapshot {
                timestamp: ts(),
                total_value: total,
                cash: total - position.min(total),
                position_value: position,
                peak_value: total + peak_extra,
                day_start_value: day_start,
                consecutive_losses: losses,
            };
            let signal_type = [SignalType::Buy, SignalType::Sell, SignalType::Hold, SignalType::Close][kind];
            let risk = RiskManager::default();
            let sig = signal(signal_type);

            let first = risk.validate(&sig, &snap);
            let second = risk.validate(&sig, &snap);
            prop_assert_eq!(first, second);
        }
    }
}
