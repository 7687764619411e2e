use crate::config::DataQualityConfig;
use crate::events::{BarError, BarEvent};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QualityIssue {
    //close-to-close move above max_bar_change
    ExcessiveChange { change: f64, limit: f64 },
    //open vs previous close across a day boundary above max_overnight_gap
    ExcessiveGap { gap: f64, limit: f64 },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssue::ExcessiveChange { change, limit } => write!(
                f,
                "close moved {:.1}% (limit {:.1}%)",
                change * 100.0,
                limit * 100.0
            ),
            QualityIssue::ExcessiveGap { gap, limit } => write!(
                f,
                "overnight gap {:.1}% (limit {:.1}%)",
                gap * 100.0,
                limit * 100.0
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BarAssessment {
    Valid,
    //processed, but worth a warning
    Suspicious(Vec<QualityIssue>),
    //dropped before the strategy sees it
    Invalid(BarError),
}

//pre-signal gate applied by the engine to every bar
#[derive(Debug, Clone, Default)]
pub struct BarValidator {
    config: DataQualityConfig,
}

impl BarValidator {
    pub fn new(config: DataQualityConfig) -> Self {
        BarValidator { config }
    }

    pub fn assess(&self, bar: &BarEvent, previous: Option<&BarEvent>) -> BarAssessment {
        if let Err(err) = bar.validate_ohlc() {
            return BarAssessment::Invalid(err);
        }

        let Some(prev) = previous else {
            return BarAssessment::Valid;
        };

        let mut issues = Vec::new();

        let change = (bar.close - prev.close).abs() / prev.close;
        if change > self.config.max_bar_change {
            issues.push(QualityIssue::ExcessiveChange {
                change,
                limit: self.config.max_bar_change,
            });
        }

        if bar.timestamp().date_naive() != prev.timestamp().date_naive() {
            let gap = (bar.open - prev.close).abs() / prev.close;
            if gap > self.config.max_overnight_gap {
                issues.push(QualityIssue::ExcessiveGap {
                    gap,
                    limit: self.config.max_overnight_gap,
                });
            }
        }

        if issues.is_empty() {
            BarAssessment::Valid
        } else {
            BarAssessment::Suspicious(issues)
        }
    }
}
