use crate::config::ConfigError;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

//simulated execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    //fractional adverse price move applied to every fill
    pub slippage: f64,
    //commission as a fraction of traded notional
    pub commission_rate: f64,
    //fixed simulated delay per order
    pub latency_ms: u64,
    //probability that an order fills
    pub fill_rate: f64,
    //seed for the fill-rate draw; entropy when absent
    pub seed: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage: 0.0005,
            commission_rate: 0.0003,
            latency_ms: 0,
            fill_rate: 1.0,
            seed: None,
        }
    }
}

impl ExecutionConfig {
    //no slippage, no commission, no latency, always fills
    pub fn frictionless() -> Self {
        ExecutionConfig {
            slippage: 0.0,
            commission_rate: 0.0,
            latency_ms: 0,
            fill_rate: 1.0,
            seed: Some(0),
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.slippage) {
            return Err(ConfigError::invalid("execution.slippage", "must lie in [0, 1)"));
        }
        if self.commission_rate.is_nan() || self.commission_rate < 0.0 {
            return Err(ConfigError::invalid(
                "execution.commission_rate",
                "must not be negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.fill_rate) {
            return Err(ConfigError::invalid("execution.fill_rate", "must lie in [0, 1]"));
        }
        Ok(())
    }
}

//how the portfolio turns an entry signal into a quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingRule {
    FixedQuantity { quantity: u64 },
    PercentOfEquity { fraction: f64 },
}

impl Default for SizingRule {
    fn default() -> Self {
        SizingRule::PercentOfEquity { fraction: 0.95 }
    }
}

impl SizingRule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SizingRule::FixedQuantity { quantity } if quantity == 0 => Err(ConfigError::invalid(
                "sizing.quantity",
                "must be positive",
            )),
            SizingRule::PercentOfEquity { fraction } if !(fraction > 0.0 && fraction <= 1.0) => {
                Err(ConfigError::invalid("sizing.fraction", "must lie in (0, 1]"))
            }
            _ => Ok(()),
        }
    }
}

//thresholds for flagging suspicious bars
//the 50% move and 20% gap defaults are carried as tunable heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityConfig {
    //largest close-to-close change not flagged
    pub max_bar_change: f64,
    //largest open-vs-previous-close gap across days not flagged
    pub max_overnight_gap: f64,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        DataQualityConfig {
            max_bar_change: 0.5,
            max_overnight_gap: 0.2,
        }
    }
}

impl DataQualityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_bar_change > 0.0) {
            return Err(ConfigError::invalid(
                "data_quality.max_bar_change",
                "must be positive",
            ));
        }
        if !(self.max_overnight_gap > 0.0) {
            return Err(ConfigError::invalid(
                "data_quality.max_overnight_gap",
                "must be positive",
            ));
        }
        Ok(())
    }
}

//immutable description of one backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    //inclusive
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    //limits read by the risk manager, keyed by limit name
    #[serde(default)]
    pub risk_parameters: IndexMap<String, f64>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub sizing: SizingRule,
    #[serde(default)]
    pub data_quality: DataQualityConfig,
}

impl BacktestConfig {
    pub fn new(
        symbol: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_capital: f64,
    ) -> Self {
        BacktestConfig {
            symbol: symbol.into(),
            start_date,
            end_date,
            initial_capital,
            risk_parameters: IndexMap::new(),
            execution: ExecutionConfig::default(),
            sizing: SizingRule::default(),
            data_quality: DataQualityConfig::default(),
        }
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingRule) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_risk_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.risk_parameters.insert(name.into(), value);
        self
    }

    //same settings over another date range
    pub fn for_range(&self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("symbol", "must not be empty"));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::invalid(
                "start_date",
                format!("{} is after end_date {}", self.start_date, self.end_date),
            ));
        }
        if !(self.initial_capital > 0.0) {
            return Err(ConfigError::invalid("initial_capital", "must be positive"));
        }
        self.execution.validate()?;
        self.sizing.validate()?;
        self.data_quality.validate()?;
        Ok(())
    }

    //load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> BacktestConfig {
        BacktestConfig::new("ES", date(2020, 1, 1), date(2020, 12, 31), 100_000.0)
    }

    #[test]
    fn default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_range_and_bad_capital() {
        let mut bad = config();
        bad.start_date = date(2021, 1, 1);
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.initial_capital = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_bad_execution_and_sizing() {
        let mut bad = config();
        bad.execution.fill_rate = 1.5;
        assert!(bad.validate().is_err());

        let bad = config().with_sizing(SizingRule::PercentOfEquity { fraction: 0.0 });
        assert!(bad.validate().is_err());

        let bad = config().with_sizing(SizingRule::FixedQuantity { quantity: 0 });
        assert!(bad.validate().is_err());
    }

    #[test]
    fn for_range_keeps_other_settings() {
        let base = config().with_risk_parameter("max_drawdown", 0.2);
        let sub = base.for_range(date(2020, 3, 1), date(2020, 3, 31));
        assert_eq!(sub.start_date, date(2020, 3, 1));
        assert_eq!(sub.risk_parameters, base.risk_parameters);
        assert_eq!(sub.symbol, "ES");
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backtest.json");

        let original = config()
            .with_risk_parameter("daily_loss_limit", 0.05)
            .with_sizing(SizingRule::FixedQuantity { quantity: 10 });
        original.to_json_file(&path).unwrap();

        let loaded = BacktestConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let json = r#"{
            "symbol": "NQ",
            "start_date": "2021-01-01",
            "end_date": "2021-06-30",
            "initial_capital": 50000.0
        }"#;
        let config: BacktestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.execution, ExecutionConfig::default());
        assert_eq!(config.sizing, SizingRule::default());
        assert!(config.risk_parameters.is_empty());
    }
}
