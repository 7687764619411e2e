use crate::cache::{CacheManager, CacheRegionConfig};
use crate::config::{BacktestConfig, ConfigError};
use crate::optimizer::{OptimizerConfig, ParameterDomain, ParameterSpace, ScoringWeights};
use crate::strategy::ParamSet;
use crate::walk_forward::WalkForwardConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SmaCrossover,
    RsiReversion,
}

impl StrategyType {
    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            "rsi" | "rsi_reversion" => Some(StrategyType::RsiReversion),
            _ => None,
        }
    }

    //search space used when a run file does not provide one
    pub fn default_parameter_space(self) -> ParameterSpace {
        match self {
            StrategyType::SmaCrossover => ParameterSpace::new()
                .with(
                    "fast_window",
                    ParameterDomain::Integer {
                        min: 5,
                        max: 20,
                        step: 5,
                    },
                )
                .with(
                    "slow_window",
                    ParameterDomain::Integer {
                        min: 30,
                        max: 60,
                        step: 10,
                    },
                ),
            StrategyType::RsiReversion => ParameterSpace::new()
                .with(
                    "lookback",
                    ParameterDomain::Discrete {
                        values: vec![7.0, 14.0, 21.0],
                    },
                )
                .with(
                    "oversold",
                    ParameterDomain::Continuous {
                        min: 20.0,
                        max: 35.0,
                        step: 5.0,
                    },
                )
                .with(
                    "overbought",
                    ParameterDomain::Continuous {
                        min: 65.0,
                        max: 80.0,
                        step: 5.0,
                    },
                ),
        }
    }
}

//everything the cli needs for one invocation, loadable from a single json file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub backtest: BacktestConfig,
    pub strategy: StrategyType,
    //parameters for a single run; strategy defaults fill the gaps
    #[serde(default)]
    pub parameters: ParamSet,
    #[serde(default)]
    pub parameter_space: Option<ParameterSpace>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default = "CacheManager::default_region_configs")]
    pub cache_regions: Vec<CacheRegionConfig>,
}

impl RunConfiguration {
    pub fn new(backtest: BacktestConfig, strategy: StrategyType) -> Self {
        RunConfiguration {
            backtest,
            strategy,
            parameters: ParamSet::new(),
            parameter_space: None,
            optimizer: OptimizerConfig::default(),
            scoring: ScoringWeights::default(),
            walk_forward: WalkForwardConfig::default(),
            cache_regions: CacheManager::default_region_configs(),
        }
    }

    pub fn parameter_space(&self) -> ParameterSpace {
        self.parameter_space
            .clone()
            .unwrap_or_else(|| self.strategy.default_parameter_space())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        self.walk_forward.validate()?;
        for region in &self.cache_regions {
            region
                .validate()
                .map_err(|e| ConfigError::invalid("cache_regions", e.to_string()))?;
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfiguration = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
