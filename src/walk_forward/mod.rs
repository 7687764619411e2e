pub mod window;

pub use window::{generate_windows, WalkForwardWindow};

use crate::config::{BacktestConfig, ConfigError};
use crate::data::DataFeed;
use crate::metrics::SummaryMetrics;
use crate::optimizer::{
    panic_message, run_single, OptimizerError, ParameterOptimizer, ParameterSpace, SearchMethod,
};
use crate::strategy::{ParamSet, StrategyFactory};
use log::{info, warn};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalkForwardError {
    #[error("Invalid walk-forward configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("No complete window fits between {start} and {end}")]
    NoWindows {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub training_months: u32,
    pub testing_months: u32,
    pub rolling_step_months: u32,
    //when false every round uses `fixed_parameters`
    pub optimize: bool,
    pub search: SearchMethod,
    pub fixed_parameters: ParamSet,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            training_months: 12,
            testing_months: 3,
            rolling_step_months: 3,
            optimize: true,
            search: SearchMethod::Grid,
            fixed_parameters: ParamSet::new(),
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, months) in [
            ("training_months", self.training_months),
            ("testing_months", self.testing_months),
            ("rolling_step_months", self.rolling_step_months),
        ] {
            if months == 0 {
                return Err(ConfigError::invalid(field, "must be at least one month"));
            }
        }
        if let SearchMethod::Random { iterations: 0 } = self.search {
            return Err(ConfigError::invalid(
                "search",
                "random search needs at least one iteration",
            ));
        }
        Ok(())
    }
}

//outcome of one train/test round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardRound {
    pub window: WalkForwardWindow,
    pub parameters: Option<ParamSet>,
    //best training score; None with fixed parameters
    #[serde(with = "crate::metrics::float_serde::option")]
    pub in_sample_score: Option<f64>,
    pub out_of_sample: Option<SummaryMetrics>,
    pub failed: bool,
    pub error: Option<String>,
}

impl WalkForwardRound {
    fn failure(window: WalkForwardWindow, parameters: Option<ParamSet>, error: String) -> Self {
        WalkForwardRound {
            window,
            parameters,
            in_sample_score: None,
            out_of_sample: None,
            failed: true,
            error: Some(error),
        }
    }

    pub fn out_of_sample_return(&self) -> Option<f64> {
        self.out_of_sample.as_ref().map(|s| s.total_return)
    }
}

//aggregate over the successful rounds' out-of-sample returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardStats {
    pub rounds: usize,
    pub mean_return: f64,
    pub std_return: f64,
    pub best_return: f64,
    pub worst_return: f64,
    pub win_rate: f64,
    pub consistency: f64,
}

impl WalkForwardStats {
    //None when there is nothing to aggregate
    pub fn from_returns(returns: &[f64]) -> Option<Self> {
        if returns.is_empty() {
            return None;
        }

        let std_return = if returns.len() < 2 {
            0.0
        } else {
            returns.std_dev()
        };
        let winners = returns.iter().filter(|&&r| r > 0.0).count();

        let consistency = if returns.len() < 2 {
            1.0
        } else {
            let agreeing = returns
                .windows(2)
                .filter(|pair| same_sign(pair[0], pair[1]))
                .count();
            agreeing as f64 / (returns.len() - 1) as f64
        };

        Some(WalkForwardStats {
            rounds: returns.len(),
            mean_return: returns.mean(),
            std_return,
            best_return: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_return: returns.iter().copied().fold(f64::INFINITY, f64::min),
            win_rate: winners as f64 / returns.len() as f64,
            consistency,
        })
    }
}

//zero counts as its own sign
fn same_sign(a: f64, b: f64) -> bool {
    (a > 0.0) == (b > 0.0) && (a < 0.0) == (b < 0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub rounds: Vec<WalkForwardRound>,
    //None when every round failed
    pub aggregate: Option<WalkForwardStats>,
}

impl WalkForwardResult {
    fn from_rounds(rounds: Vec<WalkForwardRound>) -> Self {
        let returns: Vec<f64> = rounds
            .iter()
            .filter(|r| !r.failed)
            .filter_map(|r| r.out_of_sample_return())
            .collect();

        WalkForwardResult {
            aggregate: WalkForwardStats::from_returns(&returns),
            rounds,
        }
    }

    pub fn failed_rounds(&self) -> usize {
        self.rounds.iter().filter(|r| r.failed).count()
    }

    pub fn is_total_failure(&self) -> bool {
        self.aggregate.is_none()
    }

    pub fn pretty_print_table(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Round"),
            Cell::new("Train"),
            Cell::new("Test"),
            Cell::new("Parameters"),
            Cell::new("IS Score"),
            Cell::new("OOS Return"),
            Cell::new("Status"),
        ]));

        for round in &self.rounds {
            let w = &round.window;
            let params = round
                .parameters
                .as_ref()
                .map(|p| {
                    p.iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();

            table.add_row(Row::new(vec![
                Cell::new(&format!("{}", w.index + 1)),
                Cell::new(&format!("{} .. {}", w.train_start, w.train_last_day())),
                Cell::new(&format!("{} .. {}", w.train_end, w.test_last_day())),
                Cell::new(&params),
                Cell::new(
                    &round
                        .in_sample_score
                        .map(|s| format!("{:.4}", s))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(
                    &round
                        .out_of_sample_return()
                        .map(|r| format!("{:.2}%", r * 100.0))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(round.error.as_deref().unwrap_or("ok")),
            ]));
        }
        table.printstd();

        match &self.aggregate {
            Some(stats) => {
                let mut summary = Table::new();
                let rows = [
                    ("Successful Rounds", format!("{}", stats.rounds)),
                    ("Failed Rounds", format!("{}", self.failed_rounds())),
                    ("Mean OOS Return", format!("{:.2}%", stats.mean_return * 100.0)),
                    ("Std OOS Return", format!("{:.2}%", stats.std_return * 100.0)),
                    ("Best OOS Return", format!("{:.2}%", stats.best_return * 100.0)),
                    ("Worst OOS Return", format!("{:.2}%", stats.worst_return * 100.0)),
                    ("Win Rate", format!("{:.2}%", stats.win_rate * 100.0)),
                    ("Consistency", format!("{:.2}", stats.consistency)),
                ];
                for (label, value) in rows {
                    summary.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
                }
                summary.printstd();
            }
            None => println!("Walk-forward failed: no round completed"),
        }
    }
}

//re-optimizes on each training segment and scores the following test segment
pub struct WalkForwardAnalyzer {
    config: WalkForwardConfig,
    optimizer: ParameterOptimizer,
}

impl WalkForwardAnalyzer {
    pub fn new(config: WalkForwardConfig, optimizer: ParameterOptimizer) -> Self {
        WalkForwardAnalyzer { config, optimizer }
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    pub fn windows(&self, base: &BacktestConfig) -> Vec<WalkForwardWindow> {
        generate_windows(
            base.start_date,
            base.end_date,
            self.config.training_months,
            self.config.testing_months,
            self.config.rolling_step_months,
        )
    }

    pub fn analyze(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        base: &BacktestConfig,
        space: &ParameterSpace,
    ) -> Result<WalkForwardResult, WalkForwardError> {
        self.config.validate()?;
        base.validate()?;

        let windows = self.windows(base);
        if windows.is_empty() {
            return Err(WalkForwardError::NoWindows {
                start: base.start_date,
                end: base.end_date,
            });
        }

        info!("Walk-forward analysis over {} windows", windows.len());

        let rounds = windows
            .into_iter()
            .map(|window| self.isolated_round(factory, feed, base, space, window))
            .collect();

        let result = WalkForwardResult::from_rounds(rounds);
        match &result.aggregate {
            Some(stats) => info!(
                "Walk-forward finished: {} rounds ok, {} failed, mean OOS return {:.4}",
                stats.rounds,
                result.failed_rounds(),
                stats.mean_return
            ),
            None => warn!("Walk-forward finished with every round failing"),
        }
        Ok(result)
    }

    //a panicking round is recorded as failed and the next one still runs
    fn isolated_round(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        base: &BacktestConfig,
        space: &ParameterSpace,
        window: WalkForwardWindow,
    ) -> WalkForwardRound {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_round(factory, feed, base, space, window)
        }));

        outcome.unwrap_or_else(|payload| {
            let message = format!("panicked: {}", panic_message(payload));
            warn!("Walk-forward round {} {}", window.index, message);
            let parameters = (!self.config.optimize).then(|| self.config.fixed_parameters.clone());
            WalkForwardRound::failure(window, parameters, message)
        })
    }

    fn run_round(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        base: &BacktestConfig,
        space: &ParameterSpace,
        window: WalkForwardWindow,
    ) -> WalkForwardRound {
        let (parameters, in_sample_score) = match self.select_parameters(
            factory,
            feed,
            &base.for_range(window.train_start, window.train_last_day()),
            space,
        ) {
            Ok(selected) => selected,
            Err(message) => {
                warn!("Walk-forward round {} training failed: {}", window.index, message);
                return WalkForwardRound::failure(window, None, message);
            }
        };

        let test_config = base.for_range(window.train_end, window.test_last_day());
        match run_single(factory, feed, &test_config, &parameters) {
            Ok(result) => WalkForwardRound {
                window,
                parameters: Some(parameters),
                in_sample_score,
                out_of_sample: Some(result.summary),
                failed: false,
                error: None,
            },
            Err(err) => {
                warn!("Walk-forward round {} test run failed: {}", window.index, err);
                WalkForwardRound::failure(window, Some(parameters), err.to_string())
            }
        }
    }

    fn select_parameters(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        train_config: &BacktestConfig,
        space: &ParameterSpace,
    ) -> Result<(ParamSet, Option<f64>), String> {
        if !self.config.optimize {
            return Ok((self.config.fixed_parameters.clone(), None));
        }

        let result = self
            .optimizer
            .optimize(self.config.search, factory, feed, train_config, space)
            .map_err(|e: OptimizerError| e.to_string())?;

        match result.best() {
            Some(best) => Ok((best.parameters.clone(), Some(best.score))),
            None => Err(format!(
                "all {} training evaluations failed",
                result.failed
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_mixed_returns() {
        let stats = WalkForwardStats::from_returns(&[0.1, -0.05, 0.2, 0.05]).unwrap();

        assert_eq!(stats.rounds, 4);
        assert!((stats.mean_return - 0.075).abs() < 1e-12);
        assert_eq!(stats.best_return, 0.2);
        assert_eq!(stats.worst_return, -0.05);
        assert!((stats.win_rate - 0.75).abs() < 1e-12);
        //(+,-) (-,+) (+,+)
        assert!((stats.consistency - 1.0 / 3.0).abs() < 1e-12);
        assert!(stats.std_return > 0.0);
    }

    #[test]
    fn single_round_is_fully_consistent() {
        let stats = WalkForwardStats::from_returns(&[-0.02]).unwrap();
        assert_eq!(stats.consistency, 1.0);
        assert_eq!(stats.std_return, 0.0);
        assert_eq!(stats.win_rate, 0.0);
    }

    #[test]
    fn no_returns_means_no_aggregate() {
        assert!(WalkForwardStats::from_returns(&[]).is_none());
    }

    #[test]
    fn zero_month_configs_are_rejected() {
        let config = WalkForwardConfig {
            rolling_step_months: 0,
            ..WalkForwardConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(WalkForwardConfig::default().validate().is_ok());
    }
}
