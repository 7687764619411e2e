pub mod scoring;
pub mod space;

pub use scoring::ScoringWeights;
pub use space::{ParameterDomain, ParameterSpace};

use crate::config::BacktestConfig;
use crate::data::DataFeed;
use crate::engine::{BacktestEngine, BacktestError, BacktestResult};
use crate::metrics::SummaryMetrics;
use crate::strategy::{ParamSet, StrategyError, StrategyFactory};
use log::{info, warn};
use prettytable::{Cell, Row, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Parameter space has no parameters")]
    EmptySpace,
    #[error("Invalid domain for parameter '{name}': {reason}")]
    InvalidDomain { name: String, reason: String },
    #[error("Random search needs at least one iteration")]
    NoIterations,
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

//failure of a single parameter evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("strategy construction failed: {0}")]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SearchMethod {
    Grid,
    Random { iterations: usize },
}

impl Default for SearchMethod {
    fn default() -> Self {
        SearchMethod::Grid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    //upper bound on grid-search worker threads
    pub max_threads: usize,
    //seed for random search; entropy when absent
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            seed: None,
        }
    }
}

//outcome of one parameter combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEvaluation {
    pub parameters: ParamSet,
    //negative infinity for failed runs
    #[serde(with = "crate::metrics::float_serde")]
    pub score: f64,
    pub summary: Option<SummaryMetrics>,
    pub error: Option<String>,
}

impl ParameterEvaluation {
    fn success(parameters: ParamSet, score: f64, summary: SummaryMetrics) -> Self {
        ParameterEvaluation {
            parameters,
            score,
            summary: Some(summary),
            error: None,
        }
    }

    fn failure(parameters: ParamSet, error: String) -> Self {
        ParameterEvaluation {
            parameters,
            score: f64::NEG_INFINITY,
            summary: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

//ranked evaluations of a whole search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    //descending score; failures last
    pub evaluations: Vec<ParameterEvaluation>,
    pub successful: usize,
    pub failed: usize,
}

impl OptimizationResult {
    fn from_evaluations(mut evaluations: Vec<ParameterEvaluation>) -> Self {
        //stable, so equal scores keep evaluation order
        evaluations.sort_by(|a, b| {
            b.is_success()
                .cmp(&a.is_success())
                .then_with(|| b.score.total_cmp(&a.score))
        });

        let successful = evaluations.iter().filter(|e| e.is_success()).count();
        let failed = evaluations.len() - successful;

        OptimizationResult {
            evaluations,
            successful,
            failed,
        }
    }

    //best successful evaluation; None when every unit failed
    pub fn best(&self) -> Option<&ParameterEvaluation> {
        self.evaluations.first().filter(|e| e.is_success())
    }

    pub fn top(&self, n: usize) -> &[ParameterEvaluation] {
        &self.evaluations[..n.min(self.evaluations.len())]
    }

    pub fn is_total_failure(&self) -> bool {
        self.successful == 0
    }

    //prints the top evaluations in a formatted table
    pub fn pretty_print_table(&self, n: usize) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Rank"),
            Cell::new("Parameters"),
            Cell::new("Score"),
            Cell::new("Return"),
            Cell::new("Sharpe"),
            Cell::new("Max DD"),
            Cell::new("Fills"),
        ]));

        for (rank, evaluation) in self.top(n).iter().enumerate() {
            let params = evaluation
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");

            let metrics = match &evaluation.summary {
                Some(s) => [
                    format!("{:.2}%", s.total_return * 100.0),
                    format!("{:.3}", s.sharpe_ratio),
                    format!("{:.2}%", s.max_drawdown * 100.0),
                    format!("{}", s.total_trades),
                ],
                None => [
                    evaluation.error.clone().unwrap_or_default(),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
            };

            table.add_row(Row::new(vec![
                Cell::new(&format!("{}", rank + 1)),
                Cell::new(&params),
                Cell::new(&format!("{:.4}", evaluation.score)),
                Cell::new(&metrics[0]),
                Cell::new(&metrics[1]),
                Cell::new(&metrics[2]),
                Cell::new(&metrics[3]),
            ]));
        }

        table.printstd();
    }
}

//one fresh strategy and engine per parameter set
pub fn run_single(
    factory: &dyn StrategyFactory,
    feed: &dyn DataFeed,
    config: &BacktestConfig,
    parameters: &ParamSet,
) -> Result<BacktestResult, EvaluationError> {
    let mut strategy = factory.create(parameters)?;
    let mut engine = BacktestEngine::new(config.clone())?;
    Ok(engine.run(strategy.as_mut(), feed)?)
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//searches a parameter space by running independent backtests
#[derive(Debug, Clone, Default)]
pub struct ParameterOptimizer {
    config: OptimizerConfig,
    weights: ScoringWeights,
}

impl ParameterOptimizer {
    pub fn new(config: OptimizerConfig, weights: ScoringWeights) -> Self {
        ParameterOptimizer { config, weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn optimize(
        &self,
        method: SearchMethod,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        config: &BacktestConfig,
        space: &ParameterSpace,
    ) -> Result<OptimizationResult, OptimizerError> {
        match method {
            SearchMethod::Grid => self.grid_search(factory, feed, config, space),
            SearchMethod::Random { iterations } => {
                self.random_search(factory, feed, config, space, iterations)
            }
        }
    }

    //evaluates every grid combination on a bounded worker pool
    pub fn grid_search(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        config: &BacktestConfig,
        space: &ParameterSpace,
    ) -> Result<OptimizationResult, OptimizerError> {
        let combinations = space.grid()?;
        let threads = self.config.max_threads.min(combinations.len()).max(1);

        info!(
            "Grid search over {} combinations on {} threads",
            combinations.len(),
            threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("optimizer-{}", i))
            .build()
            .map_err(|e| OptimizerError::ThreadPool(e.to_string()))?;

        let evaluations: Vec<ParameterEvaluation> = pool.install(|| {
            combinations
                .into_par_iter()
                .map(|parameters| self.evaluate(factory, feed, config, parameters))
                .collect()
        });

        let result = OptimizationResult::from_evaluations(evaluations);
        self.log_outcome("Grid search", &result);
        Ok(result)
    }

    //evaluates `iterations` uniformly sampled parameter sets in sequence
    pub fn random_search(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        config: &BacktestConfig,
        space: &ParameterSpace,
        iterations: usize,
    ) -> Result<OptimizationResult, OptimizerError> {
        space.validate()?;
        if iterations == 0 {
            return Err(OptimizerError::NoIterations);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!("Random search with {} iterations", iterations);

        let evaluations = (0..iterations)
            .map(|_| {
                let parameters = space.sample(&mut rng);
                self.evaluate(factory, feed, config, parameters)
            })
            .collect();

        let result = OptimizationResult::from_evaluations(evaluations);
        self.log_outcome("Random search", &result);
        Ok(result)
    }

    //errors and panics stay inside the unit
    fn evaluate(
        &self,
        factory: &dyn StrategyFactory,
        feed: &dyn DataFeed,
        config: &BacktestConfig,
        parameters: ParamSet,
    ) -> ParameterEvaluation {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_single(factory, feed, config, &parameters)
        }));

        match outcome {
            Ok(Ok(result)) => {
                let score = self.weights.score(&result.summary);
                ParameterEvaluation::success(parameters, score, result.summary)
            }
            Ok(Err(err)) => {
                warn!("Evaluation of {:?} failed: {}", parameters, err);
                ParameterEvaluation::failure(parameters, err.to_string())
            }
            Err(payload) => {
                let message = format!("panicked: {}", panic_message(payload));
                warn!("Evaluation of {:?} {}", parameters, message);
                ParameterEvaluation::failure(parameters, message)
            }
        }
    }

    fn log_outcome(&self, label: &str, result: &OptimizationResult) {
        match result.best() {
            Some(best) => info!(
                "{} finished: {} succeeded, {} failed, best score {:.4} with {:?}",
                label, result.successful, result.failed, best.score, best.parameters
            ),
            None => warn!(
                "{} finished with every one of {} evaluations failing",
                label, result.failed
            ),
        }
    }
}
