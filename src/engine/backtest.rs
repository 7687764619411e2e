use crate::config::{BacktestConfig, ConfigError};
use crate::data::{BarAssessment, BarValidator, DataError, DataFeed};
use crate::engine::execution::SimulatedExecutionEngine;
use crate::engine::stats::{EngineStats, EngineStatsSnapshot, ExecutionStatsSnapshot};
use crate::events::{BarEvent, EventError, FillEvent};
use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
use crate::portfolio::{Portfolio, PortfolioError, SimplePortfolio};
use crate::risk::{RiskDecision, RiskLimits, RiskManager};
use crate::strategy::{Strategy, StrategyError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid backtest configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load bars: {0}")]
    Data(#[from] DataError),
    #[error("Strategy failed to initialize: {0}")]
    StrategyInit(#[source] StrategyError),
    #[error("Strategy failed on bar at {timestamp}: {source}")]
    Strategy {
        timestamp: DateTime<Utc>,
        #[source]
        source: StrategyError,
    },
    #[error("Portfolio rejected an update: {0}")]
    Portfolio(#[from] PortfolioError),
    #[error("Execution produced an invalid fill: {0}")]
    Execution(#[from] EventError),
}

//result of a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub symbol: String,
    pub summary: SummaryMetrics,
    pub equity_curve: Vec<EquityPoint>,
    //settled fills in execution order
    pub fills: Vec<FillEvent>,
    pub stats: EngineStatsSnapshot,
    pub execution: ExecutionStatsSnapshot,
}

//main backtest engine; every run starts from a fresh portfolio
pub struct BacktestEngine {
    config: BacktestConfig,
    limits: RiskLimits,
    validator: BarValidator,
    portfolio: SimplePortfolio,
    risk: RiskManager,
    execution: SimulatedExecutionEngine,
    stats: EngineStats,
    equity_history: Vec<(DateTime<Utc>, f64)>,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        let limits = RiskLimits::from_parameters(&config.risk_parameters)?;

        Ok(BacktestEngine {
            validator: BarValidator::new(config.data_quality.clone()),
            portfolio: SimplePortfolio::from_config(&config),
            risk: RiskManager::new(limits.clone()),
            execution: SimulatedExecutionEngine::new(config.execution.clone()),
            stats: EngineStats::default(),
            equity_history: Vec::new(),
            limits,
            config,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    //returns the portfolio as left by the last run
    pub fn portfolio(&self) -> &SimplePortfolio {
        &self.portfolio
    }

    pub fn risk_rejections(&self) -> u64 {
        self.risk.rejection_count()
    }

    fn reset_run_state(&mut self) {
        self.portfolio = SimplePortfolio::from_config(&self.config);
        self.risk = RiskManager::new(self.limits.clone());
        self.execution = SimulatedExecutionEngine::new(self.config.execution.clone());
        self.stats = EngineStats::default();
        self.equity_history.clear();
    }

    //runs the backtest with the given strategy over the configured date range
    pub fn run(
        &mut self,
        strategy: &mut dyn Strategy,
        feed: &dyn DataFeed,
    ) -> Result<BacktestResult, BacktestError> {
        self.reset_run_state();

        let bars = feed.load_historical_data(
            &self.config.symbol,
            self.config.start_date,
            self.config.end_date,
        )?;

        info!(
            "Running {} on {} bars of {} ({} to {})",
            strategy.name(),
            bars.len(),
            self.config.symbol,
            self.config.start_date,
            self.config.end_date
        );

        strategy.initialize().map_err(BacktestError::StrategyInit)?;

        //previous bar that passed the gate
        let mut previous: Option<&BarEvent> = None;

        for bar in &bars {
            if self.process_bar(strategy, bar, previous)? {
                previous = Some(bar);
            }
        }

        let result = self.build_result(strategy.name());

        info!(
            "{} finished: return {:.2}%, {} fills, {} bars rejected, {} signals rejected",
            result.strategy_name,
            result.summary.total_return * 100.0,
            result.stats.fills,
            result.stats.bars_rejected,
            result.stats.signals_rejected
        );

        Ok(result)
    }

    //runs one bar through gate, strategy, risk, sizing, execution and settlement
    //returns false when the bar was rejected by the gate
    fn process_bar(
        &mut self,
        strategy: &mut dyn Strategy,
        bar: &BarEvent,
        previous: Option<&BarEvent>,
    ) -> Result<bool, BacktestError> {
        self.stats.record_bar();

        match self.validator.assess(bar, previous) {
            BarAssessment::Invalid(err) => {
                warn!("Rejected bar for {} at {}: {}", bar.symbol, bar.timestamp(), err);
                self.stats.record_rejected_bar();
                return Ok(false);
            }
            BarAssessment::Suspicious(issues) => {
                for issue in &issues {
                    warn!("Suspicious bar for {} at {}: {}", bar.symbol, bar.timestamp(), issue);
                }
                self.stats.record_flagged_bar();
            }
            BarAssessment::Valid => {}
        }

        self.portfolio.mark_to_market(bar);

        let signals = strategy
            .on_bar(bar)
            .map_err(|source| BacktestError::Strategy {
                timestamp: bar.timestamp(),
                source,
            })?;

        for signal in signals {
            self.stats.record_signal();

            let snapshot = self.portfolio.risk_snapshot(signal.symbol(), bar.timestamp());
            if let RiskDecision::Reject(_) = self.risk.validate(&signal, &snapshot) {
                self.stats.record_rejected_signal();
                continue;
            }

            let Some(order) = self.portfolio.process_signal(&signal, bar)? else {
                continue;
            };
            self.stats.record_order();

            match self.execution.execute(order)? {
                Some(fill) => {
                    let settled = self.portfolio.process_fill(fill)?;
                    debug!(
                        "Filled {:?} {} {} @ {:.4} (commission {:.4}, realized {:.4})",
                        settled.direction(),
                        settled.quantity(),
                        settled.symbol(),
                        settled.fill_price(),
                        settled.commission(),
                        settled.realized_pnl()
                    );
                    self.stats.record_fill();
                }
                None => {
                    debug!("Order for {} at {} went unfilled", signal.symbol(), bar.timestamp());
                    self.stats.record_unfilled_order();
                }
            }
        }

        self.equity_history
            .push((bar.timestamp(), self.portfolio.total_value()));

        Ok(true)
    }

    fn build_result(&self, strategy_name: &str) -> BacktestResult {
        let initial = self.config.initial_capital;
        let equity_curve = calculate_equity_curve(&self.equity_history, initial);
        let fills = self.portfolio.trade_log().to_vec();
        let summary = SummaryMetrics::from_backtest(&equity_curve, &fills, initial);

        BacktestResult {
            strategy_name: strategy_name.to_string(),
            symbol: self.config.symbol.clone(),
            summary,
            equity_curve,
            fills,
            stats: self.stats.snapshot(),
            execution: self.execution.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionConfig, SizingRule};
    use crate::data::InMemoryDataFeed;
    use crate::events::{SignalEvent, SignalType};
    use crate::strategy::ParamSet;
    use chrono::{Duration, NaiveDate, TimeZone};

    //emits a scripted signal type per bar index
    struct Scripted {
        script: Vec<Option<SignalType>>,
        index: usize,
        seen: Vec<DateTime<Utc>>,
        fail_at: Option<usize>,
    }

    impl Scripted {
        fn new(script: Vec<Option<SignalType>>) -> Self {
            Scripted {
                script,
                index: 0,
                seen: Vec::new(),
                fail_at: None,
            }
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn on_bar(&mut self, bar: &BarEvent) -> Result<Vec<SignalEvent>, StrategyError> {
            let index = self.index;
            self.index += 1;
            self.seen.push(bar.timestamp());
            if self.fail_at == Some(index) {
                return Err(StrategyError::Computation("boom".to_string()));
            }
            match self.script.get(index).copied().flatten() {
                Some(kind) => Ok(vec![SignalEvent::new(
                    bar.symbol.clone(),
                    kind,
                    1.0,
                    "scripted",
                    bar.timestamp(),
                )?]),
                None => Ok(Vec::new()),
            }
        }

        fn reset(&mut self) {
            self.index = 0;
            self.seen.clear();
        }

        fn set_parameter(&mut self, name: &str, _value: f64) -> Result<(), StrategyError> {
            Err(StrategyError::UnknownParameter(name.to_string()))
        }

        fn parameters(&self) -> ParamSet {
            ParamSet::new()
        }
    }

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn flat_bar(day: i64, price: f64) -> BarEvent {
        BarEvent::new("ES", ts(day), price, price, price, price, 100.0, None).unwrap()
    }

    fn config() -> BacktestConfig {
        BacktestConfig::new(
            "ES",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            100_000.0,
        )
        .with_execution(ExecutionConfig::frictionless())
        .with_sizing(SizingRule::FixedQuantity { quantity: 10 })
    }

    #[test]
    fn empty_range_is_not_an_error() {
        let mut engine = BacktestEngine::new(config()).unwrap();
        let mut strategy = Scripted::new(vec![]);
        let result = engine
            .run(&mut strategy, &InMemoryDataFeed::default())
            .unwrap();

        assert_eq!(result.summary.total_trades, 0);
        assert_eq!(result.summary.total_return, 0.0);
        assert!(result.equity_curve.is_empty());
    }

    #[test]
    fn round_trip_realizes_price_move() {
        let feed = InMemoryDataFeed::new(vec![
            flat_bar(0, 100.0),
            flat_bar(1, 110.0),
            flat_bar(2, 110.0),
        ]);
        let mut strategy = Scripted::new(vec![Some(SignalType::Buy), Some(SignalType::Close)]);
        let mut engine = BacktestEngine::new(config()).unwrap();

        let result = engine.run(&mut strategy, &feed).unwrap();
        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[1].realized_pnl(), 100.0);
        assert_eq!(result.summary.final_value, 100_100.0);
        assert_eq!(result.summary.win_rate, 1.0);
        assert_eq!(engine.portfolio().cash(), 100_100.0);
    }

    #[test]
    fn invalid_bars_are_skipped_and_counted() {
        let broken = BarEvent::new("ES", ts(1), 100.0, 99.0, 98.0, 101.0, 10.0, None).unwrap();
        let feed = InMemoryDataFeed::new(vec![flat_bar(0, 100.0), broken, flat_bar(2, 100.0)]);
        let mut strategy = Scripted::new(vec![]);
        let mut engine = BacktestEngine::new(config()).unwrap();

        let result = engine.run(&mut strategy, &feed).unwrap();
        assert_eq!(result.stats.bars_rejected, 1);
        assert_eq!(result.stats.bars_processed, 2);
        assert_eq!(strategy.seen, vec![ts(0), ts(2)]);
    }

    #[test]
    fn hold_and_unbacked_exits_produce_no_orders() {
        let feed = InMemoryDataFeed::new((0..3).map(|d| flat_bar(d, 100.0)).collect());
        let mut strategy = Scripted::new(vec![
            Some(SignalType::Hold),
            Some(SignalType::Sell),
            Some(SignalType::Close),
        ]);
        let mut engine = BacktestEngine::new(config()).unwrap();

        let result = engine.run(&mut strategy, &feed).unwrap();
        assert_eq!(result.stats.signals_generated, 3);
        assert_eq!(result.stats.signals_rejected, 1);
        assert_eq!(result.stats.orders_submitted, 0);
        assert_eq!(engine.risk_rejections(), 1);
    }

    #[test]
    fn strategy_error_aborts_run() {
        let feed = InMemoryDataFeed::new((0..3).map(|d| flat_bar(d, 100.0)).collect());
        let mut strategy = Scripted::new(vec![]);
        strategy.fail_at = Some(1);
        let mut engine = BacktestEngine::new(config()).unwrap();

        match engine.run(&mut strategy, &feed) {
            Err(BacktestError::Strategy { timestamp, .. }) => assert_eq!(timestamp, ts(1)),
            other => panic!("expected strategy error, got {:?}", other.map(|r| r.stats)),
        }
    }

    #[test]
    fn unfilled_orders_are_counted() {
        let mut cfg = config();
        cfg.execution.fill_rate = 0.0;
        let feed = InMemoryDataFeed::new(vec![flat_bar(0, 100.0)]);
        let mut strategy = Scripted::new(vec![Some(SignalType::Buy)]);
        let mut engine = BacktestEngine::new(cfg).unwrap();

        let result = engine.run(&mut strategy, &feed).unwrap();
        assert_eq!(result.stats.orders_submitted, 1);
        assert_eq!(result.stats.orders_unfilled, 1);
        assert_eq!(result.execution.rejected, 1);
        assert!(result.fills.is_empty());
    }

    #[test]
    fn repeated_runs_start_fresh() {
        let feed = InMemoryDataFeed::new(vec![flat_bar(0, 100.0), flat_bar(1, 120.0)]);
        let mut engine = BacktestEngine::new(config()).unwrap();

        let mut first = Scripted::new(vec![Some(SignalType::Buy)]);
        let a = engine.run(&mut first, &feed).unwrap();
        let mut second = Scripted::new(vec![Some(SignalType::Buy)]);
        let b = engine.run(&mut second, &feed).unwrap();

        assert_eq!(a.summary, b.summary);
        assert_eq!(b.fills.len(), 1);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = config();
        cfg.initial_capital = -1.0;
        assert!(matches!(
            BacktestEngine::new(cfg),
            Err(BacktestError::Config(_))
        ));
    }
}
