//an event-driven strategy backtesting core with parameter search and walk-forward analysis

pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod risk;
pub mod strategy;
pub mod walk_forward;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheManager, CacheRegion, CacheRegionConfig};
    pub use crate::config::{
        BacktestConfig, DataQualityConfig, ExecutionConfig, RunConfiguration, SizingRule,
        StrategyType,
    };
    pub use crate::data::{load_csv, write_csv, CsvDataFeed, DataFeed, InMemoryDataFeed};
    pub use crate::engine::{BacktestEngine, BacktestError, BacktestResult, SimulatedExecutionEngine};
    pub use crate::events::{
        BarEvent, FillEvent, OrderDirection, OrderEvent, OrderType, SignalEvent, SignalType,
    };
    pub use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
    pub use crate::optimizer::{
        OptimizationResult, OptimizerConfig, ParameterDomain, ParameterOptimizer, ParameterSpace,
        ScoringWeights, SearchMethod,
    };
    pub use crate::portfolio::{Portfolio, SimplePortfolio};
    pub use crate::risk::{RiskDecision, RiskLimits, RiskManager};
    pub use crate::strategy::{
        factory_for, ParamSet, RsiReversionStrategy, SmaCrossoverStrategy, Strategy,
        StrategyFactory,
    };
    pub use crate::walk_forward::{WalkForwardAnalyzer, WalkForwardConfig, WalkForwardResult};
}
