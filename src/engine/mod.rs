pub mod backtest;
pub mod execution;
pub mod stats;

pub use backtest::{BacktestEngine, BacktestError, BacktestResult};
pub use execution::{OrderStatus, SimulatedExecutionEngine};
pub use stats::{EngineStats, EngineStatsSnapshot, ExecutionStats, ExecutionStatsSnapshot};
