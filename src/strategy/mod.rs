pub mod rsi_reversion;
pub mod sma_crossover;
pub mod support;

pub use rsi_reversion::RsiReversionStrategy;
pub use sma_crossover::SmaCrossoverStrategy;
pub use support::{cached_indicator, ParameterStore, PriceHistory};

use crate::cache::CacheRegion;
use crate::config::StrategyType;
use crate::events::{BarEvent, EventError, SignalEvent};
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

//named numeric parameters, in declaration order
pub type ParamSet = IndexMap<String, f64>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Invalid value {value} for parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("Strategy computation failed: {0}")]
    Computation(String),
    #[error("Failed to build signal: {0}")]
    Signal(#[from] EventError),
}

//strategy interface that all strategies must implement
pub trait Strategy: Send {
    //returns the strategy name
    fn name(&self) -> &str;

    //called once before the first bar of a run
    fn initialize(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }

    //called on each bar that passed the engine's gate
    fn on_bar(&mut self, bar: &BarEvent) -> Result<Vec<SignalEvent>, StrategyError>;

    //drops accumulated state so the instance can start another run
    fn reset(&mut self);

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), StrategyError>;

    fn parameters(&self) -> ParamSet;
}

//builds fresh strategy instances for independent runs
pub trait StrategyFactory: Send + Sync {
    fn create(&self, parameters: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError>;
}

impl<F> StrategyFactory for F
where
    F: Fn(&ParamSet) -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync,
{
    fn create(&self, parameters: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        self(parameters)
    }
}

//factory for one of the bundled strategies
pub fn factory_for(
    kind: StrategyType,
    symbol: impl Into<String>,
    cache: Option<Arc<CacheRegion>>,
) -> Box<dyn StrategyFactory> {
    let symbol = symbol.into();
    match kind {
        StrategyType::SmaCrossover => Box::new(move |params: &ParamSet| {
            let strategy =
                SmaCrossoverStrategy::from_parameters(symbol.clone(), params, cache.clone())?;
            Ok(Box::new(strategy) as Box<dyn Strategy>)
        }),
        StrategyType::RsiReversion => Box::new(move |params: &ParamSet| {
            let strategy =
                RsiReversionStrategy::from_parameters(symbol.clone(), params, cache.clone())?;
            Ok(Box::new(strategy) as Box<dyn Strategy>)
        }),
    }
}

//simple moving average of the whole slice
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

//relative strength index over the last `period` changes
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let window = &prices[prices.len() - (period + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gain, loss), change| {
            if change > 0.0 {
                (gain + change, loss)
            } else {
                (gain, loss - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
