pub mod account;
pub mod position;

pub use account::SimplePortfolio;
pub use position::Position;

use crate::events::{BarEvent, EventError, FillEvent, OrderEvent, SignalEvent};
use crate::risk::RiskSnapshot;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Signal for {signal} delivered with a bar for {bar}")]
    SymbolMismatch { signal: String, bar: String },
    #[error("Cannot sell {requested} {symbol}: only {held} held")]
    InsufficientPosition {
        symbol: String,
        held: u64,
        requested: u64,
    },
    #[error("Failed to build order: {0}")]
    Event(#[from] EventError),
}

//ledger the engine drives: sizes accepted signals, settles fills, reports value
pub trait Portfolio {
    //turns an accepted signal into an order, or None when there is nothing to trade
    fn process_signal(
        &mut self,
        signal: &SignalEvent,
        bar: &BarEvent,
    ) -> Result<Option<OrderEvent>, PortfolioError>;

    //applies a fill to cash and positions, returning it with realized pnl stamped
    fn process_fill(&mut self, fill: FillEvent) -> Result<FillEvent, PortfolioError>;

    //revalues holdings at the bar's close
    fn mark_to_market(&mut self, bar: &BarEvent);

    fn total_value(&self) -> f64;

    fn cash(&self) -> f64;

    fn has_position(&self, symbol: &str) -> bool;

    fn risk_snapshot(&self, symbol: &str, at: DateTime<Utc>) -> RiskSnapshot;
}
