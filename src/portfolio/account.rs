use crate::config::{BacktestConfig, SizingRule};
use crate::events::{BarEvent, FillEvent, OrderDirection, OrderEvent, SignalEvent, SignalType};
use crate::portfolio::position::Position;
use crate::portfolio::{Portfolio, PortfolioError};
use crate::risk::RiskSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use std::collections::HashMap;

//long-only cash ledger
#[derive(Debug, Clone)]
pub struct SimplePortfolio {
    //initial account balance
    initial_capital: f64,

    //cash after every settled fill
    cash: f64,

    //open positions by symbol
    positions: HashMap<String, Position>,

    //complete trade log
    trade_log: Vec<FillEvent>,

    sizing: SizingRule,

    //worst-case execution cost per unit of price, keeps entries affordable
    cost_buffer: f64,

    //highest total value seen
    peak_value: f64,

    //total value when the current trading day began
    day_start_value: f64,
    current_day: Option<NaiveDate>,

    //closing fills in a row with negative realized pnl
    consecutive_losses: u32,
}

impl SimplePortfolio {
    pub fn new(initial_capital: f64, sizing: SizingRule, cost_buffer: f64) -> Self {
        SimplePortfolio {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            trade_log: Vec::new(),
            sizing,
            cost_buffer: cost_buffer.max(0.0),
            peak_value: initial_capital,
            day_start_value: initial_capital,
            current_day: None,
            consecutive_losses: 0,
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        let slippage = config.execution.slippage;
        let commission = config.execution.commission_rate;
        //price * (1 + s) * (1 + c) per unit on the buy side
        let cost_buffer = slippage + commission + slippage * commission;
        Self::new(config.initial_capital, config.sizing, cost_buffer)
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn trade_log(&self) -> &[FillEvent] {
        &self.trade_log
    }

    pub fn peak_value(&self) -> f64 {
        self.peak_value
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    fn held_quantity(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    //largest quantity the cash can pay for at the given price
    fn affordable_quantity(&self, price: f64) -> u64 {
        let unit_cost = price * (1.0 + self.cost_buffer);
        if unit_cost <= 0.0 || self.cash <= 0.0 {
            return 0;
        }
        (self.cash / unit_cost).floor() as u64
    }

    fn entry_quantity(&self, signal: &SignalEvent, price: f64) -> u64 {
        let affordable = self.affordable_quantity(price);

        let wanted = match (signal.position_size(), self.sizing) {
            (Some(fraction), _) | (None, SizingRule::PercentOfEquity { fraction }) => {
                let budget = self.total_value() * fraction;
                (budget / (price * (1.0 + self.cost_buffer))).floor() as u64
            }
            (None, SizingRule::FixedQuantity { quantity }) => quantity,
        };

        wanted.min(affordable)
    }

    fn exit_quantity(&self, signal: &SignalEvent) -> u64 {
        let held = self.held_quantity(signal.symbol());
        match (signal.signal_type(), signal.position_size()) {
            (SignalType::Sell, Some(fraction)) => {
                ((held as f64 * fraction).ceil() as u64).min(held)
            }
            _ => held,
        }
    }

    fn update_peak(&mut self) {
        let value = self.total_value();
        if value > self.peak_value {
            self.peak_value = value;
        }
    }
}

impl Portfolio for SimplePortfolio {
    fn process_signal(
        &mut self,
        signal: &SignalEvent,
        bar: &BarEvent,
    ) -> Result<Option<OrderEvent>, PortfolioError> {
        if signal.symbol() != bar.symbol {
            return Err(PortfolioError::SymbolMismatch {
                signal: signal.symbol().to_string(),
                bar: bar.symbol.clone(),
            });
        }

        let (direction, quantity) = match signal.signal_type() {
            SignalType::Hold => return Ok(None),
            SignalType::Buy => (OrderDirection::Buy, self.entry_quantity(signal, bar.close)),
            SignalType::Sell | SignalType::Close => {
                (OrderDirection::Sell, self.exit_quantity(signal))
            }
        };

        if quantity == 0 {
            debug!(
                "No quantity for {:?} signal on {} at {}",
                signal.signal_type(),
                signal.symbol(),
                bar.timestamp()
            );
            return Ok(None);
        }

        let order = OrderEvent::market(
            signal.symbol(),
            direction,
            quantity,
            bar.close,
            bar.timestamp(),
        )?;

        Ok(Some(order))
    }

    fn process_fill(&mut self, fill: FillEvent) -> Result<FillEvent, PortfolioError> {
        let symbol = fill.symbol().to_string();
        let quantity = fill.quantity();

        let realized_pnl = match fill.direction() {
            OrderDirection::Buy => {
                self.positions
                    .entry(symbol.clone())
                    .or_insert_with(|| Position::new(symbol.clone()))
                    .add(quantity, fill.fill_price(), fill.commission());
                0.0
            }
            OrderDirection::Sell => {
                let held = self.held_quantity(&symbol);
                let position = match self.positions.get_mut(&symbol) {
                    Some(position) if held >= quantity => position,
                    _ => {
                        return Err(PortfolioError::InsufficientPosition {
                            symbol,
                            held,
                            requested: quantity,
                        })
                    }
                };

                let realized = position.reduce(quantity, fill.fill_price(), fill.commission());
                if realized < 0.0 {
                    self.consecutive_losses += 1;
                } else {
                    self.consecutive_losses = 0;
                }
                realized
            }
        };

        self.cash += fill.cash_delta();
        self.update_peak();

        let settled = fill.settled(realized_pnl);
        self.trade_log.push(settled.clone());
        Ok(settled)
    }

    fn mark_to_market(&mut self, bar: &BarEvent) {
        let day = bar.timestamp().date_naive();
        if self.current_day != Some(day) {
            //value carried over from the previous close
            self.day_start_value = self.total_value();
            self.current_day = Some(day);
        }

        if let Some(position) = self.positions.get_mut(&bar.symbol) {
            position.mark(bar.close);
        }

        self.update_peak();
    }

    fn total_value(&self) -> f64 {
        self.cash + self.positions.values().map(Position::market_value).sum::<f64>()
    }

    fn cash(&self) -> f64 {
        self.cash
    }

    fn has_position(&self, symbol: &str) -> bool {
        self.held_quantity(symbol) > 0
    }

    fn risk_snapshot(&self, symbol: &str, at: DateTime<Utc>) -> RiskSnapshot {
        RiskSnapshot {
            timestamp: at,
            total_value: self.total_value(),
            cash: self.cash,
            position_value: self.positions.get(symbol).map_or(0.0, Position::market_value),
            peak_value: self.peak_value,
            day_start_value: self.day_start_value,
            consecutive_losses: self.consecutive_losses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SignalEnhancement;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(day: u32, close: f64) -> BarEvent {
        BarEvent::new("ES", ts(day), close, close, close, close, 100.0, None).unwrap()
    }

    fn signal(signal_type: SignalType, day: u32) -> SignalEvent {
        SignalEvent::new("ES", signal_type, 1.0, "test", ts(day)).unwrap()
    }

    fn fill_for(order: &OrderEvent, price: f64, commission: f64) -> FillEvent {
        FillEvent::from_order(order, price, commission, order.timestamp()).unwrap()
    }

    #[test]
    fn fixed_quantity_buy_order() {
        let mut portfolio =
            SimplePortfolio::new(100_000.0, SizingRule::FixedQuantity { quantity: 10 }, 0.0);
        let order = portfolio
            .process_signal(&signal(SignalType::Buy, 2), &bar(2, 100.0))
            .unwrap()
            .unwrap();

        assert_eq!(order.direction(), OrderDirection::Buy);
        assert_eq!(order.quantity(), 10);
        assert_eq!(order.price(), 100.0);
    }

    #[test]
    fn percent_sizing_and_signal_override() {
        let mut portfolio =
            SimplePortfolio::new(10_000.0, SizingRule::PercentOfEquity { fraction: 0.5 }, 0.0);
        let order = portfolio
            .process_signal(&signal(SignalType::Buy, 2), &bar(2, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(order.quantity(), 50);

        let sized = signal(SignalType::Buy, 2)
            .with_enhancement(SignalEnhancement {
                position_size: Some(0.1),
                ..Default::default()
            })
            .unwrap();
        let order = portfolio.process_signal(&sized, &bar(2, 100.0)).unwrap().unwrap();
        assert_eq!(order.quantity(), 10);
    }

    #[test]
    fn entries_are_capped_by_cash() {
        let mut portfolio =
            SimplePortfolio::new(1_000.0, SizingRule::FixedQuantity { quantity: 50 }, 0.01);
        let order = portfolio
            .process_signal(&signal(SignalType::Buy, 2), &bar(2, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(order.quantity(), 9);
    }

    #[test]
    fn exits_without_position_produce_nothing() {
        let mut portfolio = SimplePortfolio::new(1_000.0, SizingRule::default(), 0.0);
        for kind in [SignalType::Sell, SignalType::Close, SignalType::Hold] {
            assert!(portfolio
                .process_signal(&signal(kind, 2), &bar(2, 100.0))
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn rejects_signal_for_other_symbol() {
        let mut portfolio = SimplePortfolio::new(1_000.0, SizingRule::default(), 0.0);
        let other = SignalEvent::new("NQ", SignalType::Buy, 1.0, "test", ts(2)).unwrap();
        assert!(matches!(
            portfolio.process_signal(&other, &bar(2, 100.0)),
            Err(PortfolioError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn round_trip_conserves_cash_and_stamps_pnl() {
        let mut portfolio =
            SimplePortfolio::new(10_000.0, SizingRule::FixedQuantity { quantity: 10 }, 0.0);

        let buy = portfolio
            .process_signal(&signal(SignalType::Buy, 2), &bar(2, 100.0))
            .unwrap()
            .unwrap();
        portfolio.process_fill(fill_for(&buy, 100.0, 1.0)).unwrap();
        assert!((portfolio.cash() - (10_000.0 - 1_001.0)).abs() < 1e-9);
        assert!(portfolio.has_position("ES"));

        portfolio.mark_to_market(&bar(3, 90.0));
        let sell = portfolio
            .process_signal(&signal(SignalType::Close, 3), &bar(3, 90.0))
            .unwrap()
            .unwrap();
        assert_eq!(sell.quantity(), 10);

        let settled = portfolio.process_fill(fill_for(&sell, 90.0, 1.0)).unwrap();
        //(90 - 100.1) * 10 - 1
        assert!((settled.realized_pnl() + 102.0).abs() < 1e-9);
        assert!((portfolio.cash() - (10_000.0 - 1_001.0 + 899.0)).abs() < 1e-9);
        assert_eq!(portfolio.consecutive_losses(), 1);
        assert!(!portfolio.has_position("ES"));
        assert_eq!(portfolio.trade_log().len(), 2);
    }

    #[test]
    fn overselling_is_an_error() {
        let mut portfolio = SimplePortfolio::new(10_000.0, SizingRule::default(), 0.0);
        let order = OrderEvent::market("ES", OrderDirection::Sell, 5, 100.0, ts(2)).unwrap();
        assert!(matches!(
            portfolio.process_fill(fill_for(&order, 100.0, 0.0)),
            Err(PortfolioError::InsufficientPosition { held: 0, requested: 5, .. })
        ));
        assert_eq!(portfolio.cash(), 10_000.0);
    }

    #[test]
    fn tracks_peak_and_day_start() {
        let mut portfolio =
            SimplePortfolio::new(10_000.0, SizingRule::FixedQuantity { quantity: 10 }, 0.0);
        portfolio.mark_to_market(&bar(2, 100.0));
        let buy = portfolio
            .process_signal(&signal(SignalType::Buy, 2), &bar(2, 100.0))
            .unwrap()
            .unwrap();
        portfolio.process_fill(fill_for(&buy, 100.0, 0.0)).unwrap();

        portfolio.mark_to_market(&bar(3, 150.0));
        assert_eq!(portfolio.peak_value(), 10_500.0);

        portfolio.mark_to_market(&bar(4, 120.0));
        let snapshot = portfolio.risk_snapshot("ES", ts(4));
        assert_eq!(snapshot.day_start_value, 10_500.0);
        assert_eq!(snapshot.total_value, 10_200.0);
        assert_eq!(snapshot.position_value, 1_200.0);
        assert!((snapshot.drawdown() - 300.0 / 10_500.0).abs() < 1e-12);
    }
}
