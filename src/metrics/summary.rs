use crate::events::{FillEvent, OrderDirection};
use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

const TRADING_DAYS: f64 = 252.0;

//summary metrics for a backtest; returns and ratios are fractions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    //compound annual growth rate
    #[serde(with = "crate::metrics::float_serde")]
    pub annual_return: f64,
    pub max_drawdown: f64,
    #[serde(with = "crate::metrics::float_serde")]
    pub sharpe_ratio: f64,
    #[serde(with = "crate::metrics::float_serde")]
    pub sortino_ratio: f64,
    //every fill, entries and exits
    pub total_trades: usize,
    //exit fills that realized pnl
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    #[serde(with = "crate::metrics::float_serde")]
    pub profit_factor: f64,
    pub total_commission: f64,
    //share of equity samples with an open position
    pub exposure: f64,
}

impl SummaryMetrics {
    //summary for a run that never traded
    pub fn flat(initial_capital: f64) -> Self {
        Self::from_backtest(&[], &[], initial_capital)
    }

    //calculate summary metrics from equity curve and settled fills
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        fills: &[FillEvent],
        initial_capital: f64,
    ) -> Self {
        let final_value = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };

        let annual_return = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if initial_capital > 0.0 => {
                let years = (last.timestamp - first.timestamp).num_days() as f64 / 365.25;
                if years <= 0.0 {
                    0.0
                } else if final_value <= 0.0 {
                    -1.0
                } else {
                    (final_value / initial_capital).powf(1.0 / years) - 1.0
                }
            }
            _ => 0.0,
        };

        let mut equity_values = Vec::with_capacity(equity_curve.len() + 1);
        equity_values.push(initial_capital);
        equity_values.extend(equity_curve.iter().map(|p| p.equity));
        let returns = calculate_returns(&equity_values);

        let trades = TradeStats::from_fills(fills);

        SummaryMetrics {
            initial_capital,
            final_value,
            total_return,
            annual_return,
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: calculate_sharpe_ratio(&returns),
            sortino_ratio: calculate_sortino_ratio(&returns),
            total_trades: fills.len(),
            closed_trades: trades.closed,
            winning_trades: trades.winning,
            losing_trades: trades.losing,
            win_rate: trades.win_rate,
            avg_win: trades.avg_win,
            avg_loss: trades.avg_loss,
            largest_win: trades.largest_win,
            largest_loss: trades.largest_loss,
            profit_factor: trades.profit_factor,
            total_commission: fills.iter().map(FillEvent::commission).sum(),
            exposure: calculate_exposure(equity_curve, fills),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let rows = [
            ("Initial Capital", format!("${:.2}", self.initial_capital)),
            ("Final Value", format!("${:.2}", self.final_value)),
            ("Total Return", format!("{:.2}%", self.total_return * 100.0)),
            ("Annual Return", format!("{:.2}%", self.annual_return * 100.0)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Fills", format!("{}", self.total_trades)),
            ("Closed Trades", format!("{}", self.closed_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Commission", format!("${:.2}", self.total_commission)),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
        for (name, value) in rows.iter() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
        }
        table.printstd();
    }
}

#[derive(Default)]
struct TradeStats {
    closed: usize,
    winning: usize,
    losing: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

impl TradeStats {
    //exit fills carry the realized pnl stamped by the ledger
    fn from_fills(fills: &[FillEvent]) -> Self {
        let closed: Vec<f64> = fills
            .iter()
            .filter(|f| f.direction() == OrderDirection::Sell)
            .map(FillEvent::realized_pnl)
            .collect();

        if closed.is_empty() {
            return TradeStats::default();
        }

        let wins: Vec<f64> = closed.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = closed.iter().copied().filter(|&p| p < 0.0).collect();

        let total_wins: f64 = wins.iter().sum();
        let total_losses: f64 = losses.iter().sum::<f64>().abs();

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        TradeStats {
            closed: closed.len(),
            winning: wins.len(),
            losing: losses.len(),
            win_rate: wins.len() as f64 / closed.len() as f64,
            avg_win: if wins.is_empty() {
                0.0
            } else {
                total_wins / wins.len() as f64
            },
            avg_loss: if losses.is_empty() {
                0.0
            } else {
                -total_losses / losses.len() as f64
            },
            profit_factor,
            largest_win: wins.iter().fold(0.0f64, |a, &b| a.max(b)),
            largest_loss: losses.iter().fold(0.0f64, |a, &b| a.min(b)),
        }
    }
}

//annualized assuming daily bars
fn calculate_sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }

    (mean / std_dev) * TRADING_DAYS.sqrt()
}

fn calculate_sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let negative_returns: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

    if negative_returns.is_empty() {
        return if mean > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_dev = negative_returns.std_dev();
    if !downside_dev.is_finite() || downside_dev == 0.0 {
        return 0.0;
    }

    (mean / downside_dev) * TRADING_DAYS.sqrt()
}

fn calculate_exposure(equity_curve: &[EquityPoint], fills: &[FillEvent]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }

    let mut in_market = 0usize;
    let mut held = 0i64;
    let mut next_fill = 0;

    for point in equity_curve {
        while next_fill < fills.len() && fills[next_fill].timestamp() <= point.timestamp {
            let fill = &fills[next_fill];
            held += fill.quantity() as i64 * fill.direction().to_qty_sign();
            next_fill += 1;
        }
        if held != 0 {
            in_market += 1;
        }
    }

    in_market as f64 / equity_curve.len() as f64
}
