use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    //fraction below the running peak
    pub drawdown: f64,
    //change from the previous point
    pub returns: f64,
}

//builds the equity curve with running drawdown from (timestamp, total value) samples
pub fn calculate_equity_curve(
    history: &[(DateTime<Utc>, f64)],
    initial_capital: f64,
) -> Vec<EquityPoint> {
    let mut peak = initial_capital;
    let mut prev_equity = initial_capital;

    history
        .iter()
        .map(|&(timestamp, equity)| {
            peak = peak.max(equity);

            let drawdown = if peak > 0.0 {
                (peak - equity) / peak
            } else {
                0.0
            };

            let returns = if prev_equity != 0.0 {
                (equity - prev_equity) / prev_equity
            } else {
                0.0
            };
            prev_equity = equity;

            EquityPoint {
                timestamp,
                equity,
                drawdown,
                returns,
            }
        })
        .collect()
}

//largest peak-to-trough decline as a fraction
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

//period returns between consecutive equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}
