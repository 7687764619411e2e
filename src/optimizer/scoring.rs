use crate::metrics::SummaryMetrics;
use serde::{Deserialize, Serialize};

//weights of the composite objective used to rank parameter sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub return_weight: f64,
    pub sharpe_weight: f64,
    pub drawdown_penalty: f64,
    pub win_rate_bonus: f64,
    pub trade_count_penalty: f64,
    //fewer fills than this are penalized per missing fill
    pub min_trades: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            return_weight: 1.0,
            sharpe_weight: 0.5,
            drawdown_penalty: 0.5,
            win_rate_bonus: 0.2,
            trade_count_penalty: 0.01,
            min_trades: 5,
        }
    }
}

impl ScoringWeights {
    //higher is better; non-finite scores collapse to negative infinity
    pub fn score(&self, summary: &SummaryMetrics) -> f64 {
        let missing_trades = self.min_trades.saturating_sub(summary.total_trades) as f64;

        let score = self.return_weight * summary.total_return
            + self.sharpe_weight * summary.sharpe_ratio
            - self.drawdown_penalty * summary.max_drawdown
            + self.win_rate_bonus * summary.win_rate
            - self.trade_count_penalty * missing_trades;

        if score.is_finite() {
            score
        } else {
            f64::NEG_INFINITY
        }
    }
}
