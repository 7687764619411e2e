use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

//running counters for one engine run
#[derive(Debug, Default)]
pub struct EngineStats {
    bars_received: AtomicU64,
    bars_rejected: AtomicU64,
    bars_flagged: AtomicU64,
    signals_generated: AtomicU64,
    signals_rejected: AtomicU64,
    orders_submitted: AtomicU64,
    orders_unfilled: AtomicU64,
    fills: AtomicU64,
}

impl EngineStats {
    pub fn record_bar(&self) {
        bump(&self.bars_received);
    }

    pub fn record_rejected_bar(&self) {
        bump(&self.bars_rejected);
    }

    pub fn record_flagged_bar(&self) {
        bump(&self.bars_flagged);
    }

    pub fn record_signal(&self) {
        bump(&self.signals_generated);
    }

    pub fn record_rejected_signal(&self) {
        bump(&self.signals_rejected);
    }

    pub fn record_order(&self) {
        bump(&self.orders_submitted);
    }

    pub fn record_unfilled_order(&self) {
        bump(&self.orders_unfilled);
    }

    pub fn record_fill(&self) {
        bump(&self.fills);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let received = self.bars_received.load(Ordering::Relaxed);
        let rejected = self.bars_rejected.load(Ordering::Relaxed);
        EngineStatsSnapshot {
            bars_processed: received - rejected,
            bars_rejected: rejected,
            bars_flagged: self.bars_flagged.load(Ordering::Relaxed),
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
            signals_rejected: self.signals_rejected.load(Ordering::Relaxed),
            orders_submitted: self.orders_submitted.load(Ordering::Relaxed),
            orders_unfilled: self.orders_unfilled.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatsSnapshot {
    //bars that passed the gate and reached the strategy
    pub bars_processed: u64,
    pub bars_rejected: u64,
    //processed despite a data-quality warning
    pub bars_flagged: u64,
    pub signals_generated: u64,
    pub signals_rejected: u64,
    pub orders_submitted: u64,
    pub orders_unfilled: u64,
    pub fills: u64,
}

//counters kept by the simulated execution engine
#[derive(Debug, Default)]
pub struct ExecutionStats {
    submitted: AtomicU64,
    filled: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
}

impl ExecutionStats {
    pub fn record_submitted(&self) {
        bump(&self.submitted);
    }

    pub fn record_filled(&self) {
        bump(&self.filled);
    }

    pub fn record_rejected(&self) {
        bump(&self.rejected);
    }

    pub fn record_cancelled(&self) {
        bump(&self.cancelled);
    }

    pub fn snapshot(&self) -> ExecutionStatsSnapshot {
        ExecutionStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            filled: self.filled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatsSnapshot {
    pub submitted: u64,
    pub filled: u64,
    //orders that lost the fill-rate draw
    pub rejected: u64,
    pub cancelled: u64,
}
