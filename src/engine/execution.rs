use crate::config::ExecutionConfig;
use crate::engine::stats::{ExecutionStats, ExecutionStatsSnapshot};
use crate::events::{EventError, FillEvent, OrderDirection, OrderEvent, OrderType};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::thread;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    //submitted, not yet executed or cancelled
    Active,
    Filled,
    //never seen, cancelled, or lost the fill-rate draw
    Unknown,
}

//fills orders immediately at the order price, adjusted for slippage and commission
pub struct SimulatedExecutionEngine {
    config: ExecutionConfig,
    rng: StdRng,
    active_orders: HashMap<Uuid, OrderEvent>,
    filled_orders: HashSet<Uuid>,
    stats: ExecutionStats,
}

impl SimulatedExecutionEngine {
    pub fn new(config: ExecutionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        SimulatedExecutionEngine {
            config,
            rng,
            active_orders: HashMap::new(),
            filled_orders: HashSet::new(),
            stats: ExecutionStats::default(),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    //registers an order as active without executing it
    pub fn submit(&mut self, order: OrderEvent) -> Uuid {
        let id = order.order_id();
        self.active_orders.insert(id, order);
        self.stats.record_submitted();
        id
    }

    //submits and immediately executes an order; None when the fill-rate draw misses
    pub fn execute(&mut self, order: OrderEvent) -> Result<Option<FillEvent>, EventError> {
        let id = self.submit(order);
        self.execute_active(id)
    }

    //executes a previously submitted order
    pub fn execute_active(&mut self, order_id: Uuid) -> Result<Option<FillEvent>, EventError> {
        let Some(order) = self.active_orders.remove(&order_id) else {
            return Ok(None);
        };

        let latency = self.config.latency();
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let draw: f64 = self.rng.gen();
        if draw >= self.config.fill_rate {
            self.stats.record_rejected();
            debug!(
                "Order {} for {} {} not filled (draw {:.4} >= fill rate {:.4})",
                order_id,
                order.quantity(),
                order.symbol(),
                draw,
                self.config.fill_rate
            );
            return Ok(None);
        }

        let execution_price = self.execution_price(&order);
        let commission = execution_price * order.quantity() as f64 * self.config.commission_rate;
        let fill = FillEvent::from_order(&order, execution_price, commission, order.timestamp())?;

        self.filled_orders.insert(order_id);
        self.stats.record_filled();
        Ok(Some(fill))
    }

    //reference price moved against the order by the slippage fraction
    //stop orders trigger at their stop price; a limit price caps the result
    fn execution_price(&self, order: &OrderEvent) -> f64 {
        let base = match order.order_type() {
            OrderType::Stop | OrderType::StopLimit => order.stop_price().unwrap_or(order.price()),
            OrderType::Market | OrderType::Limit => order.price(),
        };

        let slipped = match order.direction() {
            OrderDirection::Buy => base * (1.0 + self.config.slippage),
            OrderDirection::Sell => base * (1.0 - self.config.slippage),
        };

        match (order.direction(), order.limit_price()) {
            (OrderDirection::Buy, Some(limit)) => slipped.min(limit),
            (OrderDirection::Sell, Some(limit)) => slipped.max(limit),
            (_, None) => slipped,
        }
    }

    //removes an active order; false if it was not active
    pub fn cancel_order(&mut self, order_id: Uuid) -> bool {
        let cancelled = self.active_orders.remove(&order_id).is_some();
        if cancelled {
            self.stats.record_cancelled();
        }
        cancelled
    }

    pub fn cancel_all_orders(&mut self) -> usize {
        let count = self.active_orders.len();
        for _ in 0..count {
            self.stats.record_cancelled();
        }
        self.active_orders.clear();
        count
    }

    pub fn order_status(&self, order_id: Uuid) -> OrderStatus {
        if self.active_orders.contains_key(&order_id) {
            OrderStatus::Active
        } else if self.filled_orders.contains(&order_id) {
            OrderStatus::Filled
        } else {
            OrderStatus::Unknown
        }
    }

    pub fn active_order_count(&self) -> usize {
        self.active_orders.len()
    }

    pub fn stats(&self) -> ExecutionStatsSnapshot {
        self.stats.snapshot()
    }
}
