use crate::events::header::{EventHeader, EventType};
use crate::events::order::{OrderDirection, OrderEvent};
use crate::events::{require_positive, EventError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillType {
    Full,
    Partial,
}

//realized outcome of executing an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    header: EventHeader,
    execution_id: Uuid,
    order_id: Uuid,
    symbol: String,
    direction: OrderDirection,
    quantity: u64,
    fill_price: f64,
    commission: f64,
    fill_type: FillType,
    realized_pnl: f64,
}

impl FillEvent {
    //fills the whole order quantity
    pub fn from_order(
        order: &OrderEvent,
        fill_price: f64,
        commission: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        Self::build(order, order.quantity(), fill_price, commission, timestamp)
    }

    //fills part of the order quantity
    pub fn partial(
        order: &OrderEvent,
        quantity: u64,
        fill_price: f64,
        commission: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        Self::build(order, quantity, fill_price, commission, timestamp)
    }

    fn build(
        order: &OrderEvent,
        quantity: u64,
        fill_price: f64,
        commission: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        if quantity == 0 {
            return Err(EventError::InvalidQuantity(quantity));
        }
        require_positive("fill price", fill_price)?;
        if commission.is_nan() || commission < 0.0 {
            return Err(EventError::NegativeCommission(commission));
        }

        let fill_type = if quantity >= order.quantity() {
            FillType::Full
        } else {
            FillType::Partial
        };

        Ok(FillEvent {
            header: EventHeader::new(EventType::Fill, timestamp, "execution"),
            execution_id: Uuid::new_v4(),
            order_id: order.order_id(),
            symbol: order.symbol().to_string(),
            direction: order.direction(),
            quantity: quantity.min(order.quantity()),
            fill_price,
            commission,
            fill_type,
            realized_pnl: 0.0,
        })
    }

    //records the realized pnl computed by the ledger that settled this fill
    pub fn settled(mut self, realized_pnl: f64) -> Self {
        self.realized_pnl = realized_pnl;
        self
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp()
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn fill_price(&self) -> f64 {
        self.fill_price
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn fill_type(&self) -> FillType {
        self.fill_type
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    //returns the notional value of the fill
    pub fn notional_value(&self) -> f64 {
        self.fill_price * self.quantity as f64
    }

    //signed change in cash this fill causes
    pub fn cash_delta(&self) -> f64 {
        match self.direction {
            OrderDirection::Buy => -(self.notional_value() + self.commission),
            OrderDirection::Sell => self.notional_value() - self.commission,
        }
    }
}

impl PartialEq for FillEvent {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}
