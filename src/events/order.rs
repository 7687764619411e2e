use crate::events::header::{EventHeader, EventType};
use crate::events::{require_positive, require_symbol, EventError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//order direction (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    Buy,
    Sell,
}

impl OrderDirection {
    //converts to quantity sign (Buy = +1, Sell = -1)
    pub fn to_qty_sign(self) -> i64 {
        match self {
            OrderDirection::Buy => 1,
            OrderDirection::Sell => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn requires_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

//a sized, directional instruction awaiting execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    header: EventHeader,
    order_id: Uuid,
    symbol: String,
    direction: OrderDirection,
    quantity: u64,
    price: f64,
    order_type: OrderType,
    stop_price: Option<f64>,
    limit_price: Option<f64>,
    time_in_force: TimeInForce,
}

impl OrderEvent {
    //creates a new market order
    pub fn market(
        symbol: impl Into<String>,
        direction: OrderDirection,
        quantity: u64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        Self::build(
            symbol.into(),
            direction,
            quantity,
            price,
            OrderType::Market,
            None,
            None,
            timestamp,
        )
    }

    //creates a new limit order
    pub fn limit(
        symbol: impl Into<String>,
        direction: OrderDirection,
        quantity: u64,
        price: f64,
        limit_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        Self::build(
            symbol.into(),
            direction,
            quantity,
            price,
            OrderType::Limit,
            None,
            Some(limit_price),
            timestamp,
        )
    }

    //creates a new stop order
    pub fn stop(
        symbol: impl Into<String>,
        direction: OrderDirection,
        quantity: u64,
        price: f64,
        stop_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        Self::build(
            symbol.into(),
            direction,
            quantity,
            price,
            OrderType::Stop,
            Some(stop_price),
            None,
            timestamp,
        )
    }

    //general constructor; the order type decides which trigger prices are required
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        symbol: String,
        direction: OrderDirection,
        quantity: u64,
        price: f64,
        order_type: OrderType,
        stop_price: Option<f64>,
        limit_price: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        let symbol = require_symbol(symbol)?;

        if quantity == 0 {
            return Err(EventError::InvalidQuantity(quantity));
        }
        require_positive("price", price)?;

        match limit_price {
            Some(limit) => {
                require_positive("limit price", limit)?;
            }
            None if order_type.requires_limit_price() => {
                return Err(EventError::MissingLimitPrice(order_type));
            }
            None => {}
        }

        match stop_price {
            Some(stop) => {
                require_positive("stop price", stop)?;
            }
            None if order_type.requires_stop_price() => {
                return Err(EventError::MissingStopPrice(order_type));
            }
            None => {}
        }

        Ok(OrderEvent {
            header: EventHeader::new(EventType::Order, timestamp, "portfolio"),
            order_id: Uuid::new_v4(),
            symbol,
            direction,
            quantity,
            price,
            order_type,
            stop_price,
            limit_price,
            time_in_force: TimeInForce::default(),
        })
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp()
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

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn stop_price(&self) -> Option<f64> {
        self.stop_price
    }

    pub fn limit_price(&self) -> Option<f64> {
        self.limit_price
    }

    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    //returns the signed quantity (positive for buy, negative for sell)
    pub fn signed_qty(&self) -> i64 {
        self.quantity as i64 * self.direction.to_qty_sign()
    }
}

impl PartialEq for OrderEvent {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}
