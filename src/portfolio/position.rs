use serde::{Deserialize, Serialize};

//long holding in one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,

    //shares held; 0 when flat
    pub quantity: u64,

    //cost per share including buy commissions
    pub avg_cost: f64,

    //last price the position was marked at
    pub last_price: f64,

    //realized pnl from closed quantity
    pub realized_pnl: f64,
}

impl Position {
    //creates a new flat position
    pub fn new(symbol: impl Into<String>) -> Self {
        Position {
            symbol: symbol.into(),
            quantity: 0,
            avg_cost: 0.0,
            last_price: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.last_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        (self.last_price - self.avg_cost) * self.quantity as f64
    }

    pub fn mark(&mut self, price: f64) {
        self.last_price = price;
    }

    //adds to the holding, folding the commission into the average cost
    pub fn add(&mut self, quantity: u64, price: f64, commission: f64) {
        let total_qty = self.quantity + quantity;
        let total_cost = self.avg_cost * self.quantity as f64 + price * quantity as f64 + commission;
        self.avg_cost = total_cost / total_qty as f64;
        self.quantity = total_qty;
        self.last_price = price;
    }

    //removes quantity and returns the realized pnl net of the sell commission
    //caller guarantees quantity <= self.quantity
    pub fn reduce(&mut self, quantity: u64, price: f64, commission: f64) -> f64 {
        let closed = quantity.min(self.quantity);
        let realized = (price - self.avg_cost) * closed as f64 - commission;

        self.quantity -= closed;
        self.realized_pnl += realized;
        self.last_price = price;

        if self.quantity == 0 {
            self.avg_cost = 0.0;
        }

        realized
    }
}
