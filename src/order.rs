use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Symbol;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Expired,
    Rejected,
}

/// An order as reported by the exchange.
///
/// Passed through as received, apart from [`Order::backfill_average`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub filled: Decimal,
    pub price: Option<Decimal>,
    pub average: Option<Decimal>,
    /// Raw exchange payload.
    #[serde(default)]
    pub info: serde_json::Value,
}

impl Order {
    /// Closed orders are sometimes reported without an average fill price.
    /// Use the order price in that case.
    pub fn backfill_average(mut self) -> Self {
        if self.status == OrderStatus::Closed && self.average.is_none() {
            if let Some(price) = self.price {
                log::trace!("Order {} has no average, using price {}.", self.id, price);
                self.average = Some(price);
            }
        }
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.to_owned(),
            symbol: Symbol::spot("BTC", "USDT"),
            side: Side::Buy,
            status,
            timestamp: Utc::now(),
            amount: dec!(20),
            filled: dec!(20),
            price: Some(dec!(10000)),
            average: None,
            info: serde_json::Value::Null,
        }
    }

    #[test]
    fn closed_without_average_uses_price() {
        let order = order("123", OrderStatus::Closed).backfill_average();
        assert_eq!(order.average, Some(dec!(10000)));
        assert_eq!(order.price, Some(dec!(10000)));
        assert_eq!(order.filled, dec!(20));
    }

    #[test]
    fn closed_with_average_is_kept() {
        let mut closed = order("123", OrderStatus::Closed);
        closed.average = Some(dec!(9990));
        assert_eq!(closed.backfill_average().average, Some(dec!(9990)));
    }

    #[test]
    fn closed_without_price_stays_empty() {
        let mut closed = order("123", OrderStatus::Closed);
        closed.price = None;
        assert_eq!(closed.backfill_average().average, None);
    }

    #[test]
    fn open_orders_are_untouched() {
        let open = order("123", OrderStatus::Open);
        assert_eq!(open.clone().backfill_average(), open);

        let mut open = order("124", OrderStatus::Open);
        open.average = Some(dec!(10000));
        open.filled = dec!(0);
        let result = open.clone().backfill_average();
        assert_eq!(result.average, Some(dec!(10000)));
        assert_eq!(result.filled, dec!(0));
        assert_eq!(result.status, OrderStatus::Open);
    }
}
