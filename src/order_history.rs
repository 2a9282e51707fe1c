use crate::{
    apis::Api,
    pager::{Pager, WindowEnd},
    ApiError, Clock, Order, Symbol,
};

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Widest order query window the exchange accepts, minus a minute so the
/// window edges are never rejected.
pub fn default_order_window() -> Duration {
    Duration::days(7) - Duration::minutes(1)
}

/// Retrieves orders over ranges wider than one exchange query allows.
pub struct OrderHistory<A>
where
    A: Api,
{
    api: Arc<A>,
    pager: Pager,
    clock: Arc<dyn Clock>,
    live_end: bool,
}

impl<A> OrderHistory<A>
where
    A: Api,
{
    /// With `live_end` the range keeps extending to the current time while
    /// windows are fetched. Otherwise it ends at the time of the call.
    pub fn new(api: Arc<A>, window: Duration, clock: Arc<dyn Clock>, live_end: bool) -> Self {
        OrderHistory {
            api,
            pager: Pager::new(window),
            clock,
            live_end,
        }
    }

    /// All orders of `market` created from `since` until now.
    pub async fn fetch_orders(
        &self,
        market: Symbol,
        since: DateTime<Utc>,
    ) -> Result<Vec<Order>, ApiError> {
        let end = if self.live_end {
            WindowEnd::Now(&*self.clock)
        } else {
            WindowEnd::At(self.clock.now())
        };

        let orders = self
            .pager
            .page(since, end, |window| {
                self.api
                    .fetch_orders_window(market, window.start, window.end)
            })
            .await?;
        log::debug!("Fetched {} orders for {} since {}.", orders.len(), market, since);

        Ok(orders.into_iter().map(Order::backfill_average).collect())
    }

    pub async fn fetch_order(&self, id: &str, market: Symbol) -> Result<Order, ApiError> {
        self.api
            .fetch_order(id, market)
            .await
            .map(Order::backfill_average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        apis::{Call, Mock},
        order::tests::order,
        ManualClock, OrderStatus,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 20, 0).unwrap()
    }

    fn history(mock: Mock, live_end: bool) -> (OrderHistory<Mock>, Arc<Mock>) {
        let api = Arc::new(mock);
        let history = OrderHistory::new(
            api.clone(),
            default_order_window(),
            Arc::new(ManualClock::new(now())),
            live_end,
        );
        (history, api)
    }

    fn two_orders() -> Mock {
        Mock::new().with_orders(|_, _, _| {
            Ok(vec![
                order("buy", OrderStatus::Closed),
                order("sell", OrderStatus::Open),
            ])
        })
    }

    #[tokio::test]
    async fn twenty_days_take_three_windows() {
        for live_end in [false, true] {
            let (history, api) = history(two_orders(), live_end);
            let since = now() - Duration::days(20);

            let orders = history
                .fetch_orders(Symbol::spot("BTC", "USDT"), since)
                .await
                .unwrap();

            assert_eq!(orders.len(), 2 * 3);
            let calls = api.calls();
            assert_eq!(calls.len(), 3);
            let window = default_order_window();
            assert_eq!(
                calls,
                vec![
                    Call::OrdersWindow {
                        market: Symbol::spot("BTC", "USDT"),
                        since,
                        until: since + window,
                    },
                    Call::OrdersWindow {
                        market: Symbol::spot("BTC", "USDT"),
                        since: since + window,
                        until: since + window * 2,
                    },
                    Call::OrdersWindow {
                        market: Symbol::spot("BTC", "USDT"),
                        since: since + window * 2,
                        until: now(),
                    },
                ]
            );
        }
    }

    #[tokio::test]
    async fn since_in_the_future_makes_no_calls() {
        let (history, api) = history(two_orders(), false);
        let orders = history
            .fetch_orders(Symbol::spot("BTC", "USDT"), now())
            .await
            .unwrap();
        assert!(orders.is_empty());
        assert!(api.calls().is_empty());

        let orders = history
            .fetch_orders(Symbol::spot("BTC", "USDT"), now() + Duration::days(1))
            .await
            .unwrap();
        assert!(orders.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn closed_orders_get_an_average() {
        let (history, _) = history(two_orders(), false);
        let orders = history
            .fetch_orders(Symbol::spot("BTC", "USDT"), now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(orders[0].average, Some(dec!(10000)));
        assert_eq!(orders[1].average, None);
    }

    #[tokio::test]
    async fn failed_window_aborts_the_fetch() {
        let mock = Mock::new().with_orders(|_, since, _| {
            if since > now() - Duration::days(15) {
                Err(ApiError::Network("connection reset".to_owned()))
            } else {
                Ok(vec![order("buy", OrderStatus::Closed)])
            }
        });
        let (history, api) = history(mock, false);

        let result = history
            .fetch_orders(Symbol::spot("BTC", "USDT"), now() - Duration::days(20))
            .await;

        assert_eq!(
            result,
            Err(ApiError::Network("connection reset".to_owned()))
        );
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn single_order_is_backfilled() {
        let mock = Mock::new().with_order(|id, _| Ok(order(id, OrderStatus::Closed)));
        let (history, _) = history(mock, false);
        let order = history
            .fetch_order("123", Symbol::spot("BTC", "USDT"))
            .await
            .unwrap();
        assert_eq!(order.id, "123");
        assert_eq!(order.average, Some(dec!(10000)));
        assert_eq!(order.status, OrderStatus::Closed);
    }
}
