//! Matching correctness properties
//!
//! For arbitrary order streams: a limit buy never trades above its limit,
//! a limit sell never below, execution prices always come from the
//! resting side (so a taker's fills sweep monotonically through the
//! book), and quantity is conserved between trades and remainder.

use matching_engine::{BookOrder, OrderBook};
use proptest::prelude::*;
use rust_decimal::Decimal;
use types::ids::{OrderId, Symbol, UserId};
use types::numeric::{Price, Quantity};
use types::order::{OrderType, Side};

#[derive(Debug, Clone)]
struct OrderSpec {
    side: Side,
    price: Option<u64>,
    quantity: u64,
}

fn order_spec() -> impl Strategy<Value = OrderSpec> {
    (
        prop::bool::ANY,
        prop::option::weighted(0.9, 90u64..110),
        1u64..10,
    )
        .prop_map(|(buy, price, quantity)| OrderSpec {
            side: if buy { Side::Buy } else { Side::Sell },
            price,
            quantity,
        })
}

fn book_order(spec: &OrderSpec) -> BookOrder {
    BookOrder::new(
        OrderId::new(),
        UserId::new(),
        Symbol::new("BTC/USDT"),
        spec.side,
        if spec.price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        },
        spec.price.map(Price::from_u64),
        Quantity::try_new(Decimal::from(spec.quantity)).unwrap(),
    )
}

proptest! {
    #[test]
    fn limit_prices_bound_every_fill(specs in prop::collection::vec(order_spec(), 1..80)) {
        let mut book = OrderBook::new(Symbol::new("BTC/USDT"));

        for (i, spec) in specs.iter().enumerate() {
            let result = book.submit(book_order(spec), i as i64);

            for trade in &result.trades {
                if let Some(limit) = spec.price.map(Price::from_u64) {
                    match spec.side {
                        Side::Buy => prop_assert!(
                            trade.price <= limit,
                            "buy at {limit} filled at {}", trade.price
                        ),
                        Side::Sell => prop_assert!(
                            trade.price >= limit,
                            "sell at {limit} filled at {}", trade.price
                        ),
                    }
                }
            }
        }
    }

    #[test]
    fn taker_fills_sweep_best_prices_first(specs in prop::collection::vec(order_spec(), 1..80)) {
        let mut book = OrderBook::new(Symbol::new("BTC/USDT"));

        for (i, spec) in specs.iter().enumerate() {
            let result = book.submit(book_order(spec), i as i64);

            // Execution at resting prices means a buy walks up the asks
            // and a sell walks down the bids, never backwards.
            for pair in result.trades.windows(2) {
                match spec.side {
                    Side::Buy => prop_assert!(pair[0].price <= pair[1].price),
                    Side::Sell => prop_assert!(pair[0].price >= pair[1].price),
                }
            }
        }
    }

    #[test]
    fn quantity_is_conserved(specs in prop::collection::vec(order_spec(), 1..80)) {
        let mut book = OrderBook::new(Symbol::new("BTC/USDT"));

        for (i, spec) in specs.iter().enumerate() {
            let original = Quantity::try_new(Decimal::from(spec.quantity)).unwrap();
            let result = book.submit(book_order(spec), i as i64);

            let filled = result
                .trades
                .iter()
                .fold(Quantity::zero(), |acc, t| acc + t.quantity);
            prop_assert_eq!(filled, result.filled_quantity);
            prop_assert_eq!(
                filled + result.remaining_order.remaining_quantity,
                original
            );
        }
    }

    #[test]
    fn matching_is_deterministic(specs in prop::collection::vec(order_spec(), 1..60)) {
        let run = || {
            let mut book = OrderBook::new(Symbol::new("BTC/USDT"));
            let mut fills = Vec::new();
            for (i, spec) in specs.iter().enumerate() {
                let result = book.submit(book_order(spec), i as i64);
                for trade in result.trades {
                    fills.push((trade.price, trade.quantity));
                }
            }
            (fills, book.bid_depth(), book.ask_depth())
        };

        prop_assert_eq!(run(), run());
    }
}
