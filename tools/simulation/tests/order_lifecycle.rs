//! End-to-end order lifecycle scenarios
//!
//! Each test drives the full pipeline: order service → saga → wallet
//! reservation → matching → settlement, over the in-process bus.

use simulation::ExchangeHarness;
use std::str::FromStr;
use std::time::Duration;
use types::ids::UserId;
use types::numeric::{Amount, Price, Quantity};
use types::order::{OrderStatus, OrderType, Side};
use oms::{OmsError, PlaceOrderRequest, SagaState};
use types::errors::OrderError;

const WAIT: Duration = Duration::from_secs(5);

fn amt(s: &str) -> Amount {
    Amount::from_str(s).unwrap()
}

fn qty(s: &str) -> Quantity {
    Quantity::from_str(s).unwrap()
}

fn limit(symbol: &str, side: Side, price: u64, quantity: &str) -> PlaceOrderRequest {
    PlaceOrderRequest {
        symbol: symbol.to_string(),
        side,
        order_type: OrderType::Limit,
        price: Some(Price::from_u64(price)),
        quantity: qty(quantity),
        client_order_id: None,
    }
}

fn market(symbol: &str, side: Side, quantity: &str) -> PlaceOrderRequest {
    PlaceOrderRequest {
        symbol: symbol.to_string(),
        side,
        order_type: OrderType::Market,
        price: None,
        quantity: qty(quantity),
        client_order_id: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn limit_buy_fills_at_better_price_and_releases_improvement() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    let seller = UserId::new();

    harness.fund(buyer, "USDT", amt("1000"));
    harness.fund(seller, "BTC", amt("0.1"));

    // Resting sell at 9900.
    let sell = harness
        .orders
        .place_order(seller, limit("BTC/USDT", Side::Sell, 9900, "0.1"))
        .await
        .unwrap();
    harness
        .wait_for_status(sell.order_id, OrderStatus::Open, WAIT)
        .await;

    // Incoming buy limit 10000 reserves 1000 USDT, fills at 9900.
    let buy = harness
        .orders
        .place_order(buyer, limit("BTC/USDT", Side::Buy, 10000, "0.1"))
        .await
        .unwrap();

    let buy = harness
        .wait_for_status(buy.order_id, OrderStatus::Filled, WAIT)
        .await;
    let sell = harness
        .wait_for_status(sell.order_id, OrderStatus::Filled, WAIT)
        .await;
    harness.quiesce().await;

    // Trade executed at the maker's price.
    assert_eq!(buy.avg_fill_price, Some(Price::from_u64(9900)));
    assert_eq!(sell.avg_fill_price, Some(Price::from_u64(9900)));

    // Buyer paid 990, got 0.1 BTC; the 10 USDT improvement was released,
    // not silently kept reserved.
    let buyer_usdt = harness.wallet.balance(buyer, "USDT").unwrap();
    assert_eq!(buyer_usdt.available, amt("10"));
    assert_eq!(buyer_usdt.reserved, Amount::zero());
    let buyer_btc = harness.wallet.balance(buyer, "BTC").unwrap();
    assert_eq!(buyer_btc.available, amt("0.1"));

    // Seller delivered 0.1 BTC and received 990 USDT.
    let seller_btc = harness.wallet.balance(seller, "BTC").unwrap();
    assert_eq!(seller_btc.available, Amount::zero());
    assert_eq!(seller_btc.reserved, Amount::zero());
    let seller_usdt = harness.wallet.balance(seller, "USDT").unwrap();
    assert_eq!(seller_usdt.available, amt("990"));

    // Both sagas completed; nothing dead-lettered.
    assert_eq!(
        harness
            .orchestrator
            .saga_for_order(&buy.order_id)
            .unwrap()
            .state,
        SagaState::Completed
    );
    assert_eq!(
        harness
            .orchestrator
            .saga_for_order(&sell.order_id)
            .unwrap()
            .state,
        SagaState::Completed
    );
    assert!(harness.dead_letters.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reservation_failure_rejects_order_without_moving_funds() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    harness.fund(buyer, "USDT", amt("100"));

    // Needs 1000 USDT, only 100 available.
    let order = harness
        .orders
        .place_order(buyer, limit("BTC/USDT", Side::Buy, 10000, "0.1"))
        .await
        .unwrap();

    let order = harness
        .wait_for_status(order.order_id, OrderStatus::Rejected, WAIT)
        .await;
    harness.quiesce().await;

    assert!(order.reject_reason.is_some());

    // No funds moved; only the original deposit row exists.
    let balance = harness.wallet.balance(buyer, "USDT").unwrap();
    assert_eq!(balance.available, amt("100"));
    assert_eq!(balance.reserved, Amount::zero());

    let wallet = harness.wallet.get_or_create_wallet(buyer, "USDT");
    assert_eq!(wallet.lock().unwrap().transactions.len(), 1);

    assert_eq!(
        harness
            .orchestrator
            .saga_for_order(&order.order_id)
            .unwrap()
            .state,
        SagaState::Failed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_fill_then_cancel_releases_remaining_reservation() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    let seller = UserId::new();

    harness.fund(buyer, "USDT", amt("1000"));
    harness.fund(seller, "ETH", amt("4"));

    // Buy 10 ETH @ 10 → reserve 100 USDT; rests.
    let buy = harness
        .orders
        .place_order(buyer, limit("ETH/USDT", Side::Buy, 10, "10"))
        .await
        .unwrap();
    harness
        .wait_for_status(buy.order_id, OrderStatus::Open, WAIT)
        .await;

    // Sell 4 ETH @ 10 crosses; buy becomes partially filled.
    let sell = harness
        .orders
        .place_order(seller, limit("ETH/USDT", Side::Sell, 10, "4"))
        .await
        .unwrap();
    harness
        .wait_for_status(buy.order_id, OrderStatus::PartiallyFilled, WAIT)
        .await;
    harness
        .wait_for_status(sell.order_id, OrderStatus::Filled, WAIT)
        .await;
    harness.quiesce().await;

    // Cancel the working remainder.
    harness
        .orders
        .cancel_order(buyer, buy.order_id, None)
        .await
        .unwrap();
    let buy = harness
        .wait_for_status(buy.order_id, OrderStatus::Cancelled, WAIT)
        .await;
    harness.quiesce().await;

    // Fill quantity retained, remaining 60 USDT released, settled legs
    // untouched: 1000 − 40 spent.
    assert_eq!(buy.filled_quantity, qty("4"));
    let buyer_usdt = harness.wallet.balance(buyer, "USDT").unwrap();
    assert_eq!(buyer_usdt.available, amt("960"));
    assert_eq!(buyer_usdt.reserved, Amount::zero());
    let buyer_eth = harness.wallet.balance(buyer, "ETH").unwrap();
    assert_eq!(buyer_eth.available, amt("4"));

    assert_eq!(
        harness
            .orchestrator
            .saga_for_order(&buy.order_id)
            .unwrap()
            .state,
        SagaState::Compensated
    );
    assert!(harness.dead_letters.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn market_sell_without_liquidity_is_cancelled_and_released() {
    let harness = ExchangeHarness::start_default();
    let seller = UserId::new();
    harness.fund(seller, "BTC", amt("1"));

    let order = harness
        .orders
        .place_order(seller, market("BTC/USDT", Side::Sell, "0.5"))
        .await
        .unwrap();

    let order = harness
        .wait_for_status(order.order_id, OrderStatus::Cancelled, WAIT)
        .await;
    harness.quiesce().await;

    assert_eq!(order.filled_quantity, Quantity::zero());
    let balance = harness.wallet.balance(seller, "BTC").unwrap();
    assert_eq!(balance.available, amt("1"));
    assert_eq!(balance.reserved, Amount::zero());
}

#[tokio::test(flavor = "multi_thread")]
async fn market_buy_reserves_with_buffer_and_releases_the_unused_part() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    let seller = UserId::new();

    harness.fund(buyer, "USDT", amt("1100"));
    harness.fund(seller, "BTC", amt("0.1"));

    let sell = harness
        .orders
        .place_order(seller, limit("BTC/USDT", Side::Sell, 10000, "0.1"))
        .await
        .unwrap();
    harness
        .wait_for_status(sell.order_id, OrderStatus::Open, WAIT)
        .await;

    // Best ask 10000, 5% buffer → reserve 1050 for 0.1 BTC.
    let buy = harness
        .orders
        .place_order(buyer, market("BTC/USDT", Side::Buy, "0.1"))
        .await
        .unwrap();
    assert_eq!(buy.reserved_amount, Some(amt("1050")));

    harness
        .wait_for_status(buy.order_id, OrderStatus::Filled, WAIT)
        .await;
    harness.quiesce().await;

    // Actual cost 1000; the 50 USDT buffer came back.
    let buyer_usdt = harness.wallet.balance(buyer, "USDT").unwrap();
    assert_eq!(buyer_usdt.available, amt("100"));
    assert_eq!(buyer_usdt.reserved, Amount::zero());
    assert_eq!(
        harness.wallet.balance(buyer, "BTC").unwrap().available,
        amt("0.1")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn market_buy_with_no_ask_is_rejected_up_front() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    harness.fund(buyer, "USDT", amt("1000"));

    let err = harness
        .orders
        .place_order(buyer, market("BTC/USDT", Side::Buy, "0.1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OmsError::Order(OrderError::NoLiquidity { .. })
    ));

    // The order record exists and is terminal.
    let orders = harness.orders.orders_for_user(buyer);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Rejected);
}

#[tokio::test(flavor = "multi_thread")]
async fn validation_rejects_malformed_orders_synchronously() {
    let harness = ExchangeHarness::start_default();
    let user = UserId::new();

    // Limit without a price.
    let err = harness
        .orders
        .place_order(
            user,
            PlaceOrderRequest {
                symbol: "BTC/USDT".to_string(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                price: None,
                quantity: qty("1"),
                client_order_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OmsError::Order(OrderError::MissingLimitPrice)
    ));

    // Zero quantity.
    let err = harness
        .orders
        .place_order(
            user,
            PlaceOrderRequest {
                symbol: "BTC/USDT".to_string(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                price: Some(Price::from_u64(100)),
                quantity: Quantity::zero(),
                client_order_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OmsError::Order(OrderError::InvalidQuantity)));

    // Malformed symbol.
    let err = harness
        .orders
        .place_order(user, limit("BTCUSDT", Side::Buy, 100, "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OmsError::Order(OrderError::InvalidSymbol(_))));

    // No saga was ever created.
    assert!(harness.saga_store.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_client_order_id_is_rejected() {
    let harness = ExchangeHarness::start_default();
    let user = UserId::new();
    harness.fund(user, "USDT", amt("10000"));

    let mut request = limit("BTC/USDT", Side::Buy, 100, "1");
    request.client_order_id = Some("client-token-1".to_string());

    harness
        .orders
        .place_order(user, request.clone())
        .await
        .unwrap();
    let err = harness.orders.place_order(user, request).await.unwrap_err();
    assert!(matches!(
        err,
        OmsError::Order(OrderError::DuplicateClientOrderId(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn book_updates_are_broadcast_after_mutations() {
    let harness = ExchangeHarness::start_default();
    let user = UserId::new();
    harness.fund(user, "USDT", amt("10000"));

    let order = harness
        .orders
        .place_order(user, limit("BTC/USDT", Side::Buy, 9500, "0.5"))
        .await
        .unwrap();
    harness
        .wait_for_status(order.order_id, OrderStatus::Open, WAIT)
        .await;

    let mut rx = harness.book_updates.lock().await;
    let update = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("book update within timeout")
        .expect("channel open");
    assert_eq!(update.symbol.as_str(), "BTC/USDT");
    assert_eq!(update.bids.len(), 1);
    assert_eq!(update.bids[0].price, Price::from_u64(9500));
    assert_eq!(update.bids[0].quantity, qty("0.5"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_of_terminal_order_is_a_state_conflict() {
    let harness = ExchangeHarness::start_default();
    let buyer = UserId::new();
    let seller = UserId::new();
    harness.fund(buyer, "USDT", amt("1000"));
    harness.fund(seller, "BTC", amt("0.1"));

    let sell = harness
        .orders
        .place_order(seller, limit("BTC/USDT", Side::Sell, 9900, "0.1"))
        .await
        .unwrap();
    harness
        .wait_for_status(sell.order_id, OrderStatus::Open, WAIT)
        .await;
    let buy = harness
        .orders
        .place_order(buyer, limit("BTC/USDT", Side::Buy, 9900, "0.1"))
        .await
        .unwrap();
    harness
        .wait_for_status(buy.order_id, OrderStatus::Filled, WAIT)
        .await;

    let err = harness
        .orders
        .cancel_order(buyer, buy.order_id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OmsError::Order(OrderError::NotCancellable { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn query_surface_reflects_book_state() {
    let harness = ExchangeHarness::start_default();
    let user = UserId::new();
    harness.fund(user, "USDT", amt("100000"));
    harness.fund(user, "BTC", amt("5"));

    let bid = harness
        .orders
        .place_order(user, limit("BTC/USDT", Side::Buy, 49900, "1"))
        .await
        .unwrap();
    let ask = harness
        .orders
        .place_order(user, limit("BTC/USDT", Side::Sell, 50100, "1"))
        .await
        .unwrap();
    harness
        .wait_for_status(bid.order_id, OrderStatus::Open, WAIT)
        .await;
    harness
        .wait_for_status(ask.order_id, OrderStatus::Open, WAIT)
        .await;

    let symbol = types::ids::Symbol::new("BTC/USDT");
    let stats = harness.engine.stats(&symbol).unwrap();
    assert_eq!(stats.best_bid, Some(Price::from_u64(49900)));
    assert_eq!(stats.best_ask, Some(Price::from_u64(50100)));
    assert_eq!(stats.spread, Some(rust_decimal::Decimal::from(200)));
    assert_eq!(stats.bid_depth, 1);
    assert_eq!(stats.ask_depth, 1);

    let snapshot = harness
        .engine
        .snapshot(&symbol, 10, types::clock::now_nanos())
        .unwrap();
    assert_eq!(snapshot.bids[0].order_count, 1);

    assert_eq!(harness.orders.open_orders(user).len(), 2);
}
