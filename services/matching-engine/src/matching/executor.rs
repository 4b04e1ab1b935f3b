//! Trade construction
//!
//! Builds the immutable trade record for one fill, deriving the buy/sell
//! roles from which side the taker was on so downstream settlement never
//! re-derives direction.

use types::ids::TradeId;
use types::numeric::{Price, Quantity};
use types::order::Side;
use types::trade::Trade;

use crate::book::BookOrder;

/// Build a trade for a fill of `quantity` at `price` (the maker's price)
pub fn build_trade(
    taker: &BookOrder,
    maker: &BookOrder,
    price: Price,
    quantity: Quantity,
    timestamp: i64,
) -> Trade {
    let (buy_order_id, buy_user_id, sell_order_id, sell_user_id) = match taker.side {
        Side::Buy => (
            taker.order_id,
            taker.user_id,
            maker.order_id,
            maker.user_id,
        ),
        Side::Sell => (
            maker.order_id,
            maker.user_id,
            taker.order_id,
            taker.user_id,
        ),
    };

    Trade {
        trade_id: TradeId::new(),
        symbol: taker.symbol.clone(),
        maker_order_id: maker.order_id,
        maker_user_id: maker.user_id,
        taker_order_id: taker.order_id,
        taker_user_id: taker.user_id,
        buy_order_id,
        buy_user_id,
        sell_order_id,
        sell_user_id,
        price,
        quantity,
        executed_at: timestamp,
    }
}
