//! Saga context: the mutable payload carried between saga steps
//!
//! Derived from the order at saga start: which currency to reserve and
//! how much, then progress flags and the reservation still outstanding.
//! Serializable so the saga survives process restarts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::OrderError;
use types::ids::{OrderId, Symbol, TransactionId, UserId};
use types::numeric::{normalize, Amount, Price, Quantity};
use types::order::{Order, OrderType, Side};

/// Saga-scoped derived data for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSagaContext {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,

    pub base_currency: String,
    pub quote_currency: String,

    /// Currency earmarked for this order (quote for buys, base for sells)
    pub reserve_currency: String,
    /// Total amount reserved at saga start
    pub reserve_amount: Amount,
    /// Per-base-unit price the reservation was sized at (buys only)
    pub reserve_unit_price: Option<Price>,
    /// Reservation not yet consumed by settlement or released
    pub reserved_remaining: Amount,

    /// Wallet transaction id returned by the reservation
    pub wallet_transaction_id: Option<TransactionId>,
    pub funds_reserved: bool,
    pub order_submitted: bool,
}

impl OrderSagaContext {
    /// Context for a limit order: buys reserve quote at the limit price,
    /// sells reserve the base quantity itself.
    pub fn for_limit_order(order: &Order) -> Result<Self, OrderError> {
        let price = order.price.ok_or(OrderError::MissingLimitPrice)?;
        match order.side {
            Side::Buy => Ok(Self::build(
                order,
                order.symbol.quote(),
                Amount::from_price_quantity(price, order.quantity),
                Some(price),
            )),
            Side::Sell => Ok(Self::build(
                order,
                order.symbol.base(),
                Amount::try_new(order.quantity.as_decimal()).unwrap_or_else(Amount::zero),
                None,
            )),
        }
    }

    /// Context for a market order.
    ///
    /// Buys are sized from the live best ask plus a slippage buffer and
    /// re-validated against actual fill cost at settlement; with no
    /// resting ask there is nothing to size against and the order is
    /// rejected. Sells reserve the base quantity, no estimate needed.
    pub fn for_market_order(
        order: &Order,
        best_ask: Option<Price>,
        slippage: Decimal,
    ) -> Result<Self, OrderError> {
        match order.side {
            Side::Buy => {
                let best_ask = best_ask.ok_or_else(|| OrderError::NoLiquidity {
                    symbol: order.symbol.to_string(),
                })?;
                let unit = Price::try_new(normalize(
                    best_ask.as_decimal() * (Decimal::ONE + slippage),
                ))
                .ok_or_else(|| OrderError::NoLiquidity {
                    symbol: order.symbol.to_string(),
                })?;
                Ok(Self::build(
                    order,
                    order.symbol.quote(),
                    Amount::from_price_quantity(unit, order.quantity),
                    Some(unit),
                ))
            }
            Side::Sell => Ok(Self::build(
                order,
                order.symbol.base(),
                Amount::try_new(order.quantity.as_decimal()).unwrap_or_else(Amount::zero),
                None,
            )),
        }
    }

    fn build(
        order: &Order,
        reserve_currency: &str,
        reserve_amount: Amount,
        reserve_unit_price: Option<Price>,
    ) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            price: order.price,
            quantity: order.quantity,
            base_currency: order.symbol.base().to_string(),
            quote_currency: order.symbol.quote().to_string(),
            reserve_currency: reserve_currency.to_string(),
            reserve_amount,
            reserve_unit_price,
            reserved_remaining: reserve_amount,
            wallet_transaction_id: None,
            funds_reserved: false,
            order_submitted: false,
        }
    }

    /// Account a fill against the outstanding reservation.
    ///
    /// For buys the fill consumes `reserve_unit_price × qty` of the
    /// reservation: the settlement debit takes `fill_price × qty` and the
    /// difference (the price improvement) is returned for the caller to
    /// release. Sells consume the base quantity; nothing to release.
    pub fn apply_fill(&mut self, quantity: Quantity, fill_price: Price) -> Amount {
        match self.side {
            Side::Buy => {
                let unit = match self.reserve_unit_price {
                    Some(unit) => unit,
                    None => fill_price,
                };
                let consumed = Amount::from_price_quantity(unit, quantity);
                let debited = Amount::from_price_quantity(fill_price, quantity);
                self.reserved_remaining = self.reserved_remaining.saturating_sub(consumed);
                consumed.saturating_sub(debited)
            }
            Side::Sell => {
                let consumed =
                    Amount::try_new(quantity.as_decimal()).unwrap_or_else(Amount::zero);
                self.reserved_remaining = self.reserved_remaining.saturating_sub(consumed);
                Amount::zero()
            }
        }
    }

    /// Take whatever reservation is still outstanding (compensation or
    /// unused market-buy buffer), leaving zero behind
    pub fn take_remaining_reservation(&mut self) -> Amount {
        std::mem::replace(&mut self.reserved_remaining, Amount::zero())
    }
}
