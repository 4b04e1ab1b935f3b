//! Order service: placement, cancellation, queries
//!
//! Validates synchronously, persists the order, and hands it to the saga
//! orchestrator. All state past validation is driven by asynchronous
//! callbacks, never by polling inside a request.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use types::clock;
use types::errors::OrderError;
use types::ids::{OrderId, Symbol, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};

use crate::error::OmsError;
use crate::saga::SagaOrchestrator;
use crate::store::OrderStore;

/// Read access to live book prices, used to size market-buy reservations
pub trait QuoteSource: Send + Sync {
    /// Best resting ask for a symbol, if any
    fn best_ask(&self, symbol: &Symbol) -> Option<Price>;
}

/// Order placement request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    /// Client-supplied idempotency token
    pub client_order_id: Option<String>,
}

/// Order service
pub struct OrderService {
    orders: Arc<OrderStore>,
    orchestrator: Arc<SagaOrchestrator>,
}

impl OrderService {
    pub fn new(orders: Arc<OrderStore>, orchestrator: Arc<SagaOrchestrator>) -> Self {
        Self {
            orders,
            orchestrator,
        }
    }

    /// Place a new order.
    ///
    /// Malformed orders are rejected here, before any saga exists. A
    /// market buy that cannot be priced (empty opposite book) is
    /// persisted as REJECTED and the error returned.
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: PlaceOrderRequest,
    ) -> Result<Order, OmsError> {
        let symbol = Symbol::try_new(request.symbol.to_uppercase())
            .ok_or_else(|| OrderError::InvalidSymbol(request.symbol.clone()))?;

        if request.quantity.is_zero() {
            return Err(OrderError::InvalidQuantity.into());
        }
        match request.order_type {
            OrderType::Limit if request.price.is_none() => {
                return Err(OrderError::MissingLimitPrice.into());
            }
            OrderType::Market if request.price.is_some() => {
                return Err(OrderError::UnexpectedLimitPrice.into());
            }
            _ => {}
        }

        let order = Order::new(
            user_id,
            symbol,
            request.side,
            request.order_type,
            request.price,
            request.quantity,
            request.client_order_id,
            clock::now_nanos(),
        );
        self.orders.insert(order.clone())?;
        tracing::info!(order_id = %order.order_id, %user_id, "order accepted");

        match self.orchestrator.start(order.clone()).await {
            Ok(order) => Ok(order),
            Err(OmsError::Order(e @ OrderError::NoLiquidity { .. })) => {
                // Sizing failed before anything was reserved; reject the
                // persisted order and surface the reason.
                let mut order = self.orders.get(&order.order_id)?;
                order.reject(e.to_string(), clock::now_nanos());
                self.orders.save(order);
                Err(e.into())
            }
            Err(other) => Err(other),
        }
    }

    /// Cancel an order on behalf of its owner
    pub async fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, OmsError> {
        self.owned_order(user_id, order_id)?;
        let reason = reason.unwrap_or_else(|| "User requested cancellation".to_string());
        self.orchestrator.cancel(order_id, &reason).await
    }

    /// Fetch an order, enforcing ownership
    pub fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OmsError> {
        Ok(self.owned_order(user_id, order_id)?)
    }

    /// All of a user's orders, newest first
    pub fn orders_for_user(&self, user_id: UserId) -> Vec<Order> {
        self.orders.for_user(user_id)
    }

    /// A user's working orders
    pub fn open_orders(&self, user_id: UserId) -> Vec<Order> {
        self.orders.open_for_user(user_id)
    }

    fn owned_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.orders.get(&order_id)?;
        if order.user_id != user_id {
            return Err(OrderError::NotOwner { order_id, user_id });
        }
        Ok(order)
    }
}
