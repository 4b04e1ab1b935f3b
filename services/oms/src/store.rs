//! In-memory order and saga stores
//!
//! Stand-ins for the relational store at the same interface: get by id,
//! upsert whole records, secondary lookups. Records are stored as owned
//! copies; callers mutate a copy and save it back, mirroring how rows
//! round-trip through a database layer.

use dashmap::DashMap;
use types::errors::{OrderError, SagaError};
use types::ids::{OrderId, SagaId, UserId};
use types::order::{Order, OrderStatus};

use crate::saga::SagaInstance;

/// Order records with a client-token uniqueness index
#[derive(Default)]
pub struct OrderStore {
    orders: DashMap<OrderId, Order>,
    client_ids: DashMap<String, OrderId>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new order, enforcing client-token uniqueness
    pub fn insert(&self, order: Order) -> Result<(), OrderError> {
        if let Some(token) = &order.client_order_id {
            let existing = self
                .client_ids
                .entry(token.clone())
                .or_insert(order.order_id);
            if *existing != order.order_id {
                return Err(OrderError::DuplicateClientOrderId(token.clone()));
            }
        }
        self.orders.insert(order.order_id, order);
        Ok(())
    }

    /// Save an updated copy of an existing order
    pub fn save(&self, order: Order) {
        self.orders.insert(order.order_id, order);
    }

    /// Fetch a copy by id
    pub fn get(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .map(|entry| entry.value().clone())
            .ok_or(OrderError::NotFound {
                order_id: *order_id,
            })
    }

    /// All orders for a user, newest first
    pub fn for_user(&self, user_id: UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.order_id.cmp(&a.order_id));
        orders
    }

    /// A user's working orders (OPEN or PARTIALLY_FILLED)
    pub fn open_for_user(&self, user_id: UserId) -> Vec<Order> {
        self.for_user(user_id)
            .into_iter()
            .filter(|order| {
                matches!(
                    order.status,
                    OrderStatus::Open | OrderStatus::PartiallyFilled
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Saga instances with an order-id index (sagas are 1:1 with orders)
#[derive(Default)]
pub struct SagaStore {
    sagas: DashMap<SagaId, SagaInstance>,
    by_order: DashMap<OrderId, SagaId>,
}

impl SagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a saga (insert or update)
    pub fn save(&self, saga: SagaInstance) {
        self.by_order.insert(saga.order_id, saga.saga_id);
        self.sagas.insert(saga.saga_id, saga);
    }

    /// Fetch a copy by saga id
    pub fn get(&self, saga_id: &SagaId) -> Result<SagaInstance, SagaError> {
        self.sagas
            .get(saga_id)
            .map(|entry| entry.value().clone())
            .ok_or(SagaError::NotFound { saga_id: *saga_id })
    }

    /// Fetch a copy by its order
    pub fn get_by_order(&self, order_id: &OrderId) -> Result<SagaInstance, SagaError> {
        let saga_id = self
            .by_order
            .get(order_id)
            .map(|entry| *entry.value())
            .ok_or(SagaError::NotFoundForOrder {
                order_id: *order_id,
            })?;
        self.get(&saga_id)
    }

    /// Copies of all non-terminal sagas, for the recovery sweep
    pub fn non_terminal(&self) -> Vec<SagaInstance> {
        self.sagas
            .iter()
            .filter(|entry| !entry.value().is_terminal())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }
}
