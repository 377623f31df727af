//! Order Ingress: validate a storefront order, resolve it against the
//! catalog, reserve ingredients and hand one event to the broker.

use std::sync::Arc;

use chrono::Utc;
use kitchen_feed::{FeedError, OrderBroker};
use thiserror::Error;
use tracing::info;
use types::catalog::Store;
use types::errors::ValidationError;
use types::ids::{OrderId, ProductId, StoreId};
use types::order::OrderEvent;

use crate::catalog::{Catalog, CatalogError};
use crate::models::CreateOrderRequest;

/// Sanity cap on a single order line.
pub const MAX_QUANTITY: u32 = 1000;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown {kind} {id}")]
    CatalogLookup { kind: &'static str, id: u32 },

    #[error(transparent)]
    Inventory(#[from] CatalogError),

    #[error("Failed to publish order event: {0}")]
    Publish(#[from] FeedError),
}

/// A request whose fields passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidOrder {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: u32,
}

pub fn validate(request: &CreateOrderRequest) -> Result<ValidOrder, ValidationError> {
    let store = request
        .store_id
        .ok_or(ValidationError::MissingField { field: "store_id" })?;
    let product = request
        .product_id
        .ok_or(ValidationError::MissingField { field: "product_id" })?;
    let quantity = request
        .quantity
        .ok_or(ValidationError::MissingField { field: "quantity" })?;

    if quantity <= 0 {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or(ValidationError::QuantityTooLarge {
            quantity,
            max: MAX_QUANTITY,
        })?;

    let store_id = StoreId::try_from_raw(store).ok_or(ValidationError::InvalidId {
        field: "store_id",
        value: store,
    })?;
    let product_id = ProductId::try_from_raw(product).ok_or(ValidationError::InvalidId {
        field: "product_id",
        value: product,
    })?;

    Ok(ValidOrder {
        store_id,
        product_id,
        quantity,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub product: String,
    pub sequence: u64,
    pub delivered_to: usize,
}

pub struct OrderIngress {
    catalog: Arc<dyn Catalog>,
    broker: Arc<OrderBroker>,
}

impl OrderIngress {
    pub fn new(catalog: Arc<dyn Catalog>, broker: Arc<OrderBroker>) -> Self {
        Self { catalog, broker }
    }

    /// Accept one order.
    ///
    /// Every error path returns before the broker is called, so a failed
    /// submission never reaches a display. Success does not depend on any
    /// display being connected.
    pub async fn submit(&self, request: &CreateOrderRequest) -> Result<OrderAck, IngressError> {
        let order = validate(request)?;
        let store = self.resolve_store(order.store_id).await?;
        self.accept(&store, order).await
    }

    /// Look up the store an order names.
    pub async fn resolve_store(&self, id: StoreId) -> Result<Store, IngressError> {
        self.catalog
            .store(id)
            .await
            .ok_or(IngressError::CatalogLookup {
                kind: "store",
                id: id.get(),
            })
    }

    /// Second half of [`submit`](Self::submit) for a validated order whose
    /// store already resolved: product lookup, reservation, publish.
    pub async fn accept(&self, store: &Store, order: ValidOrder) -> Result<OrderAck, IngressError> {
        let product = self
            .catalog
            .product(order.product_id)
            .await
            .filter(|p| p.is_active)
            .ok_or(IngressError::CatalogLookup {
                kind: "product",
                id: order.product_id.get(),
            })?;

        let event = OrderEvent::new_order(product.name.clone(), order.quantity, store.id, Utc::now())?;
        self.catalog
            .reserve(store.id, product.id, order.quantity)
            .await?;

        let report = self.broker.publish(&event)?;
        let order_id = OrderId::new();

        info!(
            order_id = %order_id,
            store_id = store.id.get(),
            product = %product.name,
            quantity = order.quantity,
            sequence = report.sequence,
            delivered_to = report.delivered_count(),
            "Order accepted"
        );

        Ok(OrderAck {
            order_id,
            product: product.name,
            sequence: report.sequence,
            delivered_to: report.delivered_count(),
        })
    }
}
