use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use types::ids::OrderId;

/// Storefront order submission.
///
/// Fields are optional so a missing field is reported by name instead of
/// as a generic body error; non-integer values still fail deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub store_id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

impl CreateOrderRequest {
    pub fn new(store_id: i64, product_id: i64, quantity: i64) -> Self {
        Self {
            store_id: Some(store_id),
            product_id: Some(product_id),
            quantity: Some(quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: String,
    pub product: String,
    /// Displays the event was queued for; zero is still a success.
    pub delivered_to: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub displays: usize,
    pub metrics: BTreeMap<String, u64>,
}
