//! Order Event: the message pushed to every connected kitchen display
//!
//! Wire shape (one JSON object per push):
//!
//! ```json
//! {"type":"NEW_ORDER","product":"Latte","quantity":2,"store":"1","time":"2026-01-01T08:00:00.000Z"}
//! ```
//!
//! Events are immutable once built. Consumers must skip `type` values they do
//! not recognise, which is what [`parse_display_message`] does.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::ids::StoreId;

/// Kind tag carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A customer placed a new order
    NewOrder,
    /// Any tag this build does not know about
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewOrder => "NEW_ORDER",
            EventKind::Unknown => "UNKNOWN",
        }
    }
}

/// A normalized order notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    product: String,
    quantity: u32,
    store: String,
    time: String,
}

impl OrderEvent {
    /// Build a `NEW_ORDER` event stamped with `at`.
    ///
    /// The store is rendered as its decimal id so displays can group by it.
    pub fn new_order(
        product: impl Into<String>,
        quantity: u32,
        store: StoreId,
        at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let product = product.into();
        if product.trim().is_empty() {
            return Err(ValidationError::EmptyProduct);
        }
        if quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity(0));
        }

        Ok(Self {
            kind: EventKind::NewOrder,
            product,
            quantity,
            store: store.to_string(),
            time: format_timestamp(at),
        })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn time(&self) -> &str {
        &self.time
    }
}

/// RFC 3339, UTC, millisecond precision
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse one pushed frame the way a kitchen display does.
///
/// Returns `None` for frames that are not order events (control frames,
/// unknown kinds, garbage). Never treats an unknown kind as an error.
pub fn parse_display_message(raw: &str) -> Option<OrderEvent> {
    let event: OrderEvent = serde_json::from_str(raw).ok()?;
    match event.kind {
        EventKind::NewOrder => Some(event),
        EventKind::Unknown => None,
    }
}
