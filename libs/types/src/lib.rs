//! Types library for the coffee order fan-out service
//!
//! Shared type definitions used by the kitchen feed and the gateway, so that
//! the producer side (storefront orders) and the consumer side (kitchen
//! displays) agree on one wire shape.
//!
//! # Modules
//! - `ids`: Identifiers (OrderId, StoreId, ProductId, CategoryId, ConnectionId)
//! - `order`: The Order Event pushed to kitchen displays
//! - `catalog`: Menu, store, recipe and stock records
//! - `errors`: Validation error taxonomy

pub mod catalog;
pub mod errors;
pub mod ids;
pub mod order;

