//! Gateway: the HTTP and WebSocket edge of the kitchen order service.
//!
//! `POST /order` goes through [`ingress::OrderIngress`] to the kitchen-feed
//! broker; `GET /ws/kitchen` runs one display session per connection.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingress;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
