//! Kitchen Feed
//!
//! The order fan-out core: accepts normalized order events from ingress and
//! pushes them to every kitchen display connected at that moment.
//!
//! # Architecture
//!
//! ```text
//!   Order Ingress
//!        │ publish(OrderEvent)
//!    ┌───▼────┐   list_active()   ┌──────────┐
//!    │ Broker │ ─────────────────►│ Registry │◄── register / unregister
//!    └───┬────┘                   └──────────┘          ▲
//!        │ offer(frame)  (never waits)                  │
//!   ┌────▼─────┐ ┌──────────┐ ┌──────────┐              │
//!   │ queue #1 │ │ queue #2 │ │ queue #n │   DisplayConnection (FSM)
//!   └────┬─────┘ └────┬─────┘ └────┬─────┘   + HeartbeatMonitor
//!        ▼            ▼            ▼           per session task
//!     socket       socket       socket
//! ```
//!
//! Push only: a display receives events published while it is open and
//! nothing from before it connected.

pub mod backpressure;
pub mod broker;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod lifecycle;
pub mod metrics;
pub mod registry;

pub use broker::{OrderBroker, PublishReport};
pub use config::FeedConfig;
pub use error::FeedError;
pub use registry::ConnectionRegistry;
