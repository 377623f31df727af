use crate::catalog::Catalog;
use crate::config::GatewayConfig;
use crate::ingress::OrderIngress;
use crate::rate_limit::RateLimiter;
use kitchen_feed::metrics::FeedMetrics;
use kitchen_feed::{ConnectionRegistry, OrderBroker};
use std::sync::Arc;

/// Everything a request handler can reach. Built once at startup; the
/// registry inside lives until the server stops.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub catalog: Arc<dyn Catalog>,
    pub broker: Arc<OrderBroker>,
    pub ingress: Arc<OrderIngress>,
}

impl AppState {
    pub fn new(config: GatewayConfig, catalog: Arc<dyn Catalog>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let metrics = Arc::new(FeedMetrics::new());
        let broker = Arc::new(OrderBroker::new(registry, metrics));
        let ingress = Arc::new(OrderIngress::new(Arc::clone(&catalog), Arc::clone(&broker)));

        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(RateLimiter::new()),
            catalog,
            broker,
            ingress,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.broker.registry()
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        self.broker.metrics()
    }
}
