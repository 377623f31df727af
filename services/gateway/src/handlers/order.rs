use crate::error::AppError;
use crate::ingress::{validate, IngressError};
use crate::models::{CreateOrderRequest, OrderResponse};
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Json(request) = payload?;
    let order = validate(&request).map_err(IngressError::from)?;
    let store = state.ingress.resolve_store(order.store_id).await?;

    // Per-store limit, keyed only on stores the catalog knows.
    state.rate_limiter.check(
        &format!("store:{}:order_placement", store.id),
        &state.config.order_rate,
    )?;

    let ack = state.ingress.accept(&store, order).await?;

    Ok(Json(OrderResponse {
        order_id: ack.order_id,
        status: "ACCEPTED".to_string(),
        product: ack.product,
        delivered_to: ack.delivered_to,
    }))
}
