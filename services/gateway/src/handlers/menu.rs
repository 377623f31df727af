use crate::state::AppState;
use axum::{extract::State, Json};
use types::catalog::Product;

pub async fn get_menu(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog.menu().await)
}
