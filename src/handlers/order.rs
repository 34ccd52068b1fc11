use axum::{extract::State, Json};
use uuid::Uuid;

use crate::{
    auth::Claims,
    db::models::{Order, OrderDetail},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    services::orders::{self, OrderQuery, StatusChange},
    state::AppState,
};

/// Patients get their own orders, staff get every order.
pub async fn list_orders(
    State(state): State<AppState>,
    claims: Claims,
    AppQuery(query): AppQuery<OrderQuery>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(
        orders::list_orders(state.store.as_ref(), &claims, query).await?,
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    Ok(Json(orders::get_order(state.store.as_ref(), &claims, id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Order>> {
    Ok(Json(
        orders::cancel_order(state.store.as_ref(), &claims, id).await?,
    ))
}

pub async fn change_status(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(id): AppPath<Uuid>,
    AppJson(change): AppJson<StatusChange>,
) -> AppResult<Json<Order>> {
    let order = orders::change_status(state.store.as_ref(), id, change).await?;
    log::info!(
        "Order {} set to {} by {} {}",
        id,
        order.status,
        claims.role,
        claims.sub
    );
    Ok(Json(order))
}
