use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    auth::Claims,
    db::models::OrderDetail,
    error::AppResult,
    extract::{AppJson, AppPath},
    services::checkout::{self, AddToCart, CartView, CheckoutRequest, SetQuantity},
    state::AppState,
};

pub async fn get_cart(State(state): State<AppState>, claims: Claims) -> AppResult<Json<CartView>> {
    Ok(Json(
        checkout::view_cart(state.store.as_ref(), claims.sub).await?,
    ))
}

pub async fn add_item(
    State(state): State<AppState>,
    claims: Claims,
    AppJson(request): AppJson<AddToCart>,
) -> AppResult<Json<CartView>> {
    Ok(Json(
        checkout::add_to_cart(state.store.as_ref(), claims.sub, request).await?,
    ))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(medicine_id): AppPath<Uuid>,
    AppJson(request): AppJson<SetQuantity>,
) -> AppResult<Json<CartView>> {
    Ok(Json(
        checkout::set_cart_quantity(state.store.as_ref(), claims.sub, medicine_id, request).await?,
    ))
}

pub async fn remove_item(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(medicine_id): AppPath<Uuid>,
) -> AppResult<Json<CartView>> {
    Ok(Json(
        checkout::remove_from_cart(state.store.as_ref(), claims.sub, medicine_id).await?,
    ))
}

pub async fn clear_cart(State(state): State<AppState>, claims: Claims) -> AppResult<StatusCode> {
    checkout::clear_cart(state.store.as_ref(), claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn checkout(
    State(state): State<AppState>,
    claims: Claims,
    AppJson(request): AppJson<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let order = checkout::checkout(state.store.as_ref(), claims.sub, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
