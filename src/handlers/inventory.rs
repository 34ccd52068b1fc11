//! Medicine management for pharmacists and admins.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        models::Medicine,
        store::{MedicineUpdate, NewMedicine},
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    services::{
        catalog::{self, MedicineQuery, StockUpdate},
        dashboard::{self, InventoryAlerts},
    },
    state::AppState,
};

pub async fn list_medicines(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MedicineQuery>,
) -> AppResult<Json<Vec<Medicine>>> {
    Ok(Json(catalog::browse(state.store.as_ref(), query).await?))
}

pub async fn create_medicine(
    State(state): State<AppState>,
    AppJson(medicine): AppJson<NewMedicine>,
) -> AppResult<(StatusCode, Json<Medicine>)> {
    let created = catalog::create_medicine(state.store.as_ref(), medicine).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_medicine(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<MedicineUpdate>,
) -> AppResult<Json<Medicine>> {
    Ok(Json(
        catalog::update_medicine(state.store.as_ref(), id, update).await?,
    ))
}

pub async fn set_stock(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<StockUpdate>,
) -> AppResult<Json<Medicine>> {
    Ok(Json(catalog::set_stock(state.store.as_ref(), id, update).await?))
}

pub async fn delete_medicine(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    catalog::delete_medicine(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn alerts(State(state): State<AppState>) -> AppResult<Json<InventoryAlerts>> {
    let alerts = dashboard::inventory_alerts(
        state.store.as_ref(),
        state.settings.low_stock_threshold,
        state.settings.expiry_window,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(alerts))
}
