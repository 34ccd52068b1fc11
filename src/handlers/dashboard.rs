use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    error::AppResult,
    services::dashboard::{self, AdminDashboard, PharmacistDashboard},
    state::AppState,
};

pub async fn admin(State(state): State<AppState>) -> AppResult<Json<AdminDashboard>> {
    let dashboard = dashboard::admin_dashboard(
        state.store.as_ref(),
        state.settings.low_stock_threshold,
        state.settings.expiry_window,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(dashboard))
}

pub async fn pharmacist(State(state): State<AppState>) -> AppResult<Json<PharmacistDashboard>> {
    let dashboard = dashboard::pharmacist_dashboard(
        state.store.as_ref(),
        state.settings.low_stock_threshold,
        state.settings.expiry_window,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(dashboard))
}
