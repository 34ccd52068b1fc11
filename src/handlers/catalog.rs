use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    db::{
        models::{Branch, Medicine, Pharmacy},
        store::{BranchUpdate, NewBranch, NewPharmacy, PharmacyUpdate},
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    services::catalog::{self, MedicineQuery},
    state::AppState,
};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_medicines(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MedicineQuery>,
) -> AppResult<Json<Vec<Medicine>>> {
    Ok(Json(catalog::browse(state.store.as_ref(), query).await?))
}

pub async fn get_medicine(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Medicine>> {
    Ok(Json(catalog::get_medicine(state.store.as_ref(), id).await?))
}

pub async fn list_pharmacies(State(state): State<AppState>) -> AppResult<Json<Vec<Pharmacy>>> {
    Ok(Json(state.store.list_pharmacies().await?))
}

pub async fn create_pharmacy(
    State(state): State<AppState>,
    AppJson(pharmacy): AppJson<NewPharmacy>,
) -> AppResult<(StatusCode, Json<Pharmacy>)> {
    let created = catalog::create_pharmacy(state.store.as_ref(), pharmacy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_pharmacy(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<PharmacyUpdate>,
) -> AppResult<Json<Pharmacy>> {
    Ok(Json(
        catalog::update_pharmacy(state.store.as_ref(), id, update).await?,
    ))
}

pub async fn delete_pharmacy(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    catalog::delete_pharmacy(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_branches(State(state): State<AppState>) -> AppResult<Json<Vec<Branch>>> {
    Ok(Json(state.store.list_branches().await?))
}

pub async fn create_branch(
    State(state): State<AppState>,
    AppJson(branch): AppJson<NewBranch>,
) -> AppResult<(StatusCode, Json<Branch>)> {
    let created = catalog::create_branch(state.store.as_ref(), branch).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_branch(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<BranchUpdate>,
) -> AppResult<Json<Branch>> {
    Ok(Json(
        catalog::update_branch(state.store.as_ref(), id, update).await?,
    ))
}

pub async fn delete_branch(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    catalog::delete_branch(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
