use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    auth::Claims,
    db::{
        models::{Patient, Pharmacist},
        store::{PatientUpdate, PharmacistUpdate},
    },
    error::{AppError, AppResult},
    extract::{AppJson, AppPath},
    services::accounts::{self, CreatePharmacist, PharmacistProfileUpdate},
    state::AppState,
};

pub async fn patient_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> AppResult<Json<Patient>> {
    state
        .store
        .get_patient(claims.sub)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Patient"))
}

pub async fn update_patient_profile(
    State(state): State<AppState>,
    claims: Claims,
    AppJson(update): AppJson<PatientUpdate>,
) -> AppResult<Json<Patient>> {
    Ok(Json(
        accounts::update_patient_profile(state.store.as_ref(), claims.sub, update).await?,
    ))
}

pub async fn pharmacist_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> AppResult<Json<Pharmacist>> {
    state
        .store
        .get_pharmacist(claims.sub)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Pharmacist"))
}

pub async fn update_pharmacist_profile(
    State(state): State<AppState>,
    claims: Claims,
    AppJson(update): AppJson<PharmacistProfileUpdate>,
) -> AppResult<Json<Pharmacist>> {
    Ok(Json(
        accounts::update_pharmacist_profile(state.store.as_ref(), claims.sub, update).await?,
    ))
}

pub async fn list_pharmacists(State(state): State<AppState>) -> AppResult<Json<Vec<Pharmacist>>> {
    Ok(Json(state.store.list_pharmacists().await?))
}

pub async fn create_pharmacist(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreatePharmacist>,
) -> AppResult<(StatusCode, Json<Pharmacist>)> {
    let pharmacist = accounts::create_pharmacist(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(pharmacist)))
}

pub async fn update_pharmacist(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<PharmacistUpdate>,
) -> AppResult<Json<Pharmacist>> {
    Ok(Json(
        accounts::update_pharmacist(state.store.as_ref(), id, update).await?,
    ))
}

pub async fn delete_pharmacist(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.delete_pharmacist(id).await? {
        return Err(AppError::not_found("Pharmacist"));
    }
    log::info!("Deleted pharmacist {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_patients(State(state): State<AppState>) -> AppResult<Json<Vec<Patient>>> {
    Ok(Json(state.store.list_patients().await?))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.delete_patient(id).await? {
        return Err(AppError::not_found("Patient"));
    }
    log::info!("Deleted patient {}", id);
    Ok(StatusCode::NO_CONTENT)
}
