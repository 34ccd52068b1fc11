use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::Claims,
    db::models::Prescription,
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    services::prescriptions::{self, PrescriptionQuery, ReviewRequest, UploadPrescription},
    state::AppState,
};

pub async fn upload(
    State(state): State<AppState>,
    claims: Claims,
    AppJson(request): AppJson<UploadPrescription>,
) -> AppResult<(StatusCode, Json<Prescription>)> {
    let prescription = prescriptions::upload(state.store.as_ref(), claims.sub, request).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

pub async fn list_own(
    State(state): State<AppState>,
    claims: Claims,
    AppQuery(query): AppQuery<PrescriptionQuery>,
) -> AppResult<Json<Vec<Prescription>>> {
    Ok(Json(
        prescriptions::list(state.store.as_ref(), Some(claims.sub), query).await?,
    ))
}

pub async fn list_all(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PrescriptionQuery>,
) -> AppResult<Json<Vec<Prescription>>> {
    Ok(Json(
        prescriptions::list(state.store.as_ref(), None, query).await?,
    ))
}

pub async fn review(
    State(state): State<AppState>,
    claims: Claims,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<ReviewRequest>,
) -> AppResult<Json<Prescription>> {
    Ok(Json(
        prescriptions::review(state.store.as_ref(), claims.sub, id, request, Utc::now()).await?,
    ))
}
