use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::{
    auth::{expired_cookie, session_cookie, Claims},
    db::models::Patient,
    error::AppResult,
    extract::AppJson,
    services::accounts::{self, LoginRequest, Profile, RegisterPatient},
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterPatient>,
) -> AppResult<(StatusCode, Json<Patient>)> {
    let patient = accounts::register_patient(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session =
        accounts::login(state.store.as_ref(), &state.settings, request, Utc::now()).await?;
    let cookie = session_cookie(
        &session.token,
        state.settings.token_ttl.num_seconds(),
        state.settings.secure_cookies,
    );
    Ok(([(SET_COOKIE, cookie)], Json(session)))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, expired_cookie(state.settings.secure_cookies))],
    )
}

pub async fn me(State(state): State<AppState>, claims: Claims) -> AppResult<Json<Profile>> {
    Ok(Json(accounts::profile(state.store.as_ref(), &claims).await?))
}
