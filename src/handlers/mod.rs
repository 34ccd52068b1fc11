//! HTTP surface. Public routes live under `/api`; each role has its own
//! prefix guarded by the matching `require_*` middleware.

use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    auth::{require_admin, require_patient, require_pharmacist},
    state::AppState,
};

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod inventory;
pub mod order;
pub mod prescription;

/// Builds every route with its guards. Layers that depend on deployment
/// settings (CORS) are added by the caller.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", public_routes())
        .nest("/patient", patient_routes(&state))
        .nest("/pharmacist", pharmacist_routes(&state))
        .nest("/admin", admin_routes(&state))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(catalog::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/medicines", get(catalog::list_medicines))
        .route("/medicines/:id", get(catalog::get_medicine))
        .route("/pharmacies", get(catalog::list_pharmacies))
        .route("/branches", get(catalog::list_branches))
}

fn patient_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::patient_profile).put(account::update_patient_profile),
        )
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:medicine_id",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/checkout", post(cart::checkout))
        .route("/orders", get(order::list_orders))
        .route("/orders/:id", get(order::get_order))
        .route("/orders/:id/cancel", post(order::cancel_order))
        .route(
            "/prescriptions",
            get(prescription::list_own).post(prescription::upload),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_patient,
        ))
}

fn pharmacist_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::pharmacist))
        .route(
            "/profile",
            get(account::pharmacist_profile).put(account::update_pharmacist_profile),
        )
        .route("/prescriptions", get(prescription::list_all))
        .route("/prescriptions/:id/status", put(prescription::review))
        .route("/orders", get(order::list_orders))
        .route("/orders/:id", get(order::get_order))
        .route("/orders/:id/status", put(order::change_status))
        .route(
            "/medicines",
            get(inventory::list_medicines).post(inventory::create_medicine),
        )
        .route("/medicines/:id", put(inventory::update_medicine))
        .route("/medicines/:id/stock", put(inventory::set_stock))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_pharmacist,
        ))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::admin))
        .route("/inventory/alerts", get(inventory::alerts))
        .route(
            "/medicines",
            get(inventory::list_medicines).post(inventory::create_medicine),
        )
        .route(
            "/medicines/:id",
            put(inventory::update_medicine).delete(inventory::delete_medicine),
        )
        .route(
            "/pharmacists",
            get(account::list_pharmacists).post(account::create_pharmacist),
        )
        .route(
            "/pharmacists/:id",
            put(account::update_pharmacist).delete(account::delete_pharmacist),
        )
        .route("/patients", get(account::list_patients))
        .route("/patients/:id", delete(account::delete_patient))
        .route(
            "/pharmacies",
            get(catalog::list_pharmacies).post(catalog::create_pharmacy),
        )
        .route(
            "/pharmacies/:id",
            put(catalog::update_pharmacy).delete(catalog::delete_pharmacy),
        )
        .route(
            "/branches",
            get(catalog::list_branches).post(catalog::create_branch),
        )
        .route(
            "/branches/:id",
            put(catalog::update_branch).delete(catalog::delete_branch),
        )
        .route("/orders", get(order::list_orders))
        .route("/orders/:id", get(order::get_order))
        .route("/orders/:id/status", put(order::change_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_server_error() {
        log::error!("{} {} -> {} ({:?})", method, path, status, elapsed);
    } else {
        log::info!("{} {} -> {} ({:?})", method, path, status, elapsed);
    }
    response
}
