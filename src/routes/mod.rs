pub mod auth;
pub mod cases;
pub mod export;
pub mod health;
pub mod imports;
pub mod masters;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/auth/signin", post(auth::sign_in))
        // Session
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/session", get(auth::get_session))
        // Cases
        .route("/cases", post(cases::create_case))
        .route("/cases", get(cases::list_cases))
        .route("/cases/validate", post(cases::validate_case))
        .route("/cases/:case_id", get(cases::get_case))
        .route("/cases/:case_id", put(cases::update_case))
        .route("/cases/:case_id", delete(cases::delete_case))
        .route("/cases/:case_id/status", post(cases::change_status))
        // Master reference data
        .route("/masters/addresses/import", post(masters::import_addresses))
        .route("/masters/addresses", get(masters::lookup_addresses))
        .route("/masters/prices/import", post(masters::import_prices))
        .route("/masters/prices", get(masters::lookup_prices))
        // Bulk import and export
        .route("/imports/cases", post(imports::import_cases))
        .route("/export", get(export::export_workbook))
}
