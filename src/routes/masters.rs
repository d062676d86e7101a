//! Master reference data routes
//!
//! Imports and lookups for the address master (multi-sheet workbook
//! flattened into one tagged list) and the price master (fixed-offset
//! catalog table). Both imports replace the stored documents wholesale
//! and drop the corresponding cache key.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::import::{
    flatten_address_sheets, parse_price_rows, AddressRecord, PriceRecord, SheetRows,
};
use crate::error::ApiError;
use crate::services::cache::keys;
use crate::services::masters;

/// Lookup results are capped the way the form's dropdown is.
const LOOKUP_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct AddressImportRequest {
    pub sheets: Vec<SheetRows>,
}

#[derive(Debug, Serialize)]
pub struct AddressImportResponse {
    pub imported: usize,
    pub chunk_count: usize,
    pub sheets: Vec<String>,
}

/// POST /masters/addresses/import
pub async fn import_addresses(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Json(req): Json<AddressImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sheet_names: Vec<String> = req.sheets.iter().map(|s| s.name.clone()).collect();
    let records = flatten_address_sheets(&req.sheets);

    let manifest =
        masters::save_address_master(&state.db, &state.settings.app_id, &records, &sheet_names)
            .await?;
    let _ = state
        .cache
        .delete(&keys::address_master(&state.settings.app_id))
        .await;

    tracing::info!(
        records = records.len(),
        chunks = manifest.chunk_count,
        "Address master imported"
    );

    Ok(Json(DataResponse::new(AddressImportResponse {
        imported: records.len(),
        chunk_count: manifest.chunk_count,
        sheets: sheet_names,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AddressLookupParams {
    #[serde(default)]
    pub station: String,
    #[serde(default)]
    pub search: String,
}

async fn address_master(state: &AppState) -> Result<Vec<AddressRecord>, ApiError> {
    let key = keys::address_master(&state.settings.app_id);
    if let Some(cached) = state.cache.get::<Vec<AddressRecord>>(&key).await {
        return Ok(cached);
    }
    let records = masters::load_address_master(&state.db, &state.settings.app_id).await?;
    if let Err(e) = state.cache.set(&key, &records).await {
        tracing::warn!(error = %e, "Failed to cache address master");
    }
    Ok(records)
}

/// GET /masters/addresses
///
/// Address lookup for the form: restricted to the selected station when
/// one is given, matched against the address and tenant columns, sorted
/// by address, capped at fifty results.
pub async fn lookup_addresses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AddressLookupParams>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let records = address_master(&state).await?;
    let needle = params.search.trim();

    let mut hits: Vec<AddressRecord> = records
        .into_iter()
        .filter(|r| params.station.is_empty() || r.source_station == params.station)
        .filter(|r| {
            if needle.is_empty() {
                return true;
            }
            let address = r.text(&["建物門牌", "門牌"]);
            let name = r.text(&["承租人", "姓名"]);
            address.contains(needle) || name.contains(needle)
        })
        .collect();
    hits.sort_by(|a, b| {
        a.text(&["建物門牌", "門牌"])
            .cmp(&b.text(&["建物門牌", "門牌"]))
    });
    hits.truncate(LOOKUP_LIMIT);

    Ok(Json(DataResponse::new(hits)))
}

#[derive(Debug, Deserialize)]
pub struct PriceImportRequest {
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct PriceImportResponse {
    pub imported: usize,
}

/// POST /masters/prices/import
pub async fn import_prices(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Json(req): Json<PriceImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let records = parse_price_rows(&req.rows);
    masters::save_price_master(&state.db, &state.settings.app_id, &records).await?;
    let _ = state
        .cache
        .delete(&keys::price_master(&state.settings.app_id))
        .await;

    tracing::info!(records = records.len(), "Price master imported");

    Ok(Json(DataResponse::new(PriceImportResponse {
        imported: records.len(),
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceLookupParams {
    #[serde(default)]
    pub search: String,
}

/// GET /masters/prices
///
/// Price catalog lookup by name or catalog id.
pub async fn lookup_prices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PriceLookupParams>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let key = keys::price_master(&state.settings.app_id);
    let records = match state.cache.get::<Vec<PriceRecord>>(&key).await {
        Some(cached) => cached,
        None => {
            let loaded =
                masters::load_price_master(&state.db, &state.settings.app_id).await?;
            if let Err(e) = state.cache.set(&key, &loaded).await {
                tracing::warn!(error = %e, "Failed to cache price master");
            }
            loaded
        }
    };

    let needle = params.search.trim();
    let hits: Vec<PriceRecord> = records
        .into_iter()
        .filter(|r| needle.is_empty() || r.name.contains(needle) || r.id.contains(needle))
        .collect();

    Ok(Json(DataResponse::new(hits)))
}
