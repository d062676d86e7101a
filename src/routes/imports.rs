//! Historical case bulk import
//!
//! Accepts the parsed rows of a legacy tracking spreadsheet and loads
//! them as case documents, one case per row. Rows are transformed
//! up-front; if any row fails to transform the whole import aborts
//! before a single write. The upload itself is batched with no
//! atomicity across batches: a failure partway is surfaced and the
//! documents already written remain.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::cases::RepairCase;
use crate::domain::import::case_from_history_row;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CaseImportRequest {
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct CaseImportResponse {
    pub imported: usize,
}

/// POST /imports/cases
pub async fn import_cases(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<CaseImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cases: Vec<RepairCase> = req.rows.iter().map(case_from_history_row).collect();

    let mut imported = 0usize;
    for batch in cases.chunks(state.settings.import_batch_size) {
        insert_batch(&state, batch, auth.user_id).await.map_err(|e| {
            tracing::error!(
                error = %e,
                imported,
                total = cases.len(),
                "Bulk case import failed partway; earlier batches remain"
            );
            e
        })?;
        imported += batch.len();
    }

    tracing::info!(imported, "Historical cases imported");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(CaseImportResponse { imported })),
    ))
}

async fn insert_batch(
    state: &AppState,
    batch: &[RepairCase],
    author: Uuid,
) -> Result<(), ApiError> {
    let mut ids = Vec::with_capacity(batch.len());
    let mut statuses = Vec::with_capacity(batch.len());
    let mut stations = Vec::with_capacity(batch.len());
    let mut report_dates = Vec::with_capacity(batch.len());
    let mut docs = Vec::with_capacity(batch.len());

    for case in batch {
        ids.push(Uuid::new_v4());
        statuses.push(case.jdm_control.status.column_value().to_string());
        stations.push(case.station.clone());
        report_dates.push(case.jdm_control.report_date.clone());
        docs.push(
            serde_json::to_value(case).map_err(|e| {
                ApiError::Internal(anyhow::anyhow!("Failed to serialize case: {e}"))
            })?,
        );
    }

    sqlx::query(
        r#"
        INSERT INTO repair_cases (id, app_id, status, station, report_date, doc, created_by, updated_at)
        SELECT id, $2, status, station, report_date, doc, $7, NOW()
        FROM UNNEST($1::uuid[], $3::text[], $4::text[], $5::text[], $6::jsonb[])
            AS t(id, status, station, report_date, doc)
        "#,
    )
    .bind(&ids)
    .bind(&state.settings.app_id)
    .bind(&statuses)
    .bind(&stations)
    .bind(&report_dates)
    .bind(&docs)
    .bind(author)
    .execute(&state.db)
    .await?;

    Ok(())
}
