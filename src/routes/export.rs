//! Workbook export route
//!
//! Runs the same query pipeline as the dashboard list, projects the
//! filtered cases through the selected export mode, and streams back a
//! real workbook.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::export::{project, Cell, ExportMode, Sheet};
use crate::error::ApiError;

use super::cases::{query_cases, CaseListParams};

/// Export query parameters: the mode plus the same filter axes as the
/// dashboard list.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub mode: ExportMode,
    #[serde(default)]
    pub status: crate::domain::dashboard::StatusFilter,
    #[serde(default)]
    pub stations: Option<String>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub report_month: String,
    #[serde(default)]
    pub close_month: String,
    #[serde(default)]
    pub special_formula: Option<crate::domain::dashboard::SpecialFormula>,
}

impl ExportParams {
    fn list_params(&self) -> CaseListParams {
        CaseListParams {
            status: self.status,
            stations: self.stations.clone(),
            search: self.search.clone(),
            report_month: self.report_month.clone(),
            close_month: self.close_month.clone(),
            special_formula: self.special_formula,
        }
    }
}

fn build_workbook(sheet: &Sheet) -> Result<Vec<u8>, ApiError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&sheet.name)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Workbook error: {e}")))?;

    for (col, title) in sheet.headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *title)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Workbook error: {e}")))?;
    }
    for (row_idx, row) in sheet.rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let result = match cell {
                Cell::Text(text) => {
                    worksheet.write_string(row_idx as u32 + 1, col as u16, text)
                }
                Cell::Number(value) => {
                    worksheet.write_number(row_idx as u32 + 1, col as u16, *value)
                }
                Cell::Empty => continue,
            };
            result.map_err(|e| ApiError::Internal(anyhow::anyhow!("Workbook error: {e}")))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Workbook error: {e}")))
}

/// GET /export
///
/// One sheet per export mode, projected from the currently filtered
/// case list.
pub async fn export_workbook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let cases = query_cases(&state, &params.list_params()).await?;
    let sheet = project(params.mode, &cases);
    let bytes = build_workbook(&sheet)?;

    let filename = format!(
        "{}_{}.xlsx",
        params.mode.file_stem(),
        Utc::now().format("%Y-%m-%d")
    );
    tracing::info!(mode = ?params.mode, rows = sheet.rows.len(), "Workbook exported");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
