//! Repair case routes
//!
//! CRUD against the case collection, the dashboard query, draft
//! validation, and status transitions. The query contract pushes only
//! the status filter and the station membership (capped at ten) down to
//! the database; every other filter runs in-process over the
//! server-filtered set.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::cases::{CaseStatus, RepairCase};
use crate::domain::dashboard::{
    self, DashboardFilter, StatusFilter, StoredCase, MAX_STATION_FILTERS,
};
use crate::domain::quote::{self, FinancialStats, QuoteSummary};
use crate::domain::validate::date_violations;
use crate::domain::workflow::{
    self, check_save, ControlField, TransitionPlan,
};
use crate::error::ApiError;

/// Database row for a case document
#[derive(Debug, sqlx::FromRow)]
struct CaseRow {
    id: Uuid,
    doc: serde_json::Value,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

impl CaseRow {
    fn into_stored(self) -> Result<StoredCase, ApiError> {
        let case: RepairCase = serde_json::from_value(self.doc)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Malformed case document: {e}")))?;
        Ok(StoredCase { id: self.id, case })
    }
}

/// Response for a persisted case
#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub case: RepairCase,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Run the save gate and stamp the recomputed quote total. Shared by
/// create and update.
fn prepare_for_save(case: &mut RepairCase) -> Result<(), ApiError> {
    quote::sync_linked_income(case);
    if let Err(blocked) = check_save(case) {
        let violations = date_violations(&case.jdm_control, case.repair_type);
        return Err(ApiError::validation(blocked.message, violations));
    }
    let summary = quote::quote_summary(&case.repair_items, case.repair_type);
    case.total_amount = summary.total;
    Ok(())
}

fn case_doc(case: &RepairCase) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(case)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to serialize case: {e}")))
}

/// POST /cases
///
/// Create a case through the save gate; the server assigns the id, the
/// modification timestamp, and the author.
pub async fn create_case(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(mut case): Json<RepairCase>,
) -> Result<impl IntoResponse, ApiError> {
    prepare_for_save(&mut case)?;

    let row = sqlx::query_as::<_, CaseRow>(
        r#"
        INSERT INTO repair_cases (app_id, status, station, report_date, doc, created_by, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        RETURNING id, doc, created_by, updated_at
        "#,
    )
    .bind(&state.settings.app_id)
    .bind(case.jdm_control.status.column_value())
    .bind(&case.station)
    .bind(&case.jdm_control.report_date)
    .bind(case_doc(&case)?)
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    let response = CaseResponse {
        id: row.id,
        case,
        created_by: row.created_by,
        updated_at: row.updated_at,
    };
    Ok((StatusCode::CREATED, Json(DataResponse::new(response))))
}

/// PUT /cases/:case_id
///
/// Update a case in place through the same save gate.
pub async fn update_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    auth: RequireAuth,
    Json(mut case): Json<RepairCase>,
) -> Result<impl IntoResponse, ApiError> {
    prepare_for_save(&mut case)?;

    let row = sqlx::query_as::<_, CaseRow>(
        r#"
        UPDATE repair_cases SET
            status = $3,
            station = $4,
            report_date = $5,
            doc = $6,
            created_by = $7,
            updated_at = NOW()
        WHERE id = $1 AND app_id = $2
        RETURNING id, doc, created_by, updated_at
        "#,
    )
    .bind(case_id)
    .bind(&state.settings.app_id)
    .bind(case.jdm_control.status.column_value())
    .bind(&case.station)
    .bind(&case.jdm_control.report_date)
    .bind(case_doc(&case)?)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Case not found"))?;

    let response = CaseResponse {
        id: row.id,
        case,
        created_by: row.created_by,
        updated_at: row.updated_at,
    };
    Ok(Json(DataResponse::new(response)))
}

/// GET /cases/:case_id
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, CaseRow>(
        "SELECT id, doc, created_by, updated_at FROM repair_cases WHERE id = $1 AND app_id = $2",
    )
    .bind(case_id)
    .bind(&state.settings.app_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Case not found"))?;

    let created_by = row.created_by;
    let updated_at = row.updated_at;
    let stored = row.into_stored()?;
    Ok(Json(DataResponse::new(CaseResponse {
        id: stored.id,
        case: stored.case,
        created_by,
        updated_at,
    })))
}

/// DELETE /cases/:case_id
///
/// Deletion is explicit and irreversible.
pub async fn delete_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM repair_cases WHERE id = $1 AND app_id = $2")
        .bind(case_id)
        .bind(&state.settings.app_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Case not found"));
    }

    Ok(Json(MessageResponse::new("Case deleted")))
}

/// Dashboard query parameters. `stations` is comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct CaseListParams {
    #[serde(default)]
    pub status: StatusFilter,
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

impl CaseListParams {
    fn dashboard_filter(&self) -> DashboardFilter {
        DashboardFilter {
            search: self.search.clone(),
            report_month: self.report_month.clone(),
            close_month: self.close_month.clone(),
            special_formula: self.special_formula,
        }
    }
}

/// Fetch the server-filtered case set for a dashboard query. Shared with
/// the export route so both see the same list.
pub(crate) async fn query_cases(
    state: &AppState,
    params: &CaseListParams,
) -> Result<Vec<StoredCase>, ApiError> {
    let stations: Vec<String> = params
        .stations
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if stations.len() > MAX_STATION_FILTERS {
        return Err(ApiError::bad_request(format!(
            "at most {MAX_STATION_FILTERS} stations may be filtered at once"
        )));
    }

    let mut sql = String::from(
        "SELECT id, doc, created_by, updated_at FROM repair_cases WHERE app_id = $1",
    );
    match params.status {
        StatusFilter::All => {}
        StatusFilter::Pending => sql.push_str(" AND status = ''"),
        StatusFilter::Open => sql.push_str(" AND status <> 'closed'"),
        StatusFilter::Reported => sql.push_str(" AND status = 'reported'"),
        StatusFilter::Closed => sql.push_str(" AND status = 'closed'"),
        StatusFilter::Replaced => sql.push_str(" AND status = 'replaced'"),
        StatusFilter::Rejected => sql.push_str(" AND status = 'rejected'"),
    }
    if !stations.is_empty() {
        sql.push_str(" AND station = ANY($2)");
    }

    let query = sqlx::query_as::<_, CaseRow>(&sql).bind(&state.settings.app_id);
    let rows = if stations.is_empty() {
        query.fetch_all(&state.db).await?
    } else {
        query.bind(&stations).fetch_all(&state.db).await?
    };

    let cases = rows
        .into_iter()
        .map(CaseRow::into_stored)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dashboard::apply(cases, &params.dashboard_filter()))
}

/// GET /cases
pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CaseListParams>,
    _auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let cases = query_cases(&state, &params).await?;
    Ok(Json(DataResponse::new(cases)))
}

/// Validation report for a draft record: totals, aggregate violations,
/// and per-field highlight flags, without persisting anything.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub quote: QuoteSummary,
    pub financials: FinancialStats,
    pub violations: Vec<String>,
    pub field_flags: BTreeMap<&'static str, bool>,
    pub save_blocked: Option<String>,
}

/// POST /cases/validate
pub async fn validate_case(
    State(_state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Json(mut case): Json<RepairCase>,
) -> Result<impl IntoResponse, ApiError> {
    quote::sync_linked_income(&mut case);

    let fields: [(&'static str, ControlField); 6] = [
        ("report_date", ControlField::ReportDate),
        ("report_submit_date", ControlField::ReportSubmitDate),
        ("approval_date", ControlField::ApprovalDate),
        ("close_date", ControlField::CloseDate),
        ("close_submit_date", ControlField::CloseSubmitDate),
        ("case_number", ControlField::CaseNumber),
    ];
    let field_flags = fields
        .into_iter()
        .map(|(name, field)| {
            (
                name,
                workflow::field_flag(field, &case.jdm_control, case.repair_type),
            )
        })
        .collect();

    let report = ValidationReport {
        quote: quote::quote_summary(&case.repair_items, case.repair_type),
        financials: quote::financial_stats(&case),
        violations: date_violations(&case.jdm_control, case.repair_type),
        field_flags,
        save_blocked: check_save(&case).err().map(|b| b.message),
    };
    Ok(Json(DataResponse::new(report)))
}

/// Status transition request. Transitions with checklist side effects
/// are applied only when `confirmed` is set; otherwise the plan comes
/// back for the client to confirm.
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub target: CaseStatus,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub applied: bool,
    pub plan: TransitionPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<CaseResponse>,
}

/// POST /cases/:case_id/status
///
/// All transitions are legal; the save gate is what blocks an
/// unexplained replaced/rejected record later. Entering reported or
/// closed mutates the checklist and therefore requires confirmation.
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<StatusChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, CaseRow>(
        "SELECT id, doc, created_by, updated_at FROM repair_cases WHERE id = $1 AND app_id = $2",
    )
    .bind(case_id)
    .bind(&state.settings.app_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Case not found"))?;

    let mut stored = row.into_stored()?;
    let plan = workflow::plan_transition(stored.case.jdm_control.status, req.target);

    if plan.requires_confirmation && !req.confirmed {
        return Ok(Json(DataResponse::new(StatusChangeResponse {
            applied: false,
            plan,
            case: None,
        })));
    }

    workflow::apply_transition(&mut stored.case.jdm_control, &plan);

    let row = sqlx::query_as::<_, CaseRow>(
        r#"
        UPDATE repair_cases SET
            status = $3,
            doc = $4,
            updated_at = NOW()
        WHERE id = $1 AND app_id = $2
        RETURNING id, doc, created_by, updated_at
        "#,
    )
    .bind(case_id)
    .bind(&state.settings.app_id)
    .bind(stored.case.jdm_control.status.column_value())
    .bind(case_doc(&stored.case)?)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        case_id = %case_id,
        user_id = %auth.user_id,
        status = stored.case.jdm_control.status.label(),
        "Case status changed"
    );

    Ok(Json(DataResponse::new(StatusChangeResponse {
        applied: true,
        plan,
        case: Some(CaseResponse {
            id: row.id,
            case: stored.case,
            created_by: row.created_by,
            updated_at: row.updated_at,
        }),
    })))
}
