//! Dashboard filtering
//!
//! The query contract pushes only the status filter and the station
//! membership down to the database; everything else here runs in-process
//! over the server-filtered result set, exactly as the dashboard applies
//! it: free-text search, report/close month ranges, the special-formula
//! presets, and the report-date sort with missing dates last.

use serde::Deserialize;
use uuid::Uuid;

use super::cases::{CaseStatus, RepairCase, RepairType};

/// The station membership filter is capped; exceeding it is a client
/// error rejected before any query is issued.
pub const MAX_STATION_FILTERS: usize = 10;

/// A persisted case together with its document id.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredCase {
    pub id: Uuid,
    #[serde(flatten)]
    pub case: RepairCase,
}

/// Status axis of the dashboard filter.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// No status restriction.
    #[default]
    All,
    /// Cases that have not been reported yet (status unset).
    Pending,
    /// Everything not yet closed.
    Open,
    Reported,
    Closed,
    Replaced,
    Rejected,
}

impl StatusFilter {
    pub fn matches(&self, status: CaseStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => status == CaseStatus::Unset,
            Self::Open => status != CaseStatus::Closed,
            Self::Reported => status == CaseStatus::Reported,
            Self::Closed => status == CaseStatus::Closed,
            Self::Replaced => status == CaseStatus::Replaced,
            Self::Rejected => status == CaseStatus::Rejected,
        }
    }
}

/// The six month-window presets. All take the report month and close
/// month boundaries from the filter.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpecialFormula {
    CurrentCompleted,
    PriorCompleted,
    CurrentTracking,
    PriorTracking,
    InContractCompleted,
    InternalControl,
}

/// In-process portion of a dashboard query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub report_month: String,
    #[serde(default)]
    pub close_month: String,
    #[serde(default)]
    pub special_formula: Option<SpecialFormula>,
}

fn matches_search(case: &RepairCase, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let hay = |s: &str| s.to_lowercase().contains(&needle);
    hay(&case.address)
        || hay(&case.tenant)
        || hay(&case.station)
        || hay(&case.jdm_control.case_number)
        || hay(&case.quote_title)
        || case.repair_items.iter().any(|item| hay(&item.name))
}

/// Close date falls inside [report month, close month]; the upper bound
/// is the month string padded with "-31", matching how the dashboard
/// compares ISO date strings.
fn close_in_window(close_date: &str, report_month: &str, close_month: &str) -> bool {
    let upper = format!("{close_month}-31");
    !close_date.is_empty() && close_date >= report_month && close_date <= upper.as_str()
}

fn matches_formula(
    case: &RepairCase,
    formula: SpecialFormula,
    report_month: &str,
    close_month: &str,
) -> bool {
    let report = case.jdm_control.report_date.as_str();
    let close = case.jdm_control.close_date.as_str();
    let status = case.jdm_control.status;
    match formula {
        SpecialFormula::CurrentCompleted => {
            report.starts_with(report_month)
                && close_in_window(close, report_month, close_month)
                && status == CaseStatus::Closed
                && case.repair_type == RepairType::OutOfContract
        }
        SpecialFormula::PriorCompleted => {
            !report.is_empty()
                && report < report_month
                && close_in_window(close, report_month, close_month)
                && status == CaseStatus::Closed
                && case.repair_type == RepairType::OutOfContract
        }
        SpecialFormula::CurrentTracking => {
            report.starts_with(report_month)
                && close.is_empty()
                && status == CaseStatus::Reported
                && case.repair_type == RepairType::OutOfContract
        }
        SpecialFormula::PriorTracking => {
            !report.is_empty()
                && report < report_month
                && close.is_empty()
                && status == CaseStatus::Reported
                && case.repair_type == RepairType::OutOfContract
        }
        SpecialFormula::InContractCompleted => {
            report.starts_with(report_month)
                && close.starts_with(close_month)
                && status == CaseStatus::Closed
                && case.repair_type == RepairType::InContract
        }
        SpecialFormula::InternalControl => {
            report >= report_month && close_in_window(close, report_month, close_month)
        }
    }
}

/// Apply the in-process filters and the report-date sort.
pub fn apply(mut cases: Vec<StoredCase>, filter: &DashboardFilter) -> Vec<StoredCase> {
    if !filter.search.trim().is_empty() {
        cases.retain(|c| matches_search(&c.case, filter.search.trim()));
    }

    match filter.special_formula {
        // Formula presets need both month boundaries; otherwise they are
        // ignored and the plain month filters apply.
        Some(formula) if !filter.report_month.is_empty() && !filter.close_month.is_empty() => {
            cases.retain(|c| {
                matches_formula(&c.case, formula, &filter.report_month, &filter.close_month)
            });
        }
        _ => {
            if !filter.report_month.is_empty() {
                cases.retain(|c| {
                    c.case
                        .jdm_control
                        .report_date
                        .starts_with(&filter.report_month)
                });
            }
            if !filter.close_month.is_empty() {
                cases.retain(|c| {
                    c.case
                        .jdm_control
                        .close_date
                        .starts_with(&filter.close_month)
                });
            }
        }
    }

    cases.sort_by(|a, b| {
        let key = |c: &StoredCase| {
            if c.case.jdm_control.report_date.is_empty() {
                "9999-99-99".to_string()
            } else {
                c.case.jdm_control.report_date.clone()
            }
        };
        key(a).cmp(&key(b))
    });
    cases
}
