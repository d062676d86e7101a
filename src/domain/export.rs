//! Workbook export projections
//!
//! Each export mode projects a fixed, named set of columns from the
//! filtered case list into one sheet. The projections are pure; the
//! route layer turns the resulting sheet into an actual workbook.

use serde::Deserialize;

use super::cases::{RepairCase, RepairType, SatisfactionLevel};
use super::dashboard::StoredCase;

/// The four export modes of the dashboard.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    TrackingList,
    WorkReport,
    SatisfactionSurvey,
    InternalControl,
}

impl ExportMode {
    /// Sheet title, in the vocabulary of the exported reports.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::TrackingList => "待追蹤事項",
            Self::WorkReport => "工作提報單",
            Self::SatisfactionSurvey => "滿意度調查",
            Self::InternalControl => "內控管理",
        }
    }

    /// ASCII stem for the downloaded file name.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::TrackingList => "tracking_list",
            Self::WorkReport => "work_report",
            Self::SatisfactionSurvey => "satisfaction_survey",
            Self::InternalControl => "internal_control",
        }
    }
}

/// A single cell of the projected sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// A projected sheet: a header row plus data rows, all column-aligned.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

/// Report dates are exported slash-delimited.
fn slash_date(iso: &str) -> String {
    iso.replace('-', "/")
}

fn combined_description(case: &RepairCase) -> String {
    format!(
        "{} {}",
        case.site_description.trim(),
        case.construction_desc1.trim()
    )
    .trim()
    .to_string()
}

fn satisfaction_label(level: Option<SatisfactionLevel>) -> &'static str {
    match level {
        Some(SatisfactionLevel::VerySatisfied) => "非常滿意",
        Some(SatisfactionLevel::Satisfied) => "滿意",
        Some(SatisfactionLevel::Neutral) => "普通",
        Some(SatisfactionLevel::NeedsImprovement) => "尚須改進",
        Some(SatisfactionLevel::Dissatisfied) => "不滿意",
        Some(SatisfactionLevel::NotApplicable) => "不需滿意度",
        None => "--",
    }
}

fn total_costs(case: &RepairCase) -> f64 {
    case.cost_items.iter().map(|c| c.amount).sum()
}

fn total_income(case: &RepairCase) -> f64 {
    case.income_items.iter().map(|i| i.amount).sum()
}

fn joined<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

/// Project the filtered case list into the sheet for the given mode.
///
/// The internal-control ledger additionally appends aggregate
/// cost/income/profit rows split by contract type, laid out as two
/// parallel label/value column groups beneath the data.
pub fn project(mode: ExportMode, cases: &[StoredCase]) -> Sheet {
    match mode {
        ExportMode::TrackingList => Sheet {
            name: mode.sheet_name().to_string(),
            headers: vec!["項次", "案號", "站別", "地址", "報修日期", "故障問題描述"],
            rows: cases
                .iter()
                .enumerate()
                .map(|(idx, c)| {
                    vec![
                        Cell::Number((idx + 1) as f64),
                        Cell::text(&c.case.jdm_control.case_number),
                        Cell::text(&c.case.station),
                        Cell::text(&c.case.address),
                        Cell::text(slash_date(&c.case.jdm_control.report_date)),
                        Cell::text(combined_description(&c.case)),
                    ]
                })
                .collect(),
        },
        ExportMode::WorkReport => Sheet {
            name: mode.sheet_name().to_string(),
            headers: vec!["案號", "站別", "地址", "故障描述", "報修日", "完工日"],
            rows: cases
                .iter()
                .map(|c| {
                    vec![
                        Cell::text(&c.case.jdm_control.case_number),
                        Cell::text(&c.case.station),
                        Cell::text(&c.case.address),
                        Cell::text(combined_description(&c.case)),
                        Cell::text(slash_date(&c.case.jdm_control.report_date)),
                        Cell::text(slash_date(&c.case.jdm_control.close_date)),
                    ]
                })
                .collect(),
        },
        ExportMode::SatisfactionSurvey => Sheet {
            name: mode.sheet_name().to_string(),
            headers: vec![
                "JDM系統案號",
                "捷運站點",
                "門牌",
                "施工說明",
                "滿意度分級",
                "滿意度分數",
                "類別",
            ],
            rows: cases
                .iter()
                .map(|c| {
                    vec![
                        Cell::text(&c.case.jdm_control.case_number),
                        Cell::text(&c.case.station),
                        Cell::text(&c.case.address),
                        Cell::text(combined_description(&c.case)),
                        Cell::text(satisfaction_label(c.case.satisfaction_level)),
                        match c.case.satisfaction_score {
                            Some(score) => Cell::Number(score as f64),
                            None => Cell::Empty,
                        },
                        Cell::text(match c.case.repair_type {
                            RepairType::InContract => "契約內",
                            RepairType::OutOfContract => "契約外",
                        }),
                    ]
                })
                .collect(),
        },
        ExportMode::InternalControl => {
            let mut rows: Vec<Vec<Cell>> = cases
                .iter()
                .map(|c| {
                    vec![
                        Cell::text(&c.case.jdm_control.case_number),
                        Cell::text(&c.case.address),
                        Cell::Number(total_costs(&c.case)),
                        Cell::text(joined(
                            c.case.cost_items.iter().map(|i| i.contractor.as_str()),
                        )),
                        Cell::text(joined(
                            c.case.cost_items.iter().map(|i| i.invoice_number.as_str()),
                        )),
                        Cell::Number(total_income(&c.case)),
                        Cell::text(joined(
                            c.case.income_items.iter().map(|i| i.source.as_str()),
                        )),
                        Cell::text(joined(
                            c.case.income_items.iter().map(|i| i.receipt_number.as_str()),
                        )),
                    ]
                })
                .collect();

            rows.push(vec![Cell::Empty; 8]);
            rows.extend(summary_rows(cases));

            Sheet {
                name: mode.sheet_name().to_string(),
                headers: vec![
                    "案號",
                    "地址",
                    "費用合計",
                    "維修廠商",
                    "費用發票",
                    "收入合計",
                    "請款廠商",
                    "收入發票",
                ],
                rows,
            }
        }
    }
}

/// Aggregate cost/income/profit per contract type, as three rows with
/// the in-contract group on the left and the out-of-contract group on
/// the right.
fn summary_rows(cases: &[StoredCase]) -> Vec<Vec<Cell>> {
    let aggregate = |repair_type: RepairType| -> (f64, f64) {
        cases
            .iter()
            .filter(|c| c.case.repair_type == repair_type)
            .fold((0.0, 0.0), |(costs, income), c| {
                (costs + total_costs(&c.case), income + total_income(&c.case))
            })
    };
    let (in_costs, in_income) = aggregate(RepairType::InContract);
    let (out_costs, out_income) = aggregate(RepairType::OutOfContract);

    let row = |label: &str, left: f64, right: f64| {
        vec![
            Cell::text(format!("契約內{label}")),
            Cell::Number(left),
            Cell::Empty,
            Cell::Empty,
            Cell::text(format!("契約外{label}")),
            Cell::Number(right),
            Cell::Empty,
            Cell::Empty,
        ]
    };

    vec![
        row("費用合計", in_costs, out_costs),
        row("收入合計", in_income, out_income),
        row("損益", in_income - in_costs, out_income - out_costs),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cases::{CostItem, IncomeItem};
    use uuid::Uuid;

    fn stored(repair_type: RepairType, cost: f64, income: f64) -> StoredCase {
        let mut case = RepairCase::new();
        case.repair_type = repair_type;
        case.jdm_control.case_number = "JDM-1".to_string();
        case.jdm_control.report_date = "2024-03-05".to_string();
        case.cost_items = vec![CostItem {
            id: Uuid::new_v4(),
            contractor: "大同水電".to_string(),
            amount: cost,
            ..CostItem::default()
        }];
        case.income_items = vec![IncomeItem {
            id: Uuid::new_v4(),
            source: "晟晁".to_string(),
            amount: income,
            ..IncomeItem::default()
        }];
        StoredCase {
            id: Uuid::new_v4(),
            case,
        }
    }

    #[test]
    fn tracking_list_numbers_rows_and_reformats_dates() {
        let sheet = project(
            ExportMode::TrackingList,
            &[stored(RepairType::InContract, 0.0, 0.0)],
        );
        assert_eq!(sheet.name, "待追蹤事項");
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][0], Cell::Number(1.0));
        assert_eq!(sheet.rows[0][4], Cell::Text("2024/03/05".to_string()));
    }

    #[test]
    fn satisfaction_survey_uses_canonical_labels() {
        let mut entry = stored(RepairType::OutOfContract, 0.0, 0.0);
        entry.case.set_satisfaction(Some(SatisfactionLevel::Neutral));
        let sheet = project(ExportMode::SatisfactionSurvey, &[entry]);
        assert_eq!(sheet.rows[0][4], Cell::Text("普通".to_string()));
        assert_eq!(sheet.rows[0][5], Cell::Number(50.0));
        assert_eq!(sheet.rows[0][6], Cell::Text("契約外".to_string()));
    }

    #[test]
    fn missing_satisfaction_exports_placeholder() {
        let sheet = project(
            ExportMode::SatisfactionSurvey,
            &[stored(RepairType::InContract, 0.0, 0.0)],
        );
        assert_eq!(sheet.rows[0][4], Cell::Text("--".to_string()));
        assert_eq!(sheet.rows[0][5], Cell::Empty);
    }

    #[test]
    fn internal_control_appends_contract_type_summaries() {
        let cases = vec![
            stored(RepairType::InContract, 100.0, 300.0),
            stored(RepairType::OutOfContract, 50.0, 80.0),
            stored(RepairType::OutOfContract, 25.0, 40.0),
        ];
        let sheet = project(ExportMode::InternalControl, &cases);

        // 3 data rows, one spacer, 3 summary rows.
        assert_eq!(sheet.rows.len(), 7);
        let costs_row = &sheet.rows[4];
        assert_eq!(costs_row[0], Cell::Text("契約內費用合計".to_string()));
        assert_eq!(costs_row[1], Cell::Number(100.0));
        assert_eq!(costs_row[4], Cell::Text("契約外費用合計".to_string()));
        assert_eq!(costs_row[5], Cell::Number(75.0));

        let profit_row = &sheet.rows[6];
        assert_eq!(profit_row[1], Cell::Number(200.0));
        assert_eq!(profit_row[5], Cell::Number(45.0));
    }

    #[test]
    fn every_row_matches_header_width() {
        let cases = vec![stored(RepairType::InContract, 10.0, 20.0)];
        for mode in [
            ExportMode::TrackingList,
            ExportMode::WorkReport,
            ExportMode::SatisfactionSurvey,
            ExportMode::InternalControl,
        ] {
            let sheet = project(mode, &cases);
            for row in &sheet.rows {
                assert_eq!(row.len(), sheet.headers.len(), "mode {:?}", mode);
            }
        }
    }
}
