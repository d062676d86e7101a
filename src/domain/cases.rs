//! Repair case domain types
//!
//! The root `RepairCase` record and its sub-records, persisted as a single
//! JSON document per case.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Billing regime for a repair case.
///
/// In-contract cases incur a 5% service fee and are subject to the
/// same-day dual-submission rule; the wire values are the legacy
/// contract-clause numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RepairType {
    #[serde(rename = "2.1")]
    InContract,
    #[serde(rename = "2.2")]
    OutOfContract,
}

impl Default for RepairType {
    fn default() -> Self {
        Self::InContract
    }
}

/// Workflow status of a case in the external approval pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[serde(rename = "")]
    Unset,
    Reported,
    Closed,
    Replaced,
    Rejected,
}

impl Default for CaseStatus {
    fn default() -> Self {
        Self::Unset
    }
}

impl CaseStatus {
    /// Value stored in the server-filterable status column; matches the
    /// wire representation (empty for unset).
    pub fn column_value(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Reported => "reported",
            Self::Closed => "closed",
            Self::Replaced => "replaced",
            Self::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Reported => "reported",
            Self::Closed => "closed",
            Self::Replaced => "replaced",
            Self::Rejected => "rejected",
        }
    }
}

/// Outstanding-document identifiers (待補資料).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ChecklistItem {
    PhotoBefore,
    PhotoDuring,
    PhotoAfter,
    Quotation,
    Warranty,
    Invoice,
    BankCopy,
    SatisfactionForm,
}

/// Satisfaction survey outcome. Exactly one level (or none) is selected;
/// the score is the level's fixed point value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SatisfactionLevel {
    VerySatisfied,
    Satisfied,
    Neutral,
    NeedsImprovement,
    Dissatisfied,
    NotApplicable,
}

impl SatisfactionLevel {
    /// Fixed score for the level; `None` for the not-applicable terminal.
    pub fn score(&self) -> Option<i32> {
        match self {
            Self::VerySatisfied => Some(100),
            Self::Satisfied => Some(75),
            Self::Neutral => Some(50),
            Self::NeedsImprovement => Some(25),
            Self::Dissatisfied => Some(0),
            Self::NotApplicable => None,
        }
    }
}

/// Whether the first income item mirrors the computed quote totals or has
/// been manually overridden.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteLink {
    Linked,
    Manual,
}

impl Default for QuoteLink {
    fn default() -> Self {
        Self::Linked
    }
}

/// Quoted repair line item. Items drawn from the price master keep their
/// catalog id and are read-only except for quantity; manual items are
/// free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairItem {
    pub id: Uuid,
    #[serde(default)]
    pub catalog_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub is_manual: bool,
}

/// Expense record for bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CostItem {
    pub id: Uuid,
    #[serde(default)]
    pub contractor: String,
    #[serde(default)]
    pub work_description: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub billing_date: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: f64,
    #[serde(default)]
    pub voucher_number: String,
    #[serde(default)]
    pub remarks: String,
}

/// Income record for bookkeeping. The first item may be linked to the
/// computed quote totals (see [`QuoteLink`]).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IncomeItem {
    pub id: Uuid,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub receive_date: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub service_fee: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tax: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: f64,
    #[serde(default)]
    pub voucher_number: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub quote_link: QuoteLink,
}

/// Approval-workflow sub-record: the case number, five milestone dates
/// (ISO `YYYY-MM-DD` strings, empty when unset), status, outstanding
/// documents, and remarks.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JdmControl {
    #[serde(default)]
    pub case_number: String,
    #[serde(default)]
    pub report_date: String,
    #[serde(default)]
    pub report_submit_date: String,
    #[serde(default)]
    pub approval_date: String,
    #[serde(default)]
    pub close_date: String,
    #[serde(default)]
    pub close_submit_date: String,
    #[serde(default, deserialize_with = "checklist_set")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub remarks: String,
}

impl JdmControl {
    pub fn date(&self, field: DateField) -> &str {
        match field {
            DateField::ReportDate => &self.report_date,
            DateField::ReportSubmitDate => &self.report_submit_date,
            DateField::ApprovalDate => &self.approval_date,
            DateField::CloseDate => &self.close_date,
            DateField::CloseSubmitDate => &self.close_submit_date,
        }
    }
}

/// The five workflow dates in canonical sequence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    ReportDate,
    ReportSubmitDate,
    ApprovalDate,
    CloseDate,
    CloseSubmitDate,
}

impl DateField {
    pub const SEQUENCE: [DateField; 5] = [
        DateField::ReportDate,
        DateField::ReportSubmitDate,
        DateField::ApprovalDate,
        DateField::CloseDate,
        DateField::CloseSubmitDate,
    ];

    /// Human-readable label used in violation messages. Both submission
    /// milestones share the "submit date" label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReportDate => "report date",
            Self::ReportSubmitDate => "submit date",
            Self::ApprovalDate => "approval date",
            Self::CloseDate => "closure date",
            Self::CloseSubmitDate => "submit date",
        }
    }
}

/// The root repair case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairCase {
    #[serde(default)]
    pub station: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub repair_type: RepairType,
    #[serde(default)]
    pub report_date: String,
    #[serde(default)]
    pub is_sub_lease: bool,
    #[serde(default)]
    pub repair_items: Vec<RepairItem>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(default)]
    pub income_items: Vec<IncomeItem>,
    #[serde(default)]
    pub quote_title: String,
    #[serde(default)]
    pub site_description: String,
    #[serde(default)]
    pub construction_desc1: String,
    #[serde(default)]
    pub construction_desc2: String,
    #[serde(default)]
    pub completion_date: String,
    #[serde(default)]
    pub completion_desc1: String,
    #[serde(default)]
    pub completion_desc2: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_amount: f64,
    #[serde(default)]
    pub satisfaction_level: Option<SatisfactionLevel>,
    #[serde(default)]
    pub satisfaction_score: Option<i32>,
    #[serde(default)]
    pub jdm_control: JdmControl,
}

impl Default for RepairCase {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairCase {
    /// Fresh-form state: one blank cost row, one income row linked to the
    /// quote totals, and the canned narrative text a new case starts from.
    pub fn new() -> Self {
        Self {
            station: String::new(),
            address: String::new(),
            tenant: String::new(),
            phone: String::new(),
            repair_type: RepairType::InContract,
            report_date: String::new(),
            is_sub_lease: false,
            repair_items: Vec::new(),
            cost_items: vec![CostItem {
                id: Uuid::new_v4(),
                ..CostItem::default()
            }],
            income_items: vec![IncomeItem {
                id: Uuid::new_v4(),
                source: "晟晁".to_string(),
                quote_link: QuoteLink::Linked,
                ..IncomeItem::default()
            }],
            quote_title: String::new(),
            site_description: "收到承租人報修，請我方派員查看。".to_string(),
            construction_desc1: "經廠商檢測，。".to_string(),
            construction_desc2: String::new(),
            completion_date: String::new(),
            completion_desc1: "廠商將OOO更新，測試功能正常，完成修繕。".to_string(),
            completion_desc2: String::new(),
            total_amount: 0.0,
            satisfaction_level: None,
            satisfaction_score: None,
            jdm_control: JdmControl::default(),
        }
    }

    /// Select a satisfaction level (or clear it), keeping the score in
    /// lockstep with the level's fixed value.
    pub fn set_satisfaction(&mut self, level: Option<SatisfactionLevel>) {
        self.satisfaction_level = level;
        self.satisfaction_score = level.and_then(|l| l.score());
    }
}

/// Accepts a number, a numeric string, an empty string, or null; anything
/// non-numeric reads as 0. Matches how the source system treats blank
/// monetary and quantity inputs.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) if n.is_finite() => n,
        Raw::Num(_) | Raw::Null => 0.0,
        Raw::Text(s) => s.trim().parse().unwrap_or(0.0),
    })
}

/// Checklist identifiers carry set semantics; duplicates collapse on read.
fn checklist_set<'de, D>(deserializer: D) -> Result<Vec<ChecklistItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<ChecklistItem>::deserialize(deserializer)?;
    let mut out = Vec::with_capacity(raw.len());
    for item in raw {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_number_accepts_blank_and_text() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "lenient_number")]
            v: f64,
        }

        let cases = [
            (r#"{"v": 12.5}"#, 12.5),
            (r#"{"v": "300"}"#, 300.0),
            (r#"{"v": ""}"#, 0.0),
            (r#"{"v": "n/a"}"#, 0.0),
            (r#"{"v": null}"#, 0.0),
            (r#"{}"#, 0.0),
        ];
        for (json, expected) in cases {
            let probe: Probe = serde_json::from_str(json).unwrap();
            assert_eq!(probe.v, expected, "input {json}");
        }
    }

    #[test]
    fn checklist_deduplicates_on_read() {
        let json = r#"{"checklist": ["invoice", "invoice", "photo-before"]}"#;
        let jdm: JdmControl = serde_json::from_str(json).unwrap();
        assert_eq!(
            jdm.checklist,
            vec![ChecklistItem::Invoice, ChecklistItem::PhotoBefore]
        );
    }

    #[test]
    fn repair_type_uses_contract_clause_values() {
        assert_eq!(
            serde_json::to_string(&RepairType::InContract).unwrap(),
            "\"2.1\""
        );
        let parsed: RepairType = serde_json::from_str("\"2.2\"").unwrap();
        assert_eq!(parsed, RepairType::OutOfContract);
    }

    #[test]
    fn satisfaction_score_follows_level() {
        let mut case = RepairCase::new();
        case.set_satisfaction(Some(SatisfactionLevel::Satisfied));
        assert_eq!(case.satisfaction_score, Some(75));
        case.set_satisfaction(Some(SatisfactionLevel::NotApplicable));
        assert_eq!(case.satisfaction_score, None);
        case.set_satisfaction(None);
        assert_eq!(case.satisfaction_level, None);
    }

    #[test]
    fn fresh_case_has_seed_rows() {
        let case = RepairCase::new();
        assert_eq!(case.cost_items.len(), 1);
        assert_eq!(case.income_items.len(), 1);
        assert_eq!(case.income_items[0].quote_link, QuoteLink::Linked);
        assert!(case.repair_items.is_empty());
    }
}
