//! Bulk import transforms
//!
//! Pure mappings from parsed spreadsheet rows to records, for the three
//! one-shot import kinds: the address master, the price master, and the
//! historical case bulk-load. Binary workbook decoding happens on the
//! client; these functions receive the already-parsed rows.
//!
//! The historical transform carries the messy parts of the legacy data:
//! mixed date representations (Excel serials, slash/dash/dot strings with
//! 2/3/4-digit years on the traditional calendar), voucher codes embedded
//! in vendor names, and tax-inclusive amounts that need a pre-tax
//! back-calculation.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use rust_decimal::prelude::*;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

use super::cases::{
    CaseStatus, CostItem, IncomeItem, QuoteLink, RepairCase, RepairItem, RepairType,
    SatisfactionLevel,
};

/// One worksheet from a parsed workbook, rows as raw cell arrays.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SheetRows {
    pub name: String,
    pub rows: Vec<Vec<Value>>,
}

/// A flattened address-master record tagged with its source sheet.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddressRecord {
    pub uid: String,
    pub source_station: String,
    pub fields: Map<String, Value>,
}

impl AddressRecord {
    /// First non-empty text among the given header keys.
    pub fn text(&self, keys: &[&str]) -> String {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .map(cell_text)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

/// A price-master catalog entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PriceRecord {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub price: f64,
}

fn address_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("門牌|地址").expect("static pattern"))
}

fn legacy_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2,4})[-/.](\d{1,2})[-/.](\d{1,2})").expect("static pattern")
    })
}

fn serial_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(\.\d+)?$").expect("static pattern"))
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static pattern"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn cell_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Flatten every sheet of an address workbook into one record list.
///
/// Per sheet, the header row is the first row containing a cell matching
/// 門牌 or 地址 (falling back to the first row); each data row becomes a
/// string-keyed record tagged with the sheet name and a synthetic uid of
/// sheet name, row index, and a random component.
pub fn flatten_address_sheets(sheets: &[SheetRows]) -> Vec<AddressRecord> {
    let mut all = Vec::new();
    for sheet in sheets {
        if sheet.rows.is_empty() {
            continue;
        }
        let header_idx = sheet
            .rows
            .iter()
            .position(|row| row.iter().any(|c| address_header_re().is_match(&cell_text(c))))
            .unwrap_or(0);
        let headers: Vec<String> = sheet.rows[header_idx].iter().map(cell_text).collect();

        for (row_idx, row) in sheet.rows[header_idx + 1..].iter().enumerate() {
            let mut fields = Map::new();
            for (col, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                fields.insert(
                    header.clone(),
                    row.get(col).cloned().unwrap_or(Value::String(String::new())),
                );
            }
            all.push(AddressRecord {
                uid: format!("{}-{}-{}", sheet.name, row_idx, Uuid::new_v4()),
                source_station: sheet.name.clone(),
                fields,
            });
        }
    }
    all
}

/// Parse the fixed-offset price-master table: the first four rows are a
/// header band; columns 1, 2, and 6 carry the catalog id, name, and unit
/// price. Rows without a name are discarded.
pub fn parse_price_rows(rows: &[Vec<Value>]) -> Vec<PriceRecord> {
    rows.iter()
        .skip(4)
        .map(|row| PriceRecord {
            id: row.get(1).map(cell_text).unwrap_or_default(),
            name: row.get(2).map(cell_text).unwrap_or_default(),
            unit: "式".to_string(),
            price: cell_number(row.get(6)),
        })
        .filter(|record| !record.name.is_empty())
        .collect()
}

/// Outcome of normalizing one heterogeneous date cell: the ISO date (or
/// empty when nothing parsed) and any trailing non-date text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: String,
    pub note: String,
}

/// Normalize a legacy date cell to ISO `YYYY-MM-DD`.
///
/// Three shapes occur in the source data:
/// - a 5-digit number is an Excel date serial (days since 1899-12-30);
/// - a delimited string with a 2/3/4-digit year: 2-digit years are
///   2000-relative, 3-digit years (and values below 111) are
///   traditional-calendar years needing a +1911 offset;
/// - anything else is not a date, and the whole text becomes the note.
pub fn normalize_legacy_date(raw: &Value) -> ParsedDate {
    let s = cell_text(raw);
    if s.is_empty() {
        return ParsedDate {
            date: String::new(),
            note: String::new(),
        };
    }

    if serial_re().is_match(&s) {
        let serial = s.parse::<f64>().unwrap_or(0.0).trunc() as i64;
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch");
        if let Some(date) = epoch.checked_add_signed(Duration::days(serial)) {
            return ParsedDate {
                date: date.format("%Y-%m-%d").to_string(),
                note: String::new(),
            };
        }
    }

    if let Some(caps) = legacy_date_re().captures(&s) {
        let year_token = &caps[1];
        let mut year: i32 = year_token.parse().unwrap_or(0);
        if year_token.len() == 2 {
            year += 2000;
        } else if year_token.len() == 3 || year < 111 {
            year += 1911;
        }
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        let note = s.replacen(&caps[0], "", 1).trim().to_string();
        return ParsedDate {
            date: format!("{year:04}-{month:02}-{day:02}"),
            note,
        };
    }

    ParsedDate {
        date: String::new(),
        note: s,
    }
}

/// Split a leading/trailing numeric voucher code out of a combined
/// vendor-plus-number text. Returns the cleaned vendor name and the code.
pub fn extract_voucher(vendor: &str) -> (String, String) {
    match digit_run_re().find(vendor) {
        Some(m) => {
            let voucher = m.as_str().to_string();
            let cleaned = vendor.replacen(m.as_str(), "", 1);
            let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            (cleaned.trim().to_string(), voucher)
        }
        None => (vendor.trim().to_string(), String::new()),
    }
}

/// Back-calculate a pre-tax amount from a tax-inclusive one (5% tax,
/// rounded half-up).
pub fn pre_tax_amount(tax_inclusive: f64) -> f64 {
    let amount = Decimal::from_f64(tax_inclusive).unwrap_or_default();
    let divisor = Decimal::new(105, 2);
    (amount / divisor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// The historical export uses one flag column per satisfaction label;
/// two legacy labels fold into the canonical vocabulary.
const SATISFACTION_COLUMNS: [(&str, SatisfactionLevel); 5] = [
    ("非常滿意", SatisfactionLevel::VerySatisfied),
    ("滿意", SatisfactionLevel::Satisfied),
    ("尚可", SatisfactionLevel::Neutral),
    ("需改進", SatisfactionLevel::NeedsImprovement),
    ("不滿意", SatisfactionLevel::Dissatisfied),
];

/// Header keys arrive with stray whitespace (including NBSP and
/// ideographic spaces) from the legacy export; strip it all.
fn normalize_keys(row: &Map<String, Value>) -> Map<String, Value> {
    row.iter()
        .map(|(k, v)| {
            let key: String = k.chars().filter(|c| !c.is_whitespace()).collect();
            (key, v.clone())
        })
        .collect()
}

fn text_field(row: &Map<String, Value>, key: &str) -> String {
    row.get(key).map(cell_text).unwrap_or_default()
}

/// Map one historical spreadsheet row onto a full case record.
pub fn case_from_history_row(raw: &Map<String, Value>) -> RepairCase {
    let row = normalize_keys(raw);

    // Six date columns, each contributing a labeled note when the cell
    // carried trailing text beyond the date itself.
    let mut notes: Vec<String> = Vec::new();
    let mut parse_date = |primary: &str, fallback: Option<&str>, label: &str| -> String {
        let value = row
            .get(primary)
            .or_else(|| fallback.and_then(|k| row.get(k)))
            .cloned()
            .unwrap_or(Value::Null);
        let parsed = normalize_legacy_date(&value);
        if !parsed.note.is_empty() {
            notes.push(format!("{}: {}", label, parsed.note));
        }
        parsed.date
    };

    let report_date = parse_date("JDM提報日期", Some("提報日期"), "report");
    let report_submit_date = parse_date("提報送件日期", None, "submit");
    let approval_date = parse_date("奉核日", None, "approval");
    let close_date = parse_date("結報日期", None, "closure");
    let close_submit_date = parse_date("結報送件日期", None, "submit");
    let receive_date = parse_date("收入發票日期", None, "invoice");

    // Vendor and voucher disentanglement. A billing vendor containing the
    // in-house name carries the income voucher code; otherwise it doubles
    // as the repair vendor when none was given.
    let mut billing_vendor = text_field(&row, "請款廠商");
    let mut income_voucher = String::new();
    if billing_vendor.contains("晟晁") {
        if let Some(m) = digit_run_re().find(&billing_vendor) {
            income_voucher = m.as_str().to_string();
            billing_vendor = "晟晁".to_string();
        }
    }
    let mut cost_vendor = text_field(&row, "維修廠商");
    let mut cost_amount = cell_number(row.get("費用金額"));
    let income_amount = cell_number(row.get("收入金額(稅後)"));
    if !billing_vendor.contains("晟晁") && cost_vendor.is_empty() && !billing_vendor.is_empty() {
        cost_vendor = billing_vendor.clone();
        cost_amount = income_amount;
    }
    let (cost_vendor, cost_voucher) = extract_voucher(&cost_vendor);

    let pre_tax = pre_tax_amount(income_amount);

    let mut satisfaction = None;
    for (column, level) in SATISFACTION_COLUMNS {
        match row.get(column) {
            Some(Value::Null) | None => {}
            Some(Value::String(s)) if s.trim().is_empty() => {}
            Some(_) => satisfaction = Some(level),
        }
    }

    let is_sub_lease = ["備註", "欄1", "欄2"]
        .iter()
        .any(|k| text_field(&row, k).contains("包租"));

    let status = if !close_date.is_empty() {
        CaseStatus::Closed
    } else if !report_date.is_empty() {
        CaseStatus::Reported
    } else {
        CaseStatus::Unset
    };

    let quote_title = text_field(&row, "報價單標題");
    let repair_type = if text_field(&row, "契約內/外").contains('外') {
        RepairType::OutOfContract
    } else {
        RepairType::InContract
    };

    let mut case = RepairCase::new();
    case.station = text_field(&row, "站點");
    case.address = text_field(&row, "建物門牌地址");
    case.tenant = text_field(&row, "承租人");
    case.phone = text_field(&row, "聯絡電話");
    case.repair_type = repair_type;
    case.quote_title = quote_title.clone();
    case.site_description = text_field(&row, "現場狀況");
    case.total_amount = income_amount;
    case.set_satisfaction(satisfaction);
    case.is_sub_lease = is_sub_lease;
    case.jdm_control.case_number = text_field(&row, "JDM系統案號");
    case.jdm_control.report_date = report_date;
    case.jdm_control.report_submit_date = report_submit_date;
    case.jdm_control.approval_date = approval_date;
    case.jdm_control.close_date = close_date;
    case.jdm_control.close_submit_date = close_submit_date;
    case.jdm_control.status = status;
    case.jdm_control.remarks = notes.join("; ");
    case.cost_items = vec![CostItem {
        id: Uuid::new_v4(),
        contractor: cost_vendor,
        work_description: quote_title.clone(),
        amount: cost_amount,
        voucher_number: cost_voucher,
        remarks: text_field(&row, "費用備註"),
        ..CostItem::default()
    }];
    case.income_items = vec![IncomeItem {
        id: Uuid::new_v4(),
        source: billing_vendor,
        receipt_number: text_field(&row, "收入發票號碼"),
        receive_date,
        amount: income_amount,
        voucher_number: income_voucher,
        quote_link: QuoteLink::Manual,
        ..IncomeItem::default()
    }];
    case.repair_items = vec![RepairItem {
        id: Uuid::new_v4(),
        catalog_id: String::new(),
        name: quote_title,
        unit_price: pre_tax,
        quantity: 1.0,
        unit: "式".to_string(),
        is_manual: true,
    }];
    case
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn traditional_calendar_years_get_offset() {
        let parsed = normalize_legacy_date(&json!("111/03/05"));
        assert_eq!(parsed.date, "2022-03-05");
        assert!(parsed.note.is_empty());

        let parsed = normalize_legacy_date(&json!("98.12.01"));
        assert_eq!(parsed.date, "2009-12-01");
    }

    #[test]
    fn four_digit_years_pass_through() {
        let parsed = normalize_legacy_date(&json!("2024-03-05"));
        assert_eq!(parsed.date, "2024-03-05");
    }

    #[test]
    fn excel_serials_convert_from_the_1900_epoch() {
        let parsed = normalize_legacy_date(&json!(45000));
        assert_eq!(parsed.date, "2023-03-15");
        let parsed = normalize_legacy_date(&json!("45000.5"));
        assert_eq!(parsed.date, "2023-03-15");
    }

    #[test]
    fn trailing_text_becomes_the_note() {
        let parsed = normalize_legacy_date(&json!("113/01/15 驗收中"));
        assert_eq!(parsed.date, "2024-01-15");
        assert_eq!(parsed.note, "驗收中");

        let parsed = normalize_legacy_date(&json!("尚未送件"));
        assert_eq!(parsed.date, "");
        assert_eq!(parsed.note, "尚未送件");
    }

    #[test]
    fn voucher_code_splits_out_of_vendor_text() {
        let (vendor, voucher) = extract_voucher("大同水電 20240118");
        assert_eq!(vendor, "大同水電");
        assert_eq!(voucher, "20240118");

        let (vendor, voucher) = extract_voucher("無號碼廠商");
        assert_eq!(vendor, "無號碼廠商");
        assert_eq!(voucher, "");
    }

    #[test]
    fn pre_tax_back_calculation_rounds_half_up() {
        assert_eq!(pre_tax_amount(1050.0), 1000.0);
        assert_eq!(pre_tax_amount(1000.0), 952.0); // 952.38...
        assert_eq!(pre_tax_amount(0.0), 0.0);
    }

    #[test]
    fn history_row_maps_to_closed_case() {
        let row = map(&[
            ("站點", json!("南京復興")),
            ("建物門牌地址", json!("南京東路三段 219 號")),
            ("承租人", json!("王小明")),
            ("契約內/外", json!("契約外")),
            ("報價單標題", json!("更換電子鎖")),
            ("JDM系統案號", json!("JDM-2024-0012")),
            ("JDM提報日期", json!("113/01/10")),
            ("結報日期", json!("113/02/20")),
            ("請款廠商", json!("晟晁 5566")),
            ("收入金額(稅後)", json!(1050)),
            ("滿\u{3000}意", json!(75)), // stray ideographic space inside the header
        ]);

        let case = case_from_history_row(&row);
        assert_eq!(case.repair_type, RepairType::OutOfContract);
        assert_eq!(case.jdm_control.status, CaseStatus::Closed);
        assert_eq!(case.jdm_control.report_date, "2024-01-10");
        assert_eq!(case.jdm_control.close_date, "2024-02-20");
        assert_eq!(case.income_items[0].source, "晟晁");
        assert_eq!(case.income_items[0].voucher_number, "5566");
        assert_eq!(case.repair_items[0].unit_price, 1000.0);
        assert_eq!(case.repair_items[0].quantity, 1.0);
        assert_eq!(
            case.satisfaction_level,
            Some(SatisfactionLevel::Satisfied)
        );
        assert_eq!(case.satisfaction_score, Some(75));
    }

    #[test]
    fn legacy_satisfaction_labels_fold_into_canonical_levels() {
        let row = map(&[("尚可", json!(50))]);
        let case = case_from_history_row(&row);
        assert_eq!(case.satisfaction_level, Some(SatisfactionLevel::Neutral));

        let row = map(&[("需改進", json!(25))]);
        let case = case_from_history_row(&row);
        assert_eq!(
            case.satisfaction_level,
            Some(SatisfactionLevel::NeedsImprovement)
        );
    }

    #[test]
    fn billing_vendor_doubles_as_cost_vendor_when_none_given() {
        let row = map(&[
            ("請款廠商", json!("大同水電 20240118")),
            ("收入金額(稅後)", json!(2100)),
        ]);
        let case = case_from_history_row(&row);
        assert_eq!(case.cost_items[0].contractor, "大同水電");
        assert_eq!(case.cost_items[0].voucher_number, "20240118");
        assert_eq!(case.cost_items[0].amount, 2100.0);
    }

    #[test]
    fn status_falls_back_to_reported_then_unset() {
        let row = map(&[("JDM提報日期", json!("113/01/10"))]);
        assert_eq!(
            case_from_history_row(&row).jdm_control.status,
            CaseStatus::Reported
        );
        let row = map(&[("承租人", json!("王小明"))]);
        assert_eq!(
            case_from_history_row(&row).jdm_control.status,
            CaseStatus::Unset
        );
    }

    #[test]
    fn sub_lease_flag_reads_remark_columns() {
        let row = map(&[("欄1", json!("包租契約"))]);
        assert!(case_from_history_row(&row).is_sub_lease);
    }

    #[test]
    fn date_notes_collect_into_remarks() {
        let row = map(&[
            ("JDM提報日期", json!("113/01/10 補件")),
            ("結報日期", json!("催辦中")),
        ]);
        let case = case_from_history_row(&row);
        assert_eq!(case.jdm_control.remarks, "report: 補件; closure: 催辦中");
    }

    #[test]
    fn address_sheets_flatten_with_synthetic_uids() {
        let sheets = vec![SheetRows {
            name: "忠孝復興".to_string(),
            rows: vec![
                vec![json!("附表三")],
                vec![json!("建物門牌"), json!("承租人"), json!("連絡電話")],
                vec![json!("忠孝東路四段 45 號"), json!("陳大文"), json!("0911222333")],
                vec![json!("忠孝東路四段 47 號"), json!("林小華"), json!("")],
            ],
        }];

        let records = flatten_address_sheets(&sheets);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_station, "忠孝復興");
        assert!(records[0].uid.starts_with("忠孝復興-0-"));
        assert_eq!(records[0].text(&["建物門牌", "門牌"]), "忠孝東路四段 45 號");
        assert_ne!(records[0].uid, records[1].uid);
    }

    #[test]
    fn price_rows_skip_header_band_and_nameless_rows() {
        let mut rows: Vec<Vec<Value>> = vec![vec![json!("標題")]; 4];
        rows.push(vec![
            json!(""),
            json!("A-01"),
            json!("更換給水管"),
            json!(""),
            json!(""),
            json!(""),
            json!(3200),
        ]);
        rows.push(vec![json!(""), json!("A-02"), json!("")]);

        let records = parse_price_rows(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "A-01");
        assert_eq!(records[0].name, "更換給水管");
        assert_eq!(records[0].unit, "式");
        assert_eq!(records[0].price, 3200.0);
    }
}
