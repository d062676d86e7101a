//! JDM workflow validation and status transitions
//!
//! Pure functions over the [`JdmControl`] sub-record: chronological
//! ordering of the five milestone dates, status-conditioned required
//! fields, per-field error flags for highlighting, the status transition
//! plan with its checklist side effects, and the save precondition gate.
//!
//! Dates are ISO `YYYY-MM-DD` strings and compare lexicographically,
//! which is exactly calendar order for that format; an empty string means
//! the milestone has not happened yet.

use super::cases::{
    CaseStatus, ChecklistItem, DateField, JdmControl, RepairCase, RepairType,
};
use super::validate::date_violations;

/// A field of the workflow sub-record that can be highlighted.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    ReportDate,
    ReportSubmitDate,
    ApprovalDate,
    CloseDate,
    CloseSubmitDate,
    CaseNumber,
}

impl ControlField {
    fn as_date(&self) -> Option<DateField> {
        match self {
            Self::ReportDate => Some(DateField::ReportDate),
            Self::ReportSubmitDate => Some(DateField::ReportSubmitDate),
            Self::ApprovalDate => Some(DateField::ApprovalDate),
            Self::CloseDate => Some(DateField::CloseDate),
            Self::CloseSubmitDate => Some(DateField::CloseSubmitDate),
            Self::CaseNumber => None,
        }
    }
}

/// The ordering rule applied to a pair of milestone dates.
fn pair_is_exempt(earlier: DateField, later: DateField, repair_type: RepairType) -> bool {
    // In-contract cases may legitimately close before the report
    // submission completes its separate path.
    repair_type == RepairType::InContract
        && earlier == DateField::ReportSubmitDate
        && later == DateField::CloseDate
}

fn pair_is_strict(earlier: DateField, later: DateField) -> bool {
    earlier == DateField::ReportSubmitDate && later == DateField::ApprovalDate
}

/// True when the specific field participates in at least one violation:
/// required but missing, forbidden but present, or out of order against
/// another present date. Agrees with [`date_violations`] field-for-field;
/// used for inline highlighting.
pub fn field_flag(field: ControlField, jdm: &JdmControl, repair_type: RepairType) -> bool {
    let status = jdm.status;

    if field == ControlField::CaseNumber {
        return matches!(status, CaseStatus::Reported | CaseStatus::Closed)
            && jdm.case_number.trim().is_empty();
    }
    let date_field = match field.as_date() {
        Some(f) => f,
        None => return false,
    };
    let value = jdm.date(date_field);

    if status == CaseStatus::Reported {
        match date_field {
            DateField::ReportDate | DateField::ReportSubmitDate if value.is_empty() => {
                return true
            }
            DateField::CloseDate | DateField::CloseSubmitDate if !value.is_empty() => {
                return true
            }
            _ => {}
        }
    }
    if status == CaseStatus::Closed
        && date_field != DateField::ApprovalDate
        && value.is_empty()
    {
        return true;
    }

    if repair_type == RepairType::InContract
        && matches!(
            date_field,
            DateField::ReportSubmitDate | DateField::CloseSubmitDate
        )
        && !jdm.report_submit_date.is_empty()
        && !jdm.close_submit_date.is_empty()
        && jdm.report_submit_date != jdm.close_submit_date
    {
        return true;
    }

    if value.is_empty() {
        return false;
    }

    let my_idx = DateField::SEQUENCE
        .iter()
        .position(|f| *f == date_field)
        .unwrap_or(0);
    for (idx, other) in DateField::SEQUENCE.iter().enumerate() {
        if idx == my_idx {
            continue;
        }
        let other_val = jdm.date(*other);
        if other_val.is_empty() {
            continue;
        }

        let (earlier_field, later_field, earlier_val, later_val) = if idx < my_idx {
            (*other, date_field, other_val, value)
        } else {
            (date_field, *other, value, other_val)
        };
        if pair_is_exempt(earlier_field, later_field, repair_type) {
            continue;
        }
        let violated = if pair_is_strict(earlier_field, later_field) {
            earlier_val >= later_val
        } else {
            earlier_val > later_val
        };
        if violated {
            return true;
        }
    }
    false
}

/// What happens to the outstanding-document checklist when a status is
/// entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistEffect {
    /// No automatic change.
    None,
    /// Photo-before and quotation are assumed satisfied once reported.
    RemoveReportPrereqs,
    /// Closing a case clears every outstanding item.
    Clear,
}

/// A planned status change, computed before any mutation so the caller
/// can ask the user to confirm the side effects first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransitionPlan {
    pub next: CaseStatus,
    pub checklist_effect: ChecklistEffect,
    pub requires_confirmation: bool,
    /// Shown in the confirmation prompt when one is required.
    pub notice: Option<&'static str>,
}

/// Plan a status change. Every transition is legal; re-selecting the
/// current status toggles back to unset. Restrictions on what may be
/// *persisted* live in the save gate, not here.
pub fn plan_transition(current: CaseStatus, target: CaseStatus) -> TransitionPlan {
    if current == target {
        return TransitionPlan {
            next: CaseStatus::Unset,
            checklist_effect: ChecklistEffect::None,
            requires_confirmation: false,
            notice: None,
        };
    }
    match target {
        CaseStatus::Reported => TransitionPlan {
            next: target,
            checklist_effect: ChecklistEffect::RemoveReportPrereqs,
            requires_confirmation: true,
            notice: Some(
                "entering 'reported' removes the before-photo and quotation \
                 items from the outstanding checklist",
            ),
        },
        CaseStatus::Closed => TransitionPlan {
            next: target,
            checklist_effect: ChecklistEffect::Clear,
            requires_confirmation: true,
            notice: Some("entering 'closed' clears the entire outstanding checklist"),
        },
        _ => TransitionPlan {
            next: target,
            checklist_effect: ChecklistEffect::None,
            requires_confirmation: false,
            notice: None,
        },
    }
}

/// Apply a confirmed plan to the workflow sub-record.
pub fn apply_transition(jdm: &mut JdmControl, plan: &TransitionPlan) {
    match plan.checklist_effect {
        ChecklistEffect::None => {}
        ChecklistEffect::RemoveReportPrereqs => {
            jdm.checklist.retain(|item| {
                !matches!(item, ChecklistItem::PhotoBefore | ChecklistItem::Quotation)
            });
        }
        ChecklistEffect::Clear => jdm.checklist.clear(),
    }
    jdm.status = plan.next;
}

/// Why a save was rejected before any write happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SaveBlocked {
    pub message: String,
}

/// The save precondition gate. Checked before persisting; on failure the
/// record is left untouched and the message is surfaced to the user.
pub fn check_save(case: &RepairCase) -> Result<(), SaveBlocked> {
    let jdm = &case.jdm_control;

    if matches!(jdm.status, CaseStatus::Replaced | CaseStatus::Rejected)
        && jdm.remarks.trim().is_empty()
    {
        return Err(SaveBlocked {
            message: format!(
                "remarks are required to record the reason while status is '{}'",
                jdm.status.label()
            ),
        });
    }

    if matches!(jdm.status, CaseStatus::Reported | CaseStatus::Closed)
        && jdm.case_number.trim().is_empty()
    {
        return Err(SaveBlocked {
            message: format!(
                "a case number is required while status is '{}'",
                jdm.status.label()
            ),
        });
    }

    let violations = date_violations(jdm, case.repair_type);
    if !violations.is_empty() && jdm.remarks.trim().is_empty() {
        return Err(SaveBlocked {
            message: format!(
                "workflow dates have unresolved issues ({}); add remarks to \
                 explain before saving",
                violations[0]
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cases::RepairCase;

    fn jdm() -> JdmControl {
        JdmControl::default()
    }

    #[test]
    fn missing_required_date_flags_that_field_only() {
        let mut control = jdm();
        control.status = CaseStatus::Reported;
        control.report_date = "2024-01-10".to_string();

        assert!(field_flag(
            ControlField::ReportSubmitDate,
            &control,
            RepairType::OutOfContract
        ));
        assert!(!field_flag(
            ControlField::ReportDate,
            &control,
            RepairType::OutOfContract
        ));
    }

    #[test]
    fn closure_dates_forbidden_while_reported() {
        let mut control = jdm();
        control.status = CaseStatus::Reported;
        control.report_date = "2024-01-10".to_string();
        control.report_submit_date = "2024-01-11".to_string();
        control.case_number = "JDM-001".to_string();
        control.close_date = "2024-02-01".to_string();

        assert!(field_flag(
            ControlField::CloseDate,
            &control,
            RepairType::OutOfContract
        ));
        assert!(!field_flag(
            ControlField::CloseSubmitDate,
            &control,
            RepairType::OutOfContract
        ));
    }

    #[test]
    fn case_number_flag_tracks_status() {
        let mut control = jdm();
        assert!(!field_flag(
            ControlField::CaseNumber,
            &control,
            RepairType::InContract
        ));
        control.status = CaseStatus::Closed;
        assert!(field_flag(
            ControlField::CaseNumber,
            &control,
            RepairType::InContract
        ));
        control.case_number = "  JDM-7  ".to_string();
        assert!(!field_flag(
            ControlField::CaseNumber,
            &control,
            RepairType::InContract
        ));
    }

    #[test]
    fn out_of_order_pair_flags_both_ends() {
        let mut control = jdm();
        control.report_date = "2024-01-10".to_string();
        control.report_submit_date = "2024-01-05".to_string();

        assert!(field_flag(
            ControlField::ReportDate,
            &control,
            RepairType::OutOfContract
        ));
        assert!(field_flag(
            ControlField::ReportSubmitDate,
            &control,
            RepairType::OutOfContract
        ));
    }

    #[test]
    fn strict_pair_flags_on_equality() {
        let mut control = jdm();
        control.report_submit_date = "2024-01-05".to_string();
        control.approval_date = "2024-01-05".to_string();

        assert!(field_flag(
            ControlField::ApprovalDate,
            &control,
            RepairType::OutOfContract
        ));
        control.approval_date = "2024-01-06".to_string();
        assert!(!field_flag(
            ControlField::ApprovalDate,
            &control,
            RepairType::OutOfContract
        ));
    }

    #[test]
    fn in_contract_exempts_submit_close_pair_in_both_directions() {
        let mut control = jdm();
        control.report_submit_date = "2024-02-01".to_string();
        control.close_date = "2024-01-01".to_string();

        assert!(!field_flag(
            ControlField::ReportSubmitDate,
            &control,
            RepairType::InContract
        ));
        assert!(!field_flag(
            ControlField::CloseDate,
            &control,
            RepairType::InContract
        ));
        // Same dates violate for an out-of-contract case.
        assert!(field_flag(
            ControlField::CloseDate,
            &control,
            RepairType::OutOfContract
        ));
    }

    #[test]
    fn single_day_submission_flags_both_submit_fields() {
        let mut control = jdm();
        control.report_submit_date = "2024-01-01".to_string();
        control.close_submit_date = "2024-01-02".to_string();

        assert!(field_flag(
            ControlField::ReportSubmitDate,
            &control,
            RepairType::InContract
        ));
        assert!(field_flag(
            ControlField::CloseSubmitDate,
            &control,
            RepairType::InContract
        ));

        control.close_submit_date = "2024-01-01".to_string();
        assert!(!field_flag(
            ControlField::ReportSubmitDate,
            &control,
            RepairType::InContract
        ));
    }

    #[test]
    fn reselecting_status_toggles_back_to_unset() {
        let plan = plan_transition(CaseStatus::Reported, CaseStatus::Reported);
        assert_eq!(plan.next, CaseStatus::Unset);
        assert_eq!(plan.checklist_effect, ChecklistEffect::None);
        assert!(!plan.requires_confirmation);
    }

    #[test]
    fn entering_reported_removes_photo_and_quotation() {
        let mut control = jdm();
        control.checklist = vec![
            ChecklistItem::PhotoBefore,
            ChecklistItem::Quotation,
            ChecklistItem::Invoice,
        ];
        let plan = plan_transition(CaseStatus::Unset, CaseStatus::Reported);
        assert!(plan.requires_confirmation);
        apply_transition(&mut control, &plan);
        assert_eq!(control.status, CaseStatus::Reported);
        assert_eq!(control.checklist, vec![ChecklistItem::Invoice]);
    }

    #[test]
    fn entering_closed_clears_checklist() {
        let mut control = jdm();
        control.checklist = vec![ChecklistItem::Warranty, ChecklistItem::BankCopy];
        let plan = plan_transition(CaseStatus::Reported, CaseStatus::Closed);
        assert!(plan.requires_confirmation);
        apply_transition(&mut control, &plan);
        assert!(control.checklist.is_empty());
    }

    #[test]
    fn replaced_and_rejected_apply_without_confirmation() {
        for target in [CaseStatus::Replaced, CaseStatus::Rejected] {
            let plan = plan_transition(CaseStatus::Unset, target);
            assert!(!plan.requires_confirmation);
            assert_eq!(plan.checklist_effect, ChecklistEffect::None);
            assert_eq!(plan.next, target);
        }
    }

    #[test]
    fn field_flags_agree_with_the_aggregate_list() {
        use crate::domain::validate::date_violations;

        let scenarios: Vec<(JdmControl, RepairType)> = vec![
            // clean closed case
            {
                let mut c = jdm();
                c.status = CaseStatus::Closed;
                c.case_number = "JDM-1".to_string();
                c.report_date = "2024-01-01".to_string();
                c.report_submit_date = "2024-01-21".to_string();
                c.close_date = "2024-01-20".to_string();
                c.close_submit_date = "2024-01-21".to_string();
                (c, RepairType::InContract)
            },
            // out-of-order pair
            {
                let mut c = jdm();
                c.report_date = "2024-02-01".to_string();
                c.approval_date = "2024-01-01".to_string();
                (c, RepairType::OutOfContract)
            },
            // empty record
            (jdm(), RepairType::OutOfContract),
        ];

        let all_fields = [
            ControlField::ReportDate,
            ControlField::ReportSubmitDate,
            ControlField::ApprovalDate,
            ControlField::CloseDate,
            ControlField::CloseSubmitDate,
            ControlField::CaseNumber,
        ];
        for (control, repair_type) in scenarios {
            let any_flag = all_fields
                .iter()
                .any(|f| field_flag(*f, &control, repair_type));
            let any_violation = !date_violations(&control, repair_type).is_empty();
            assert_eq!(any_flag, any_violation, "control {control:?}");
        }
    }

    #[test]
    fn rejected_without_remarks_blocks_save() {
        let mut case = RepairCase::new();
        case.jdm_control.status = CaseStatus::Rejected;
        assert!(check_save(&case).is_err());

        case.jdm_control.remarks = "customer cancelled".to_string();
        assert!(check_save(&case).is_ok());
    }

    #[test]
    fn reported_without_case_number_blocks_save() {
        let mut case = RepairCase::new();
        case.jdm_control.status = CaseStatus::Reported;
        case.jdm_control.report_date = "2024-01-10".to_string();
        case.jdm_control.report_submit_date = "2024-01-11".to_string();
        let err = check_save(&case).unwrap_err();
        assert!(err.message.contains("case number"));
    }

    #[test]
    fn violations_require_remarks_regardless_of_status() {
        let mut case = RepairCase::new();
        case.jdm_control.report_date = "2024-03-10".to_string();
        case.jdm_control.report_submit_date = "2024-03-01".to_string();
        assert!(check_save(&case).is_err());

        case.jdm_control.remarks = "legacy data, dates confirmed wrong at source".to_string();
        assert!(check_save(&case).is_ok());
    }
}
