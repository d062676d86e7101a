//! Workflow date-ordering validation
//!
//! Produces the aggregate list of human-readable violations for a case's
//! workflow sub-record. The list doubles as the blocking reason at save
//! time (first message shown) and as the source of truth the per-field
//! highlight flags must agree with.

use super::cases::{CaseStatus, DateField, JdmControl, RepairType};

/// Validate the five milestone dates plus the status-conditioned
/// requirements. Returns deduplicated messages in detection order.
///
/// Ordering rules, for every pair of present dates (earlier index i,
/// later index j):
/// - in-contract (submit, closure) pairs are exempt entirely;
/// - (submit, approval) is strict: equal dates violate;
/// - every other pair allows equality.
pub fn date_violations(jdm: &JdmControl, repair_type: RepairType) -> Vec<String> {
    let mut violations: Vec<String> = Vec::new();
    let mut push = |msg: String| {
        if !violations.contains(&msg) {
            violations.push(msg);
        }
    };

    let seq = DateField::SEQUENCE;
    for i in 0..seq.len() {
        let earlier = jdm.date(seq[i]);
        if earlier.is_empty() {
            continue;
        }
        for j in (i + 1)..seq.len() {
            let later = jdm.date(seq[j]);
            if later.is_empty() {
                continue;
            }
            if repair_type == RepairType::InContract
                && seq[i] == DateField::ReportSubmitDate
                && seq[j] == DateField::CloseDate
            {
                continue;
            }
            let strict =
                seq[i] == DateField::ReportSubmitDate && seq[j] == DateField::ApprovalDate;
            let violated = if strict { earlier >= later } else { earlier > later };
            if violated {
                push(format!(
                    "{} must be {} {}",
                    seq[j].label(),
                    if strict { "after" } else { "after-or-equal to" },
                    seq[i].label(),
                ));
            }
        }
    }

    match jdm.status {
        CaseStatus::Reported => {
            if jdm.report_date.is_empty() {
                push("report date is required while status is 'reported'".to_string());
            }
            if jdm.report_submit_date.is_empty() {
                push("submit date is required while status is 'reported'".to_string());
            }
            if !jdm.close_date.is_empty() || !jdm.close_submit_date.is_empty() {
                push(
                    "closure dates must not be filled while status is 'reported'"
                        .to_string(),
                );
            }
            if jdm.case_number.trim().is_empty() {
                push("case number is required while status is 'reported'".to_string());
            }
        }
        CaseStatus::Closed => {
            for (value, label) in [
                (&jdm.report_date, "report date"),
                (&jdm.report_submit_date, "submit date"),
                (&jdm.close_date, "closure date"),
                (&jdm.close_submit_date, "submit date"),
            ] {
                if value.is_empty() {
                    push(format!("{label} is required while status is 'closed'"));
                }
            }
            if jdm.case_number.trim().is_empty() {
                push("case number is required while status is 'closed'".to_string());
            }
        }
        _ => {}
    }

    if repair_type == RepairType::InContract
        && !jdm.report_submit_date.is_empty()
        && !jdm.close_submit_date.is_empty()
        && jdm.report_submit_date != jdm.close_submit_date
    {
        push(
            "in-contract case: report and closure submissions must fall on the same day"
                .to_string(),
        );
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jdm() -> JdmControl {
        JdmControl::default()
    }

    #[test]
    fn submit_before_report_is_a_violation() {
        let mut control = jdm();
        control.report_date = "2024-01-10".to_string();
        control.report_submit_date = "2024-01-05".to_string();

        let violations = date_violations(&control, RepairType::OutOfContract);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0],
            "submit date must be after-or-equal to report date"
        );

        control.report_submit_date = "2024-01-15".to_string();
        assert!(date_violations(&control, RepairType::OutOfContract).is_empty());
    }

    #[test]
    fn equal_dates_pass_for_non_strict_pairs() {
        let mut control = jdm();
        control.report_date = "2024-01-10".to_string();
        control.report_submit_date = "2024-01-10".to_string();
        assert!(date_violations(&control, RepairType::OutOfContract).is_empty());
    }

    #[test]
    fn approval_must_be_strictly_after_submit() {
        let mut control = jdm();
        control.report_submit_date = "2024-01-10".to_string();
        control.approval_date = "2024-01-10".to_string();

        let violations = date_violations(&control, RepairType::OutOfContract);
        assert_eq!(violations, vec!["approval date must be after submit date"]);

        control.approval_date = "2024-01-11".to_string();
        assert!(date_violations(&control, RepairType::OutOfContract).is_empty());
    }

    #[test]
    fn in_contract_close_may_precede_submit() {
        let mut control = jdm();
        control.report_submit_date = "2024-02-01".to_string();
        control.close_date = "2024-01-01".to_string();

        assert!(date_violations(&control, RepairType::InContract).is_empty());
        assert_eq!(
            date_violations(&control, RepairType::OutOfContract),
            vec!["closure date must be after-or-equal to submit date"]
        );
    }

    #[test]
    fn reported_status_requirements() {
        let mut control = jdm();
        control.status = CaseStatus::Reported;

        let violations = date_violations(&control, RepairType::OutOfContract);
        assert!(violations
            .contains(&"report date is required while status is 'reported'".to_string()));
        assert!(violations
            .contains(&"submit date is required while status is 'reported'".to_string()));
        assert!(violations
            .contains(&"case number is required while status is 'reported'".to_string()));

        control.close_date = "2024-05-01".to_string();
        let violations = date_violations(&control, RepairType::OutOfContract);
        assert!(violations.contains(
            &"closure dates must not be filled while status is 'reported'".to_string()
        ));
    }

    #[test]
    fn closed_status_requires_all_dates_and_case_number() {
        let mut control = jdm();
        control.status = CaseStatus::Closed;
        let violations = date_violations(&control, RepairType::OutOfContract);
        // Both submit-date requirements collapse into one message.
        assert_eq!(violations.len(), 4);

        control.report_date = "2024-01-01".to_string();
        control.report_submit_date = "2024-01-02".to_string();
        control.close_date = "2024-01-20".to_string();
        control.close_submit_date = "2024-01-21".to_string();
        control.case_number = "JDM-42".to_string();
        assert!(date_violations(&control, RepairType::OutOfContract).is_empty());
    }

    #[test]
    fn in_contract_submissions_must_share_a_day() {
        let mut control = jdm();
        control.report_submit_date = "2024-01-01".to_string();
        control.close_submit_date = "2024-01-02".to_string();

        let violations = date_violations(&control, RepairType::InContract);
        assert!(violations.iter().any(|v| v.contains("same day")));
        assert!(date_violations(&control, RepairType::OutOfContract)
            .iter()
            .all(|v| !v.contains("same day")));

        control.close_submit_date = "2024-01-01".to_string();
        assert!(date_violations(&control, RepairType::InContract).is_empty());
    }

    #[test]
    fn duplicate_messages_are_collapsed() {
        let mut control = jdm();
        // Both submit dates precede the report date, producing the same
        // message twice before deduplication.
        control.report_date = "2024-03-01".to_string();
        control.report_submit_date = "2024-02-01".to_string();
        control.close_submit_date = "2024-02-01".to_string();

        let violations = date_violations(&control, RepairType::OutOfContract);
        let submit_msgs = violations
            .iter()
            .filter(|v| *v == "submit date must be after-or-equal to report date")
            .count();
        assert_eq!(submit_msgs, 1);
    }

    #[test]
    fn validator_is_pure() {
        let mut control = jdm();
        control.report_date = "2024-01-10".to_string();
        control.report_submit_date = "2024-01-05".to_string();
        let first = date_violations(&control, RepairType::InContract);
        let second = date_violations(&control, RepairType::InContract);
        assert_eq!(first, second);
    }
}
