//! Report rows.
//!
//! The header is a fixed prefix followed by one column per (step, result)
//! pair in declaration order. Data rows mirror that shape exactly, so both are
//! built from the same walk over the step list.

use chrono::{DateTime, Utc};

use crate::{target::Target, test::Test, value};

/// Fixed leading columns of every report.
pub const FIXED_COLUMNS: [&str; 9] = [
    "Test Name",
    "Version",
    "Station ID",
    "Date (UTC)",
    "Time (UTC)",
    "Target Name",
    "Pass/Fail",
    "Failing Step",
    "Failing Step Outcome",
];

pub fn header(test: &Test) -> Vec<String> {
    let mut row: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for step in test.steps() {
        row.extend(step.owned_results().iter().map(|result| result.label()));
    }
    row
}

/// Data row for `target`, stamped with the current UTC time.
pub fn row(test: &Test, target: &Target) -> Vec<String> {
    row_at(test, target, Utc::now())
}

pub fn row_at(test: &Test, target: &Target, at: DateTime<Utc>) -> Vec<String> {
    let mut row = vec![
        test.name().unwrap_or_default().to_string(),
        test.version().unwrap_or_default().to_string(),
        test.station_id().unwrap_or_default().to_string(),
        at.format("%Y/%m/%d").to_string(),
        at.format("%H:%M:%S").to_string(),
        target.name().to_string(),
        test.style().label(test.target_state(target)).to_string(),
    ];

    match test.failing_step(target) {
        Some(id) => {
            let step = test.step(id);
            row.push(step.summary());
            let detail = match target.step_error(id) {
                Some(error) => error.to_string(),
                None => step
                    .classifier_fault(target)
                    .map(|fault| fault.to_string())
                    .unwrap_or_default(),
            };
            row.push(detail);
        }
        None => {
            row.push(String::new());
            row.push(String::new());
        }
    }

    for step in test.steps() {
        row.extend(
            step.owned_results()
                .iter()
                .map(|result| value::export_text(target.result(result))),
        );
    }
    row
}
