//! Rule-driven record duplication.

use std::path::Path;

use log::debug;

use crate::{
    diagnostics::{DiagnosticsSink, Fault, FaultKind},
    error::TableError,
    rules::{Rule, RuleSet},
    table::Table,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Original records evaluated against the rule set.
    pub scanned: usize,
    pub skipped_deleted: usize,
    pub duplicated: usize,
    pub faults: usize,
}

/// Appends one duplicate per (record, matching rule) pair, with the rule's
/// column overridden.
///
/// Only the records present on entry are evaluated, so duplicates never
/// trigger further duplication. A fault on one record is reported to `sink`
/// and processing moves on to the next record; duplicates already appended
/// stay in the table.
pub fn apply_rules<T>(
    table: &mut T,
    rules: &RuleSet,
    source: &Path,
    sink: &dyn DiagnosticsSink,
) -> ApplyReport
where
    T: Table + ?Sized,
{
    let original_count = table.record_count();
    let mut report = ApplyReport::default();

    for index in 0..original_count {
        if table.is_deleted(index) {
            report.skipped_deleted += 1;
            continue;
        }
        report.scanned += 1;
        match duplicate_matches(table, index, rules) {
            Ok(created) => report.duplicated += created,
            Err(RecordFault { created, error }) => {
                report.duplicated += created;
                report.faults += 1;
                sink.report(&Fault::new(
                    source,
                    FaultKind::Record { index },
                    error.to_string(),
                ));
            }
        }
    }

    debug!(
        "{}: scanned {} record(s), appended {} duplicate(s), {} fault(s)",
        source.display(),
        report.scanned,
        report.duplicated,
        report.faults
    );
    report
}

struct RecordFault {
    created: usize,
    error: TableError,
}

fn duplicate_matches<T>(table: &mut T, index: usize, rules: &RuleSet) -> Result<usize, RecordFault>
where
    T: Table + ?Sized,
{
    let mut created = 0;
    for rule in rules {
        let matched = table
            .field_value(index, &rule.column)
            .map_err(|error| RecordFault { created, error })?
            .is_some_and(|value| rule.matches(value));
        if !matched {
            continue;
        }
        duplicate_record(table, index, rule).map_err(|error| RecordFault { created, error })?;
        created += 1;
    }
    Ok(created)
}

fn duplicate_record<T>(table: &mut T, index: usize, rule: &Rule) -> Result<usize, TableError>
where
    T: Table + ?Sized,
{
    // Validate before inserting so a rejected override never leaves a bare copy behind.
    table.check_value(&rule.column, &rule.new_value)?;

    let values = table
        .field_names()
        .into_iter()
        .map(|name| {
            let value = table.field_value(index, name)?.unwrap_or_default();
            Ok((name.to_string(), value.to_string()))
        })
        .collect::<Result<Vec<_>, TableError>>()?;

    let new_index = table.insert_record();
    for (name, value) in &values {
        table.set_field(new_index, name, value)?;
    }
    table.set_field(new_index, &rule.column, &rule.new_value)?;
    Ok(new_index)
}
