/*!
 * Row validators
 *
 * Whole-table checks that drop invalid rows and report what they removed.
 */

use std::collections::HashSet;

use crate::Result;
use crate::events::{EventSink, PipelineEvent};
use crate::table::Table;

/// Per-column null counts, in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullSummary {
    pub counts: Vec<(String, usize)>,
}

impl NullSummary {
    /// Null count for a column, if the column exists
    pub fn get(&self, column: &str) -> Option<usize> {
        self.counts.iter().find(|(c, _)| c == column).map(|(_, n)| *n)
    }

    /// Total nulls across all columns
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Drop every row whose value in `column` is null
pub fn validate_not_null(mut table: Table, column: &str, events: &dyn EventSink) -> Result<Table> {
    let idx = table.column_index(column)?;
    let before = table.len();

    table.retain_rows(|row| !row[idx].is_null());

    events.emit(&PipelineEvent::NullRowsRemoved {
        column: column.to_string(),
        before,
        after: table.len(),
    });
    Ok(table)
}

/// Drop rows that exactly repeat an earlier row; the first occurrence is kept
pub fn remove_duplicates(mut table: Table, events: &dyn EventSink) -> Table {
    let before = table.len();
    let mut seen = HashSet::with_capacity(before);

    table.retain_rows(|row| seen.insert(row.clone()));

    events.emit(&PipelineEvent::DuplicatesRemoved {
        removed: before - table.len(),
        remaining: table.len(),
    });
    table
}

/// Count nulls per column without touching the table
pub fn null_summary(table: &Table, events: &dyn EventSink) -> NullSummary {
    let mut counts: Vec<(String, usize)> = table.columns()
        .iter()
        .map(|c| (c.clone(), 0))
        .collect();

    for row in table.rows() {
        for (slot, value) in counts.iter_mut().zip(row) {
            if value.is_null() {
                slot.1 += 1;
            }
        }
    }

    let summary = NullSummary { counts };
    events.emit(&PipelineEvent::NullSummary { counts: summary.counts.clone() });
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::table::Value;

    fn sample() -> Table {
        Table::from_rows(
            ["id", "name"],
            vec![
                vec![Value::Int(1), Value::from("A")],
                vec![Value::Null, Value::from("B")],
                vec![Value::Int(1), Value::from("A")],
                vec![Value::Int(2), Value::Null],
                vec![Value::Null, Value::from("B")],
            ],
        ).unwrap()
    }

    #[test]
    fn test_validate_not_null_removes_exactly_null_rows() {
        let events = CollectingEventSink::new();
        let table = validate_not_null(sample(), "id", &events).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.column_values("id").unwrap().all(|v| !v.is_null()));
        assert_eq!(events.null_rows_removed("id"), 2);
    }

    #[test]
    fn test_validate_not_null_unknown_column() {
        let events = CollectingEventSink::new();
        assert!(validate_not_null(sample(), "patient_id", &events).is_err());
    }

    #[test]
    fn test_remove_duplicates_keeps_first_in_order() {
        let events = CollectingEventSink::new();
        let table = remove_duplicates(sample(), &events);

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0], vec![Value::Int(1), Value::from("A")]);
        assert_eq!(table.rows()[1], vec![Value::Null, Value::from("B")]);
        assert_eq!(table.rows()[2], vec![Value::Int(2), Value::Null]);
        assert!(events.events().contains(&PipelineEvent::DuplicatesRemoved { removed: 2, remaining: 3 }));
    }

    #[test]
    fn test_remove_duplicates_idempotent() {
        let events = CollectingEventSink::new();
        let once = remove_duplicates(sample(), &events);
        let twice = remove_duplicates(once.clone(), &events);

        assert_eq!(once, twice);
        assert_eq!(
            events.events().last(),
            Some(&PipelineEvent::DuplicatesRemoved { removed: 0, remaining: 3 })
        );
    }

    #[test]
    fn test_null_summary_counts_and_does_not_mutate() {
        let events = CollectingEventSink::new();
        let table = sample();
        let summary = null_summary(&table, &events);

        assert_eq!(summary.get("id"), Some(2));
        assert_eq!(summary.get("name"), Some(1));
        assert_eq!(summary.get("status"), None);
        assert_eq!(summary.total(), 3);
        assert_eq!(table, sample());
    }
}
