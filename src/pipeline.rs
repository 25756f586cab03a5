/*!
 * Entity pipelines
 *
 * Each pipeline checks the raw header against its schema contract, then runs
 * the field cleaners and row validators in a fixed order and returns a fresh
 * cleaned table. A schema mismatch aborts before any row is touched.
 */

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::cleaners::{self, degraded_count};
use crate::events::{EventSink, PipelineEvent};
use crate::schema::{AppointmentSchema, DoctorSchema, TableSchema};
use crate::table::{Table, Value};
use crate::validators::{null_summary, remove_duplicates, validate_not_null};

/// Options that change which rows a pipeline keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Drop appointments whose booking date is missing or unparseable
    #[serde(default)]
    pub reject_null_booking_date: bool,
    /// Leave a missing status null instead of storing the text `nan`
    #[serde(default)]
    pub keep_null_status: bool,
}

/// A cleaning pipeline for one entity
pub trait EntityPipeline {
    type Schema: TableSchema;

    /// Clean a raw table. Fails only on a schema mismatch.
    fn run(&self, raw: Table, events: &dyn EventSink) -> Result<Table>;

    fn entity(&self) -> &'static str {
        Self::Schema::ENTITY
    }
}

/// Reject the table unless its columns match the schema exactly
fn check_schema<S: TableSchema>(raw: &Table) -> Result<()> {
    S::validate_headers(raw.columns())
}

/// Run a column cleaner and report how many present values it nulled
fn clean_column<F>(table: &mut Table, column: &str, cleaner: F, events: &dyn EventSink) -> Result<()>
where
    F: FnOnce(&[Value]) -> Vec<Value>,
{
    let mut degraded = 0;
    table.transform_column(column, |values| {
        let cleaned = cleaner(&values);
        degraded = degraded_count(&values, &cleaned);
        cleaned
    })?;

    debug!(column, degraded, "Column cleaned");
    events.emit(&PipelineEvent::FieldsDegraded {
        column: column.to_string(),
        count: degraded,
    });
    Ok(())
}

/// Doctors: clean the id, drop null ids and duplicates
#[derive(Debug, Default, Clone, Copy)]
pub struct DoctorPipeline;

impl EntityPipeline for DoctorPipeline {
    type Schema = DoctorSchema;

    fn run(&self, raw: Table, events: &dyn EventSink) -> Result<Table> {
        check_schema::<DoctorSchema>(&raw)?;
        events.emit(&PipelineEvent::RowsLoaded {
            entity: self.entity().to_string(),
            rows: raw.len(),
        });

        let mut table = raw;
        table.rename_column("doctor_id", "id")?;
        clean_column(&mut table, "id", cleaners::clean_id_column, events)?;

        let table = validate_not_null(table, "id", events)?;
        let table = remove_duplicates(table, events);
        null_summary(&table, events);

        events.emit(&PipelineEvent::PipelineCompleted {
            entity: self.entity().to_string(),
            rows: table.len(),
        });
        Ok(table)
    }
}

/// Appointments: clean ids, dates and statuses, drop null patients and duplicates
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentPipeline {
    options: PipelineOptions,
}

impl AppointmentPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Also drop rows whose booking date did not parse
    pub fn with_reject_null_booking_date(mut self, reject: bool) -> Self {
        self.options.reject_null_booking_date = reject;
        self
    }

    /// Leave missing statuses null
    pub fn with_keep_null_status(mut self, keep: bool) -> Self {
        self.options.keep_null_status = keep;
        self
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }
}

impl EntityPipeline for AppointmentPipeline {
    type Schema = AppointmentSchema;

    fn run(&self, raw: Table, events: &dyn EventSink) -> Result<Table> {
        check_schema::<AppointmentSchema>(&raw)?;
        events.emit(&PipelineEvent::RowsLoaded {
            entity: self.entity().to_string(),
            rows: raw.len(),
        });

        let mut table = raw;
        table.rename_column("booking_id", "id")?;
        for column in ["id", "patient_id", "doctor_id"] {
            clean_column(&mut table, column, cleaners::clean_id_column, events)?;
        }

        let mut table = validate_not_null(table, "patient_id", events)?;

        clean_column(&mut table, "booking_date", cleaners::clean_date_column, events)?;
        if self.options.reject_null_booking_date {
            table = validate_not_null(table, "booking_date", events)?;
        }

        if self.options.keep_null_status {
            clean_column(&mut table, "status", cleaners::normalize_status_column_keep_null, events)?;
        } else {
            clean_column(&mut table, "status", cleaners::normalize_status_column, events)?;
        }

        let table = remove_duplicates(table, events);
        null_summary(&table, events);

        events.emit(&PipelineEvent::PipelineCompleted {
            entity: self.entity().to_string(),
            rows: table.len(),
        });
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::EtlError;
    use chrono::NaiveDate;

    fn raw_doctors() -> Table {
        Table::from_rows(
            ["doctor_id", "name", "specialty"],
            vec![
                vec![Value::Int(1), Value::from("A"), Value::from("X")],
                vec![Value::from("2 "), Value::from("B"), Value::from("Y")],
                vec![Value::from("n/a"), Value::from("C"), Value::from("Z")],
                vec![Value::Float(1.0), Value::from("A"), Value::from("X")],
            ],
        ).unwrap()
    }

    fn raw_appointments() -> Table {
        Table::from_rows(
            ["booking_id", "patient_id", "doctor_id", "booking_date", "status"],
            vec![
                vec![Value::Int(101), Value::Int(1), Value::Int(1), Value::from("2023-11-01"), Value::from("Confirmed")],
                vec![Value::Int(102), Value::Null, Value::Int(2), Value::from("2023/11/02"), Value::from("Cancelled")],
                vec![Value::Int(103), Value::from("3"), Value::Int(2), Value::from("soon"), Value::from("pending ")],
                vec![Value::Int(101), Value::Int(1), Value::Int(1), Value::from("11/01/2023"), Value::from("CONFIRMED!")],
            ],
        ).unwrap()
    }

    #[test]
    fn test_doctor_pipeline_cleans_and_dedupes() {
        let events = CollectingEventSink::new();
        let table = DoctorPipeline.run(raw_doctors(), &events).unwrap();

        assert_eq!(table.columns(), &["id", "name", "specialty"]);
        let ids: Vec<_> = table.column_values("id").unwrap().cloned().collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(events.degraded("id"), 1);
        assert_eq!(events.null_rows_removed("id"), 1);
        assert!(events.events().contains(&PipelineEvent::DuplicatesRemoved { removed: 1, remaining: 2 }));
    }

    #[test]
    fn test_doctor_pipeline_schema_mismatch_aborts() {
        let events = CollectingEventSink::new();
        let raw = Table::from_rows(["doctor_id", "name"], vec![vec![Value::Int(1), Value::from("A")]]).unwrap();

        let err = DoctorPipeline.run(raw, &events).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch { .. }));
        assert!(events.events().is_empty());
    }

    #[test]
    fn test_appointment_pipeline() {
        let events = CollectingEventSink::new();
        let table = AppointmentPipeline::default().run(raw_appointments(), &events).unwrap();

        assert_eq!(table.columns(), &["id", "patient_id", "doctor_id", "booking_date", "status"]);
        // null patient removed, the two 101 rows collapse once dates and statuses are normalized
        assert_eq!(table.len(), 2);

        let nov_first = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            table.rows()[0],
            vec![Value::Int(101), Value::Int(1), Value::Int(1), Value::DateTime(nov_first), Value::from("confirmed")]
        );
        assert_eq!(
            table.rows()[1],
            vec![Value::Int(103), Value::Int(3), Value::Int(2), Value::Null, Value::from("pending")]
        );
        assert_eq!(events.null_rows_removed("patient_id"), 1);
        assert_eq!(events.degraded("booking_date"), 1);
    }

    #[test]
    fn test_appointment_pipeline_can_reject_null_dates() {
        let events = CollectingEventSink::new();
        let pipeline = AppointmentPipeline::default().with_reject_null_booking_date(true);
        let table = pipeline.run(raw_appointments(), &events).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(events.null_rows_removed("booking_date"), 1);
        assert!(pipeline.options().reject_null_booking_date);
    }

    #[test]
    fn test_appointment_pipeline_missing_status() {
        let raw = Table::from_rows(
            ["booking_id", "patient_id", "doctor_id", "booking_date", "status"],
            vec![vec![Value::Int(7), Value::Int(1), Value::Int(1), Value::from("2023-11-01"), Value::Null]],
        ).unwrap();
        let events = CollectingEventSink::new();

        let table = AppointmentPipeline::default().run(raw.clone(), &events).unwrap();
        assert_eq!(table.value(0, "status").unwrap(), Some(&Value::from("nan")));

        let table = AppointmentPipeline::default()
            .with_keep_null_status(true)
            .run(raw, &events)
            .unwrap();
        assert_eq!(table.value(0, "status").unwrap(), Some(&Value::Null));
    }

    #[test]
    fn test_appointment_pipeline_reordered_columns_rejected() {
        let events = CollectingEventSink::new();
        let raw = Table::new(["patient_id", "booking_id", "doctor_id", "booking_date", "status"]);
        assert!(AppointmentPipeline::default().run(raw, &events).is_err());
    }
}
