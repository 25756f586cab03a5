/*!
 * # Clinic ETL
 *
 * Cleaning pipelines for a clinic's raw doctor and appointment exports.
 *
 * ## Features
 *
 * - **Strict schema contract**: raw headers must match the expected columns exactly
 * - **Forgiving cleaners**: dirty identifiers, dates and statuses degrade to null, never fail
 * - **Row validators**: null-key and exact-duplicate removal with counts
 * - **Reconciliation**: appointments must reference a doctor that survived cleaning
 * - **Explicit reporting**: every stage reports through an `EventSink` you pass in
 * - **Multiple sinks**: CSV, JSON, SQL scripts and (with `sqlite`) SQLite
 * - **Spreadsheet input**: with `excel`, the first sheet of a workbook loads like a CSV
 *
 * ## Quick Start
 *
 * ```no_run
 * use clinic_etl::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let events = TracingEventSink;
 * let raw = TableReader::new().load("data/doctors.csv")?;
 * let doctors = DoctorPipeline.run(raw, &events)?;
 *
 * CsvSink::new().write(&doctors, &Destination::file("output/doctors.csv"))?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Full Run
 *
 * ```no_run
 * # use clinic_etl::prelude::*;
 * # fn main() -> Result<()> {
 * let config = EtlConfig::load()?;
 * config.validate_paths()?;
 *
 * let sink = SqlScriptSink::new(config.sql_script_path()).with_dialect(config.sql_dialect);
 * let outcome = EtlRunBuilder::from_config(&config).build()?.execute(&sink)?;
 *
 * for (entity, error) in &outcome.errors {
 *     eprintln!("{} failed: {}", entity, error.user_message());
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Reporting
 *
 * ```no_run
 * # use clinic_etl::prelude::*;
 * # fn main() -> Result<()> {
 * # let doctors_table = Table::new(["id", "name", "specialty"]);
 * # let appointments_table = Table::new(["id", "patient_id", "doctor_id", "booking_date", "status"]);
 * let doctors = Doctor::from_table(&doctors_table)?;
 * let appointments = Appointment::from_table(&appointments_table)?;
 *
 * let report = AppointmentReport::new(&doctors, &appointments);
 * if let Some(top) = report.top_confirmed_doctor() {
 *     println!("{} has {} confirmed appointments", top.name, top.confirmed);
 * }
 * report.stats().print_summary();
 * # Ok(())
 * # }
 * ```
 */

// Re-export error types from root
pub use error::{EtlError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod error;
pub mod table;
pub mod events;
pub mod cleaners;
pub mod validators;
pub mod schema;
pub mod pipeline;
pub mod reconcile;
pub mod data_types;
pub mod reader;
pub mod export;
pub mod config;
pub mod etl;
pub mod analytics;
pub mod logging;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use clinic_etl::prelude::*;
/// ```
pub mod prelude {
    pub use crate::table::{Table, Value};
    pub use crate::events::{EventSink, PipelineEvent, TracingEventSink, CollectingEventSink};
    pub use crate::schema::{TableSchema, DoctorSchema, AppointmentSchema};
    pub use crate::pipeline::{EntityPipeline, DoctorPipeline, AppointmentPipeline, PipelineOptions};
    pub use crate::reconcile::{reconcile_appointments, DoctorIds};
    pub use crate::data_types::{Doctor, Appointment, AppointmentStatus};
    pub use crate::reader::TableReader;
    pub use crate::export::{TableSink, Destination, CsvSink, JsonSink, SqlScriptSink, SqlDialect};
    #[cfg(feature = "sqlite")]
    pub use crate::export::SqliteSink;
    pub use crate::config::{EtlConfig, ConfigBuilder};
    pub use crate::etl::{EtlRunBuilder, EtlRun, EtlOutcome};
    pub use crate::analytics::{AppointmentReport, AppointmentStats};
    pub use crate::error::{EtlError, Result};
    pub use crate::ExportFormat;
}

/// Clinic data constants
pub mod constants {
    /// Raw cell contents read as missing
    pub const NULL_MARKERS: &[&str] = &[
        "NA", "N/A", "n/a", "NaN", "nan", "-nan", "null", "NULL", "None", "<NA>", "NaT",
    ];

    /// Controlled status vocabulary
    pub const STATUS_CONFIRMED: &str = "confirmed";
    pub const STATUS_CANCELLED: &str = "cancelled";
    /// Stored in place of a missing status unless nulls are kept
    pub const STATUS_MISSING: &str = "nan";

    /// Destination table names
    pub const DOCTORS_TABLE: &str = "doctors";
    pub const APPOINTMENTS_TABLE: &str = "appointments";
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_table_names_match_schema_entities() {
        assert_eq!(crate::constants::DOCTORS_TABLE, DoctorSchema::ENTITY);
        assert_eq!(crate::constants::APPOINTMENTS_TABLE, AppointmentSchema::ENTITY);
    }

    #[test]
    fn test_pipeline_output_matches_cleaned_columns() {
        let events = CollectingEventSink::new();
        let raw = Table::new(AppointmentSchema::column_names());
        let cleaned = AppointmentPipeline::default().run(raw, &events).unwrap();

        let expected: Vec<String> = AppointmentSchema::cleaned_column_names()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(cleaned.columns(), expected.as_slice());
        assert!(cleaned.is_empty());
    }
}
