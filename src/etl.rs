/*!
 * Run orchestration
 *
 * An `EtlRun` loads both raw files, cleans them, reconciles appointments
 * against the surviving doctors and hands each cleaned table to a sink. A
 * failing entity is recorded and the run moves on; a failing sink aborts.
 *
 * # Example
 * ```no_run
 * # use clinic_etl::etl::EtlRunBuilder;
 * # use clinic_etl::export::{SqlScriptSink, SqlDialect};
 * let run = EtlRunBuilder::new()
 *     .doctors("data/doctors.csv")
 *     .appointments("data/appointments.csv")
 *     .build()?;
 * let sink = SqlScriptSink::new("output/load.sql").with_dialect(SqlDialect::SQLite);
 * let outcome = run.execute(&sink)?;
 * println!("{} appointments loaded", outcome.appointment_rows());
 * # Ok::<(), clinic_etl::EtlError>(())
 * ```
 */

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::{Result, EtlError};
use crate::config::EtlConfig;
use crate::constants::{APPOINTMENTS_TABLE, DOCTORS_TABLE};
use crate::events::{EventSink, TracingEventSink};
use crate::export::{CsvSink, Destination, TableSink};
use crate::pipeline::{AppointmentPipeline, DoctorPipeline, EntityPipeline, PipelineOptions};
use crate::reader::TableReader;
use crate::reconcile::{reconcile_appointments, DoctorIds};
use crate::table::Table;

static TRACING_EVENTS: TracingEventSink = TracingEventSink;

/// Builder for an ETL run
pub struct EtlRunBuilder<'a> {
    doctors_path: Option<PathBuf>,
    appointments_path: Option<PathBuf>,
    options: PipelineOptions,
    reader: TableReader,
    events: &'a dyn EventSink,
}

impl Default for EtlRunBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> EtlRunBuilder<'a> {
    pub fn new() -> Self {
        Self {
            doctors_path: None,
            appointments_path: None,
            options: PipelineOptions::default(),
            reader: TableReader::new(),
            events: &TRACING_EVENTS,
        }
    }

    /// Start from the paths and options of a loaded configuration
    pub fn from_config(config: &EtlConfig) -> Self {
        let builder = Self::new()
            .doctors(&config.doctors_input)
            .appointments(&config.appointments_input)
            .options(config.pipeline_options());

        #[cfg(feature = "progress")]
        let builder = builder.reader(TableReader::new().with_progress_bar(config.show_progress));

        builder
    }

    /// Set the path to the raw doctors file
    pub fn doctors<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.doctors_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the raw appointments file
    pub fn appointments<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.appointments_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reader(mut self, reader: TableReader) -> Self {
        self.reader = reader;
        self
    }

    /// Receive pipeline events here instead of through `tracing`
    pub fn events(mut self, events: &'a dyn EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Result<EtlRun<'a>> {
        let doctors_path = self.doctors_path.ok_or_else(|| EtlError::Custom {
            message: "Doctors file path not specified".to_string(),
            suggestion: Some("Use .doctors() or set DOCTORS_INPUT".to_string()),
        })?;
        let appointments_path = self.appointments_path.ok_or_else(|| EtlError::Custom {
            message: "Appointments file path not specified".to_string(),
            suggestion: Some("Use .appointments() or set APPOINTMENTS_INPUT".to_string()),
        })?;

        Ok(EtlRun {
            doctors_path,
            appointments_path,
            options: self.options,
            reader: self.reader,
            events: self.events,
        })
    }
}

/// A configured ETL run
pub struct EtlRun<'a> {
    doctors_path: PathBuf,
    appointments_path: PathBuf,
    options: PipelineOptions,
    reader: TableReader,
    events: &'a dyn EventSink,
}

/// Result of an ETL run
#[derive(Debug, Default)]
pub struct EtlOutcome {
    /// Cleaned doctors, if that entity succeeded
    pub doctors: Option<Table>,
    /// Cleaned and reconciled appointments, if that entity succeeded
    pub appointments: Option<Table>,
    /// Entities that failed, with their errors
    pub errors: Vec<(&'static str, EtlError)>,
}

impl EtlOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn doctor_rows(&self) -> usize {
        self.doctors.as_ref().map_or(0, Table::len)
    }

    pub fn appointment_rows(&self) -> usize {
        self.appointments.as_ref().map_or(0, Table::len)
    }
}

impl EtlRun<'_> {
    /// Run both entities and write them to `sink` as the `doctors` and
    /// `appointments` tables
    pub fn execute(&self, sink: &dyn TableSink) -> Result<EtlOutcome> {
        let mut outcome = EtlOutcome::default();

        info!(path = %self.doctors_path.display(), "Running doctors ETL");
        match self.clean(&DoctorPipeline, &self.doctors_path) {
            Ok(doctors) => {
                sink.write(&doctors, &Destination::table(DOCTORS_TABLE))?;
                outcome.doctors = Some(doctors);
            }
            Err(e) => {
                error!(error = %e, "Doctors ETL failed");
                outcome.errors.push((DOCTORS_TABLE, e));
            }
        }

        info!(path = %self.appointments_path.display(), "Running appointments ETL");
        let pipeline = AppointmentPipeline::new(self.options);
        let appointments = self.clean(&pipeline, &self.appointments_path).and_then(|table| {
            let ids = outcome.doctors.as_ref().map(DoctorIds::from_table).transpose()?;
            reconcile_appointments(table, ids.as_ref(), self.events)
        });

        match appointments {
            Ok(appointments) => {
                sink.write(&appointments, &Destination::table(APPOINTMENTS_TABLE))?;
                outcome.appointments = Some(appointments);
            }
            Err(e) => {
                error!(error = %e, "Appointments ETL failed");
                outcome.errors.push((APPOINTMENTS_TABLE, e));
            }
        }

        info!(
            doctors = outcome.doctor_rows(),
            appointments = outcome.appointment_rows(),
            failed = outcome.errors.len(),
            "ETL run finished"
        );
        Ok(outcome)
    }

    fn clean<P: EntityPipeline>(&self, pipeline: &P, path: &Path) -> Result<Table> {
        let raw = self.reader.load(path)?;
        pipeline.run(raw, self.events)
    }
}

/// Clean one raw file and write the result with `sink`
pub fn clean_with_sink<P: EntityPipeline>(
    pipeline: &P,
    reader: &TableReader,
    input: &Path,
    sink: &dyn TableSink,
    destination: &Destination,
    events: &dyn EventSink,
) -> Result<Table> {
    let raw = reader.load(input)?;
    let cleaned = pipeline.run(raw, events)?;
    sink.write(&cleaned, destination)?;
    Ok(cleaned)
}

/// Clean one raw file into a CSV file
pub fn clean_to_file<P: EntityPipeline>(
    pipeline: &P,
    input: &Path,
    output: &Path,
    events: &dyn EventSink,
) -> Result<Table> {
    clean_with_sink(
        pipeline,
        &TableReader::new(),
        input,
        &CsvSink::new(),
        &Destination::file(output),
        events,
    )
}
