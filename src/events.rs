/*!
 * Pipeline events
 *
 * Data-quality problems never raise errors; they are counted and delivered to
 * an `EventSink` passed explicitly into every stage. The CLI forwards events
 * to `tracing`; tests collect them.
 */

use std::sync::Mutex;
use serde::Serialize;
use tracing::{info, warn};

/// Something a pipeline stage observed about the data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A raw table was handed to a pipeline
    RowsLoaded { entity: String, rows: usize },
    /// Present values that a cleaner could not coerce and replaced with null
    FieldsDegraded { column: String, count: usize },
    /// Rows dropped because a required column was null
    NullRowsRemoved { column: String, before: usize, after: usize },
    /// Exact duplicate rows dropped
    DuplicatesRemoved { removed: usize, remaining: usize },
    /// Per-column null counts of a finished table
    NullSummary { counts: Vec<(String, usize)> },
    /// Appointments dropped because their doctor is unknown
    OrphansRemoved { removed: usize, remaining: usize },
    /// Reconciliation did not run because no doctor ids were available
    ReconciliationSkipped { rows: usize },
    /// A pipeline finished
    PipelineCompleted { entity: String, rows: usize },
}

/// Receiver for pipeline events
pub trait EventSink {
    fn emit(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent),
{
    fn emit(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RowsLoaded { entity, rows } => {
                info!(entity = %entity, rows, "Records loaded");
            }
            PipelineEvent::FieldsDegraded { column, count } => {
                if *count > 0 {
                    warn!(column = %column, count, "Values could not be cleaned and were set to null");
                }
            }
            PipelineEvent::NullRowsRemoved { column, before, after } => {
                info!(
                    column = %column,
                    removed = before - after,
                    "Records after removing null {}: {} ({} removed)",
                    column,
                    after,
                    before - after
                );
            }
            PipelineEvent::DuplicatesRemoved { removed, remaining } => {
                info!(removed, remaining, "Duplicate records detected: {}", removed);
            }
            PipelineEvent::NullSummary { counts } => {
                let summary = counts
                    .iter()
                    .map(|(col, n)| format!("{}={}", col, n))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!("Null values summary: {}", summary);
            }
            PipelineEvent::OrphansRemoved { removed, remaining } => {
                if *removed > 0 {
                    warn!(removed, remaining, "Filtered {} appointments with invalid doctor_ids", removed);
                } else {
                    info!(remaining, "All appointments reference known doctors");
                }
            }
            PipelineEvent::ReconciliationSkipped { rows } => {
                warn!(rows, "Doctor ids unavailable; appointments were not checked against doctors");
            }
            PipelineEvent::PipelineCompleted { entity, rows } => {
                info!(entity = %entity, rows, "Pipeline completed");
            }
        }
    }
}

/// Records every event, for tests and run summaries
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Total rows removed by null checks on `column`
    pub fn null_rows_removed(&self, column: &str) -> usize {
        self.events()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::NullRowsRemoved { column: c, before, after } if c == column => {
                    Some(before - after)
                }
                _ => None,
            })
            .sum()
    }

    /// Total values degraded to null in `column`
    pub fn degraded(&self, column: &str) -> usize {
        self.events()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::FieldsDegraded { column: c, count } if c == column => Some(*count),
                _ => None,
            })
            .sum()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Sends every event to two sinks
pub struct TeeEventSink<'a> {
    first: &'a dyn EventSink,
    second: &'a dyn EventSink,
}

impl<'a> TeeEventSink<'a> {
    pub fn new(first: &'a dyn EventSink, second: &'a dyn EventSink) -> Self {
        Self { first, second }
    }
}

impl EventSink for TeeEventSink<'_> {
    fn emit(&self, event: &PipelineEvent) {
        self.first.emit(event);
        self.second.emit(event);
    }
}
