/*!
 * Typed views of cleaned records
 *
 * Pipelines work on dynamic `Table`s; once a table is cleaned its rows can be
 * read back as `Doctor` or `Appointment` values for reporting and export.
 */

use std::fmt;
use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;

use crate::{Result, EtlError};
use crate::table::{Table, Value};
use crate::constants::{STATUS_CANCELLED, STATUS_CONFIRMED};

/// Normalized appointment status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    /// Any other letters-only status, kept as-is
    Other(String),
}

impl AppointmentStatus {
    /// Classify an already-normalized status string
    pub fn from_normalized(status: &str) -> Self {
        match status {
            STATUS_CONFIRMED => AppointmentStatus::Confirmed,
            STATUS_CANCELLED => AppointmentStatus::Cancelled,
            other => AppointmentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Confirmed => STATUS_CONFIRMED,
            AppointmentStatus::Cancelled => STATUS_CANCELLED,
            AppointmentStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cleaned doctor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: Option<String>,
    pub specialty: Option<String>,
}

impl Doctor {
    /// Read every row of a cleaned doctors table
    pub fn from_table(table: &Table) -> Result<Vec<Doctor>> {
        let id = table.column_index("id")?;
        let name = table.column_index("name")?;
        let specialty = table.column_index("specialty")?;

        table.rows()
            .iter()
            .enumerate()
            .map(|(line, row)| {
                let doctor_id = row[id].as_i64().ok_or_else(|| uncleaned("id", line, &row[id]))?;
                Ok(Doctor {
                    id: doctor_id,
                    name: text(&row[name]),
                    specialty: text(&row[specialty]),
                })
            })
            .collect()
    }

    /// Name for display, falling back to the id
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Doctor #{}", self.id))
    }
}

/// A cleaned appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Option<i64>,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub booking_date: Option<NaiveDateTime>,
    pub status: Option<AppointmentStatus>,
}

impl Appointment {
    /// Read every row of a cleaned appointments table
    pub fn from_table(table: &Table) -> Result<Vec<Appointment>> {
        let id = table.column_index("id")?;
        let patient_id = table.column_index("patient_id")?;
        let doctor_id = table.column_index("doctor_id")?;
        let booking_date = table.column_index("booking_date")?;
        let status = table.column_index("status")?;

        table.rows()
            .iter()
            .enumerate()
            .map(|(line, row)| {
                let patient = row[patient_id]
                    .as_i64()
                    .ok_or_else(|| uncleaned("patient_id", line, &row[patient_id]))?;
                Ok(Appointment {
                    id: row[id].as_i64(),
                    patient_id: patient,
                    doctor_id: row[doctor_id].as_i64(),
                    booking_date: timestamp(&row[booking_date]),
                    status: row[status].as_str().map(AppointmentStatus::from_normalized),
                })
            })
            .collect()
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == Some(AppointmentStatus::Confirmed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == Some(AppointmentStatus::Cancelled)
    }
}

/// A cleaned date, either typed or as written back to a file by a sink
fn timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Text(s) => ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s.trim(), format).ok()),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

fn uncleaned(column: &str, row: usize, value: &Value) -> EtlError {
    EtlError::Custom {
        message: format!(
            "Row {} has an uncleaned {} value '{}' ({})",
            row,
            column,
            value,
            value.kind()
        ),
        suggestion: Some("Run the table through its pipeline before reading typed records".to_string()),
    }
}
