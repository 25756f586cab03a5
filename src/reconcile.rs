/*!
 * Cross-entity reconciliation
 *
 * Appointments must reference a doctor that survived cleaning. The set of
 * known doctor ids is passed in explicitly; when it is absent the appointment
 * table passes through unchanged and the skip is reported.
 */

use std::collections::HashSet;

use crate::Result;
use crate::events::{EventSink, PipelineEvent};
use crate::table::Table;

/// Ids of the doctors in a cleaned doctors table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorIds(HashSet<i64>);

impl DoctorIds {
    /// Collect the non-null `id` values of a cleaned doctors table
    pub fn from_table(doctors: &Table) -> Result<Self> {
        Ok(Self(doctors.column_values("id")?.filter_map(|v| v.as_i64()).collect()))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i64> for DoctorIds {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Keep only appointments whose `doctor_id` is a known doctor
///
/// A null `doctor_id` never matches. With `doctor_ids` set to `None` the
/// table is returned unfiltered.
pub fn reconcile_appointments(
    mut appointments: Table,
    doctor_ids: Option<&DoctorIds>,
    events: &dyn EventSink,
) -> Result<Table> {
    let idx = appointments.column_index("doctor_id")?;

    let Some(ids) = doctor_ids else {
        events.emit(&PipelineEvent::ReconciliationSkipped { rows: appointments.len() });
        return Ok(appointments);
    };

    let before = appointments.len();
    appointments.retain_rows(|row| row[idx].as_i64().is_some_and(|id| ids.contains(id)));

    events.emit(&PipelineEvent::OrphansRemoved {
        removed: before - appointments.len(),
        remaining: appointments.len(),
    });
    Ok(appointments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::table::Value;

    fn appointments() -> Table {
        Table::from_rows(
            ["id", "doctor_id"],
            vec![
                vec![Value::Int(1), Value::Int(1)],
                vec![Value::Int(2), Value::Int(9)],
                vec![Value::Int(3), Value::Null],
                vec![Value::Int(4), Value::Int(2)],
            ],
        ).unwrap()
    }

    #[test]
    fn test_unknown_and_null_doctors_dropped() {
        let events = CollectingEventSink::new();
        let ids: DoctorIds = [1, 2].into_iter().collect();
        let out = reconcile_appointments(appointments(), Some(&ids), &events).unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.column_values("doctor_id").unwrap().all(|v| v.as_i64().is_some_and(|id| ids.contains(id))));
        assert_eq!(events.events(), vec![PipelineEvent::OrphansRemoved { removed: 2, remaining: 2 }]);
    }

    #[test]
    fn test_missing_ids_pass_through() {
        let events = CollectingEventSink::new();
        let out = reconcile_appointments(appointments(), None, &events).unwrap();

        assert_eq!(out, appointments());
        assert_eq!(events.events(), vec![PipelineEvent::ReconciliationSkipped { rows: 4 }]);
    }

    #[test]
    fn test_empty_id_set_drops_everything() {
        let events = CollectingEventSink::new();
        let out = reconcile_appointments(appointments(), Some(&DoctorIds::default()), &events).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_doctor_ids_from_table() {
        let doctors = Table::from_rows(
            ["id", "name"],
            vec![vec![Value::Int(1), Value::from("A")], vec![Value::Int(2), Value::from("B")]],
        ).unwrap();
        let ids = DoctorIds::from_table(&doctors).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(1) && ids.contains(2) && !ids.contains(3));
    }
}
