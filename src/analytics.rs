/*!
 * Business queries over cleaned doctors and appointments
 *
 * Answers the clinic's recurring questions: which doctor has the most
 * confirmed appointments, how many confirmed appointments a patient has, how
 * many appointments were cancelled in a window, and confirmed counts for every
 * doctor.
 */

use std::collections::{HashMap, HashSet};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::data_types::{Appointment, AppointmentStatus, Doctor};

/// Report engine over typed records
pub struct AppointmentReport<'a> {
    doctors: &'a [Doctor],
    appointments: &'a [Appointment],
}

/// Confirmed appointment count for one doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorCount {
    pub doctor_id: i64,
    pub name: String,
    pub confirmed: usize,
}

impl<'a> AppointmentReport<'a> {
    pub fn new(doctors: &'a [Doctor], appointments: &'a [Appointment]) -> Self {
        Self { doctors, appointments }
    }

    /// Confirmed appointments per doctor, zeros included, most first
    ///
    /// Ties are broken by doctor id so the order is stable.
    pub fn confirmed_per_doctor(&self) -> Vec<DoctorCount> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for appointment in self.appointments.iter().filter(|a| a.is_confirmed()) {
            if let Some(doctor_id) = appointment.doctor_id {
                *counts.entry(doctor_id).or_insert(0) += 1;
            }
        }

        let mut result: Vec<DoctorCount> = self.doctors
            .iter()
            .map(|d| DoctorCount {
                doctor_id: d.id,
                name: d.display_name(),
                confirmed: counts.get(&d.id).copied().unwrap_or(0),
            })
            .collect();

        result.sort_by(|a, b| b.confirmed.cmp(&a.confirmed).then(a.doctor_id.cmp(&b.doctor_id)));
        result
    }

    /// Doctor with the most confirmed appointments
    ///
    /// `None` when no doctor has a confirmed appointment.
    pub fn top_confirmed_doctor(&self) -> Option<DoctorCount> {
        self.confirmed_per_doctor()
            .into_iter()
            .next()
            .filter(|c| c.confirmed > 0)
    }

    /// Confirmed appointments booked by one patient
    pub fn confirmed_for_patient(&self, patient_id: i64) -> usize {
        self.appointments
            .iter()
            .filter(|a| a.patient_id == patient_id && a.is_confirmed())
            .count()
    }

    /// Cancelled appointments with a booking date in `[start, end]`
    pub fn cancelled_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> usize {
        self.appointments
            .iter()
            .filter(|a| a.is_cancelled())
            .filter(|a| a.booking_date.is_some_and(|d| d >= start && d <= end))
            .count()
    }

    /// Basic statistics about the appointment table
    pub fn stats(&self) -> AppointmentStats {
        let mut stats = AppointmentStats {
            total_doctors: self.doctors.len(),
            total_appointments: self.appointments.len(),
            ..Default::default()
        };

        for appointment in self.appointments {
            match &appointment.status {
                Some(AppointmentStatus::Confirmed) => stats.confirmed += 1,
                Some(AppointmentStatus::Cancelled) => stats.cancelled += 1,
                Some(AppointmentStatus::Other(_)) => stats.other_status += 1,
                None => stats.missing_status += 1,
            }
            if appointment.booking_date.is_none() {
                stats.missing_booking_date += 1;
            }
        }

        stats.unique_patients = self.appointments
            .iter()
            .map(|a| a.patient_id)
            .collect::<HashSet<_>>()
            .len();
        stats
    }
}

/// Appointment table statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    pub total_doctors: usize,
    pub total_appointments: usize,
    pub unique_patients: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub other_status: usize,
    pub missing_status: usize,
    pub missing_booking_date: usize,
}

impl AppointmentStats {
    /// Print formatted statistics
    pub fn print_summary(&self) {
        println!("=== Appointment Statistics ===");
        println!("Doctors: {}", self.total_doctors);
        println!("Appointments: {}", self.total_appointments);
        println!("  Confirmed: {}", self.confirmed);
        println!("  Cancelled: {}", self.cancelled);
        println!("  Other status: {}", self.other_status);
        println!("  Missing status: {}", self.missing_status);
        println!("Missing booking dates: {}", self.missing_booking_date);
        println!("Unique patients: {}", self.unique_patients);

        if self.total_appointments > 0 {
            let confirmed_percent = (self.confirmed as f64 / self.total_appointments as f64) * 100.0;
            println!("Confirmed Percentage: {:.1}%", confirmed_percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn doctor(id: i64, name: &str) -> Doctor {
        Doctor { id, name: Some(name.to_string()), specialty: None }
    }

    fn appointment(id: i64, patient: i64, doctor: i64, date: NaiveDateTime, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Some(id),
            patient_id: patient,
            doctor_id: Some(doctor),
            booking_date: Some(date),
            status: Some(status),
        }
    }

    fn fixture() -> (Vec<Doctor>, Vec<Appointment>) {
        let doctors = vec![doctor(1, "A"), doctor(2, "B"), doctor(3, "C")];
        let appointments = vec![
            appointment(1, 34, 2, at(2025, 10, 20, 9), AppointmentStatus::Confirmed),
            appointment(2, 34, 2, at(2025, 10, 21, 0), AppointmentStatus::Confirmed),
            appointment(3, 7, 1, at(2025, 10, 21, 0), AppointmentStatus::Cancelled),
            appointment(4, 34, 1, at(2025, 10, 24, 23), AppointmentStatus::Cancelled),
            appointment(5, 8, 1, at(2025, 10, 25, 0), AppointmentStatus::Cancelled),
            appointment(6, 8, 1, at(2025, 10, 22, 0), AppointmentStatus::Confirmed),
        ];
        (doctors, appointments)
    }

    #[test]
    fn test_confirmed_per_doctor_includes_zero() {
        let (doctors, appointments) = fixture();
        let report = AppointmentReport::new(&doctors, &appointments);
        let counts: Vec<_> = report.confirmed_per_doctor().into_iter().map(|c| (c.doctor_id, c.confirmed)).collect();
        assert_eq!(counts, vec![(2, 2), (1, 1), (3, 0)]);
    }

    #[test]
    fn test_top_confirmed_doctor() {
        let (doctors, appointments) = fixture();
        let report = AppointmentReport::new(&doctors, &appointments);
        let top = report.top_confirmed_doctor().unwrap();
        assert_eq!(top.name, "B");
        assert_eq!(top.confirmed, 2);

        let none = AppointmentReport::new(&doctors, &[]);
        assert!(none.top_confirmed_doctor().is_none());
    }

    #[test]
    fn test_confirmed_for_patient() {
        let (doctors, appointments) = fixture();
        let report = AppointmentReport::new(&doctors, &appointments);
        assert_eq!(report.confirmed_for_patient(34), 2);
        assert_eq!(report.confirmed_for_patient(99), 0);
    }

    #[test]
    fn test_cancelled_window_is_inclusive() {
        let (doctors, appointments) = fixture();
        let report = AppointmentReport::new(&doctors, &appointments);
        let start = at(2025, 10, 21, 0);
        let end = NaiveDate::from_ymd_opt(2025, 10, 24).unwrap().and_hms_opt(23, 59, 59).unwrap();
        assert_eq!(report.cancelled_between(start, end), 2);
    }

    #[test]
    fn test_stats() {
        let (doctors, mut appointments) = fixture();
        appointments[0].status = None;
        appointments[1].booking_date = None;
        let stats = AppointmentReport::new(&doctors, &appointments).stats();

        assert_eq!(stats.total_appointments, 6);
        assert_eq!(stats.confirmed, 2);
        assert_eq!(stats.cancelled, 3);
        assert_eq!(stats.missing_status, 1);
        assert_eq!(stats.missing_booking_date, 1);
        assert_eq!(stats.unique_patients, 3);
    }
}
