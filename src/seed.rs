//! Demo schedule loaded into new tenants when `DOCKET_SEED` is set.

use ulid::Ulid;

use crate::engine::{AppointmentStore, EngineError};
use crate::model::*;

use crate::model::AppointmentMode::*;
use crate::model::AppointmentStatus::*;

type Row = (
    &'static str, // patient
    &'static str, // date
    &'static str, // time
    Minutes,
    &'static str, // doctor
    AppointmentStatus,
    AppointmentMode,
    &'static str, // type
);

const DEMO_SCHEDULE: [Row; 11] = [
    ("Rajesh Kumar", "2025-12-28", "09:00", 30, "Dr. Sarah Johnson", Upcoming, InPerson, "General Checkup"),
    ("Priya Sharma", "2025-12-28", "09:30", 30, "Dr. Michael Chen", Upcoming, Video, "Follow-up"),
    ("Amit Patel", "2025-12-28", "10:00", 45, "Dr. Sarah Johnson", Completed, InPerson, "Lab Results"),
    ("Sneha Reddy", "2025-12-28", "10:30", 30, "Dr. David Lee", Upcoming, Video, "Consultation"),
    ("Vikram Singh", "2025-12-28", "11:00", 60, "Dr. Emily White", Cancelled, InPerson, "Surgery Prep"),
    ("John Doe", "2025-12-29", "09:00", 30, "Dr. Sarah Johnson", Scheduled, InPerson, "General Checkup"),
    ("Jane Smith", "2025-12-27", "14:00", 30, "Dr. Michael Chen", Completed, Phone, "Consultation"),
    ("Robert Brown", "2025-12-30", "11:00", 45, "Dr. Sarah Johnson", Scheduled, InPerson, "Physical Therapy"),
    ("Emily Davis", "2025-12-28", "15:00", 30, "Dr. Sarah Johnson", Confirmed, Video, "Follow-up"),
    ("Michael Wilson", "2025-12-28", "16:00", 30, "Dr. David Lee", Scheduled, InPerson, "Dental Checkup"),
    ("Sarah Connor", "2025-12-28", "13:00", 15, "Dr. Emily White", Scheduled, InPerson, "Urgent Care - Stitches"),
];

/// The demo schedule as records with fresh ids and their original statuses.
pub fn demo_appointments() -> Vec<Appointment> {
    DEMO_SCHEDULE
        .iter()
        .map(|&(patient, date, time, duration, doctor, status, mode, kind)| Appointment {
            id: Ulid::new(),
            patient_name: patient.into(),
            date: date.into(),
            time: time.into(),
            duration,
            doctor_name: doctor.into(),
            status,
            mode,
            appointment_type: kind.into(),
        })
        .collect()
}

pub fn seeded_store() -> Result<AppointmentStore, EngineError> {
    let mut store = AppointmentStore::new();
    for appt in demo_appointments() {
        store.insert_unchecked(appt)?;
    }
    Ok(store)
}
