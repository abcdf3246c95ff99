use std::collections::HashMap;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, parse_time_to_minutes, validate_date, validate_duration};
use super::EngineError;

/// Insertion-ordered appointment records plus an id → position index.
/// Records are never removed, so positions stay valid.
#[derive(Debug, Default)]
pub struct AppointmentStore {
    appointments: Vec<Appointment>,
    by_id: HashMap<AppointmentId, usize>,
}

impl AppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn get(&self, id: &AppointmentId) -> Option<&Appointment> {
        self.by_id.get(id).map(|&pos| &self.appointments[pos])
    }

    /// Every appointment matching all predicates of `filter`, in insertion order.
    pub fn get_appointments(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        self.appointments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect()
    }

    /// Validate, conflict-check and append. The store is untouched on error.
    pub fn create_appointment(&mut self, req: NewAppointment) -> Result<Appointment, EngineError> {
        let NewAppointment {
            id,
            patient_name,
            date,
            time,
            duration,
            doctor_name,
            mode,
            appointment_type,
        } = req;

        let patient_name = required("patientName", patient_name)?;
        let date = required("date", date)?;
        let time = required("time", time)?;
        let duration = duration.ok_or(EngineError::MissingField("duration"))?;
        let doctor_name = required("doctorName", doctor_name)?;
        let mode = required("mode", mode)?;
        let appointment_type = required("type", appointment_type)?;

        validate_date(&date)?;
        let start = parse_time_to_minutes(&time)?;
        validate_duration(duration)?;
        let mode: AppointmentMode = mode.parse()?;

        for text in [&patient_name, &doctor_name, &appointment_type] {
            if text.len() > MAX_TEXT_LEN {
                return Err(EngineError::LimitExceeded("text field too long"));
            }
        }
        if self.appointments.len() >= MAX_APPOINTMENTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }
        if let Some(id) = id
            && self.by_id.contains_key(&id)
        {
            return Err(EngineError::AlreadyExists(id));
        }

        let span = Span::starting_at(start, duration);
        check_no_conflict(&self.appointments, &doctor_name, &date, &span)?;

        let appt = Appointment {
            id: id.unwrap_or_else(Ulid::new),
            patient_name,
            date,
            time,
            duration,
            doctor_name,
            status: AppointmentStatus::Scheduled,
            mode,
            appointment_type,
        };
        self.push(appt.clone());
        Ok(appt)
    }

    pub fn update_appointment_status(
        &mut self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, EngineError> {
        let pos = *self.by_id.get(id).ok_or(EngineError::NotFound(*id))?;
        let appt = &mut self.appointments[pos];
        appt.status = status;
        Ok(appt.clone())
    }

    /// Append a fully-formed record without validation or conflict checks.
    /// Used for fixtures whose consistency is known up front.
    pub(crate) fn insert_unchecked(&mut self, appt: Appointment) -> Result<(), EngineError> {
        if self.by_id.contains_key(&appt.id) {
            return Err(EngineError::AlreadyExists(appt.id));
        }
        self.push(appt);
        Ok(())
    }

    fn push(&mut self, appt: Appointment) {
        self.by_id.insert(appt.id, self.appointments.len());
        self.appointments.push(appt);
    }
}

/// Absent and empty strings both count as missing.
fn required(field: &'static str, value: Option<String>) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::MissingField(field)),
    }
}
