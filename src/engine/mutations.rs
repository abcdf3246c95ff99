use tracing::{debug, info, warn};

use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    pub async fn create_appointment(&self, req: NewAppointment) -> Result<Appointment, EngineError> {
        let mut guard = self.store.write().await;
        match guard.create_appointment(req) {
            Ok(appt) => {
                info!(
                    tenant = %self.tenant,
                    id = %appt.id,
                    doctor = %appt.doctor_name,
                    date = %appt.date,
                    time = %appt.time,
                    duration = appt.duration,
                    "appointment created"
                );
                metrics::counter!(observability::APPOINTMENTS_CREATED_TOTAL).increment(1);
                Ok(appt)
            }
            Err(e @ EngineError::Conflict { .. }) => {
                warn!(tenant = %self.tenant, "booking rejected: {e}");
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                Err(e)
            }
            Err(e) => {
                debug!(tenant = %self.tenant, "create rejected: {e}");
                Err(e)
            }
        }
    }

    pub async fn update_appointment_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, EngineError> {
        let appt = self
            .store
            .write()
            .await
            .update_appointment_status(&id, status)?;
        info!(tenant = %self.tenant, %id, %status, "appointment status updated");
        metrics::counter!(observability::STATUS_UPDATES_TOTAL, "status" => status.label())
            .increment(1);
        Ok(appt)
    }
}
