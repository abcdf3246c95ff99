use crate::model::*;

use super::Engine;

impl Engine {
    pub async fn get_appointments(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        self.store.read().await.get_appointments(filter)
    }

    pub async fn get_appointment(&self, id: &AppointmentId) -> Option<Appointment> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn appointment_count(&self) -> usize {
        self.store.read().await.len()
    }
}
