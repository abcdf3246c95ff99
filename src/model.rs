use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes: time-of-day offsets from midnight and durations.
pub type Minutes = u32;

pub type AppointmentId = Ulid;

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Span starting at `start` lasting `duration` minutes.
    pub fn starting_at(start: Minutes, duration: Minutes) -> Self {
        Self::new(start, start + duration)
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Lifecycle label of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Confirmed,
    Scheduled,
    Upcoming,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Upcoming,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Upcoming => "Upcoming",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
        }
    }

    /// Cancelled appointments never take part in conflict checks.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.label() == s)
            .ok_or_else(|| UnknownLabel { kind: "status", value: s.to_string() })
    }
}

/// Delivery channel of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentMode {
    #[serde(rename = "In-Person")]
    InPerson,
    Video,
    Phone,
}

impl AppointmentMode {
    pub const ALL: [AppointmentMode; 3] = [
        AppointmentMode::InPerson,
        AppointmentMode::Video,
        AppointmentMode::Phone,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentMode::InPerson => "In-Person",
            AppointmentMode::Video => "Video",
            AppointmentMode::Phone => "Phone",
        }
    }
}

impl fmt::Display for AppointmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AppointmentMode {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.label() == s)
            .ok_or_else(|| UnknownLabel { kind: "mode", value: s.to_string() })
    }
}

/// A label that matched none of an enumeration's canonical labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownLabel {}

/// A stored appointment. Serialized field names are the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour
    pub time: String,
    pub duration: Minutes,
    pub doctor_name: String,
    pub status: AppointmentStatus,
    pub mode: AppointmentMode,
    #[serde(rename = "type")]
    pub appointment_type: String,
}

/// Creation request. Every field is optional so that missing fields are
/// reported by the store in a fixed order rather than by whoever built this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAppointment {
    /// Client-chosen id; assigned by the store when absent.
    pub id: Option<AppointmentId>,
    pub patient_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<Minutes>,
    pub doctor_name: Option<String>,
    /// Raw label, validated against [`AppointmentMode`] at creation.
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub appointment_type: Option<String>,
}

/// Equality predicates for retrieval. `None` leaves the field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub date: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub doctor_name: Option<String>,
}

impl AppointmentFilter {
    pub fn matches(&self, appt: &Appointment) -> bool {
        if let Some(date) = &self.date
            && appt.date != *date
        {
            return false;
        }
        if let Some(status) = self.status
            && appt.status != status
        {
            return false;
        }
        if let Some(doctor) = &self.doctor_name
            && appt.doctor_name != *doctor
        {
            return false;
        }
        true
    }
}
