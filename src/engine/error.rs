use crate::model::{AppointmentId, Minutes, UnknownLabel};

#[derive(Debug)]
pub enum EngineError {
    /// A required creation field was absent; the first one in field order.
    MissingField(&'static str),
    InvalidEnum {
        kind: &'static str,
        value: String,
    },
    /// Malformed `HH:MM` time of day.
    Parse(String),
    InvalidDate(String),
    InvalidDuration(Minutes),
    /// Overlaps an active appointment of `doctor` that starts at `time`.
    Conflict {
        doctor: String,
        time: String,
    },
    NotFound(AppointmentId),
    AlreadyExists(AppointmentId),
    LimitExceeded(&'static str),
}

impl From<UnknownLabel> for EngineError {
    fn from(e: UnknownLabel) -> Self {
        EngineError::InvalidEnum {
            kind: e.kind,
            value: e.value,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingField(field) => write!(f, "missing field: {field}"),
            EngineError::InvalidEnum { kind, value } => write!(f, "invalid {kind}: {value:?}"),
            EngineError::Parse(s) => write!(f, "invalid time of day: {s:?} (expected HH:MM)"),
            EngineError::InvalidDate(s) => write!(f, "invalid date: {s:?} (expected YYYY-MM-DD)"),
            EngineError::InvalidDuration(d) => write!(f, "invalid duration: {d} minutes"),
            EngineError::Conflict { doctor, time } => write!(
                f,
                "time conflict detected with existing appointment for {doctor} at {time}"
            ),
            EngineError::NotFound(id) => write!(f, "appointment not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
