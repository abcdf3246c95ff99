use chrono::NaiveDate;

use crate::limits::MINUTES_PER_DAY;
use crate::model::*;

use super::EngineError;

/// `"HH:MM"` → minutes since midnight. Exactly two colon-separated numeric
/// parts, hour below 24 and minute below 60.
pub fn parse_time_to_minutes(s: &str) -> Result<Minutes, EngineError> {
    let parse_err = || EngineError::Parse(s.to_string());
    let (h, m) = s.split_once(':').ok_or_else(parse_err)?;
    if m.contains(':') {
        return Err(parse_err());
    }
    let hour = parse_component(h).ok_or_else(parse_err)?;
    let minute = parse_component(m).ok_or_else(parse_err)?;
    if hour >= 24 || minute >= 60 {
        return Err(parse_err());
    }
    Ok(hour * 60 + minute)
}

fn parse_component(s: &str) -> Option<Minutes> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

pub(crate) fn validate_date(s: &str) -> Result<(), EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| EngineError::InvalidDate(s.to_string()))
}

pub(crate) fn validate_duration(duration: Minutes) -> Result<(), EngineError> {
    if duration == 0 || duration > MINUTES_PER_DAY {
        return Err(EngineError::InvalidDuration(duration));
    }
    Ok(())
}

/// The `[start, start + duration)` span an appointment occupies.
pub(crate) fn appointment_span(appt: &Appointment) -> Result<Span, EngineError> {
    let start = parse_time_to_minutes(&appt.time)?;
    Ok(Span::starting_at(start, appt.duration))
}

/// Scan in storage order and fail on the first active appointment of `doctor`
/// on `date` whose span overlaps `span`.
pub(crate) fn check_no_conflict<'a>(
    existing: impl IntoIterator<Item = &'a Appointment>,
    doctor: &str,
    date: &str,
    span: &Span,
) -> Result<(), EngineError> {
    for appt in existing {
        if appt.doctor_name != doctor || appt.date != date || !appt.status.occupies_slot() {
            continue;
        }
        if appointment_span(appt)?.overlaps(span) {
            return Err(EngineError::Conflict {
                doctor: doctor.to_string(),
                time: appt.time.clone(),
            });
        }
    }
    Ok(())
}
