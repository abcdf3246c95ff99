use crate::model::Minutes;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 63;
pub const MAX_APPOINTMENTS_PER_TENANT: usize = 100_000;
/// Patient, doctor and appointment-type strings.
pub const MAX_TEXT_LEN: usize = 256;
/// An appointment cannot run past the day it starts on.
pub const MINUTES_PER_DAY: Minutes = 24 * 60;
