//! Colour of an individual status code.

use super::StoplightStatus;
use crate::api::is_error_code;
use crate::policy::StatusCodeOverrides;

/// Colour for one status code: override lists first (red > yellow > green),
/// then 2xx green, `>= 400` or `0` red, anything else yellow.
pub fn code_status(code: u16, overrides: &StatusCodeOverrides) -> StoplightStatus {
    if let Some(status) = overrides.lookup(code) {
        return status;
    }

    if is_error_code(code) {
        StoplightStatus::Red
    } else if (200..300).contains(&code) {
        StoplightStatus::Green
    } else {
        StoplightStatus::Yellow
    }
}
