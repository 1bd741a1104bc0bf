use non_empty_string::NonEmptyString;

/// Parses a personal name or model description.
///
/// Surrounding whitespace is trimmed; the remainder must be non-empty.
///
/// # Errors
///
/// Returns [`EmptyNameError`] if nothing is left after trimming.
pub fn parse_name(s: &str) -> Result<NonEmptyString, EmptyNameError> {
    NonEmptyString::new(s.trim().to_string()).map_err(|_| EmptyNameError)
}

/// Error returned when a name is empty or only whitespace.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("name must not be empty")]
pub struct EmptyNameError;
