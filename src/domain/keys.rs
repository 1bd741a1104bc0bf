//! Business keys.
//!
//! Records are addressed by externally meaningful identifiers rather than by
//! their internal UUIDs. Each key type validates and normalizes its input on
//! construction, so a value of the type is always well-formed.

use std::{fmt, ops::Deref, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A national identity number, used as the business key for children and
/// drivers.
///
/// Must consist of 7 or 8 ASCII digits. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    /// Creates a new `NationalId`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidNationalId`] if the trimmed input is not 7 or 8 ASCII
    /// digits.
    pub fn new(s: impl AsRef<str>) -> Result<Self, InvalidNationalId> {
        let trimmed = s.as_ref().trim();
        if (7..=8).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidNationalId(s.as_ref().to_string()))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error returned when a string is not a valid national ID.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid national ID '{0}': must be 7 or 8 digits")]
pub struct InvalidNationalId(String);

/// A vehicle plate number, used as the business key for vehicles.
///
/// Three letters followed by three or four digits (for example `ABC123` or
/// `ABC1234`). Input is trimmed and normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlateNumber(String);

static PLATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[0-9]{3,4}$").expect("plate pattern is valid"));

impl PlateNumber {
    /// Creates a new `PlateNumber`, normalizing to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPlateNumber`] if the normalized input does not match
    /// three letters followed by three or four digits.
    pub fn new(s: impl AsRef<str>) -> Result<Self, InvalidPlateNumber> {
        let normalized = s.as_ref().trim().to_uppercase();
        if PLATE_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(InvalidPlateNumber(s.as_ref().to_string()))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error returned when a string is not a valid plate number.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid plate number '{0}': expected 3 letters followed by 3 or 4 digits")]
pub struct InvalidPlateNumber(String);

/// A driver's license number.
///
/// 8 to 10 characters once trimmed, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseNumber(String);

impl LicenseNumber {
    /// Creates a new `LicenseNumber`, normalizing to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLicenseNumber`] if the trimmed input is not 8 to 10
    /// characters long.
    pub fn new(s: impl AsRef<str>) -> Result<Self, InvalidLicenseNumber> {
        let normalized = s.as_ref().trim().to_uppercase();
        if (8..=10).contains(&normalized.chars().count()) {
            Ok(Self(normalized))
        } else {
            Err(InvalidLicenseNumber(s.as_ref().to_string()))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error returned when a string is not a valid license number.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid license number '{0}': must be 8 to 10 characters")]
pub struct InvalidLicenseNumber(String);

macro_rules! string_key {
    ($ty:ident, $err:ident) => {
        impl FromStr for $ty {
            type Err = $err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = $err;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(key: $ty) -> Self {
                key.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $ty {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.pad(&self.0)
            }
        }
    };
}

string_key!(NationalId, InvalidNationalId);
string_key!(PlateNumber, InvalidPlateNumber);
string_key!(LicenseNumber, InvalidLicenseNumber);
