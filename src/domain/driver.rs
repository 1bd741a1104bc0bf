use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use uuid::Uuid;

use crate::domain::{LicenseNumber, NationalId};

/// A driver who may operate one vehicle.
///
/// `vehicle_id` is one half of a bidirectional link; the vehicle's
/// `driver_id` is the other half. Both are only written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub(crate) id: Uuid,
    pub(crate) national_id: NationalId,
    pub(crate) first_name: NonEmptyString,
    pub(crate) last_name: NonEmptyString,
    pub(crate) license_number: LicenseNumber,
    pub(crate) vehicle_id: Option<Uuid>,
    pub(crate) created: DateTime<Utc>,
}

/// The data required to register a new driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    /// National ID, the business key.
    pub national_id: NationalId,
    /// Given name.
    pub first_name: NonEmptyString,
    /// Family name.
    pub last_name: NonEmptyString,
    /// Driver's license number.
    pub license_number: LicenseNumber,
}

/// A partial update to a driver. Only the supplied fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverPatch {
    /// Replacement given name.
    pub first_name: Option<NonEmptyString>,
    /// Replacement family name.
    pub last_name: Option<NonEmptyString>,
    /// Replacement license number.
    pub license_number: Option<LicenseNumber>,
}

impl Driver {
    pub(crate) fn new(data: NewDriver) -> Self {
        Self {
            id: Uuid::new_v4(),
            national_id: data.national_id,
            first_name: data.first_name,
            last_name: data.last_name,
            license_number: data.license_number,
            vehicle_id: None,
            created: Utc::now(),
        }
    }

    pub(crate) fn apply(&mut self, patch: DriverPatch) {
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        if let Some(license_number) = patch.license_number {
            self.license_number = license_number;
        }
    }

    /// Internal surrogate identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// National ID, the business key.
    #[must_use]
    pub const fn national_id(&self) -> &NationalId {
        &self.national_id
    }

    /// Given name.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.first_name.as_str()
    }

    /// Family name.
    #[must_use]
    pub fn last_name(&self) -> &str {
        self.last_name.as_str()
    }

    /// Driver's license number.
    #[must_use]
    pub const fn license_number(&self) -> &LicenseNumber {
        &self.license_number
    }

    /// The vehicle this driver operates, if any.
    #[must_use]
    pub const fn vehicle_id(&self) -> Option<Uuid> {
        self.vehicle_id
    }

    /// When the driver was registered.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }
}
