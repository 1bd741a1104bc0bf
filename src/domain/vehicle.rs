use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use uuid::Uuid;

use crate::domain::PlateNumber;

/// A vehicle with a fixed seating capacity and at most one driver.
///
/// Occupancy is not stored here; it is always counted from the children
/// that reference this vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub(crate) id: Uuid,
    pub(crate) plate_number: PlateNumber,
    pub(crate) model: NonEmptyString,
    pub(crate) capacity: u16,
    pub(crate) driver_id: Option<Uuid>,
    pub(crate) created: DateTime<Utc>,
}

/// The data required to register a new vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVehicle {
    /// Plate number, the business key.
    pub plate_number: PlateNumber,
    /// Make and model description.
    pub model: NonEmptyString,
    /// Number of children the vehicle can carry.
    pub capacity: u16,
}

/// A partial update to a vehicle. Only the supplied fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehiclePatch {
    /// Replacement model description.
    pub model: Option<NonEmptyString>,
    /// Replacement capacity. Must not drop below current occupancy.
    pub capacity: Option<u16>,
}

impl Vehicle {
    pub(crate) fn new(data: NewVehicle) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate_number: data.plate_number,
            model: data.model,
            capacity: data.capacity,
            driver_id: None,
            created: Utc::now(),
        }
    }

    pub(crate) fn apply(&mut self, patch: VehiclePatch) {
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
    }

    /// Internal surrogate identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Plate number, the business key.
    #[must_use]
    pub const fn plate_number(&self) -> &PlateNumber {
        &self.plate_number
    }

    /// Make and model description.
    #[must_use]
    pub fn model(&self) -> &str {
        self.model.as_str()
    }

    /// Number of children the vehicle can carry.
    #[must_use]
    pub const fn capacity(&self) -> u16 {
        self.capacity
    }

    /// The driver assigned to this vehicle, if any.
    #[must_use]
    pub const fn driver_id(&self) -> Option<Uuid> {
        self.driver_id
    }

    /// When the vehicle was registered.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }
}
