use std::fmt;

use uuid::Uuid;

use crate::domain::{Child, Driver, NationalId, PlateNumber, Vehicle};

/// The three kinds of record held in a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// A child riding a vehicle.
    Child,
    /// A driver operating a vehicle.
    Driver,
    /// A vehicle.
    Vehicle,
}

impl Kind {
    /// All kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Child, Self::Driver, Self::Vehicle];

    /// Lowercase singular name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Driver => "driver",
            Self::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A business key qualified by the kind of record it addresses.
///
/// Children and drivers share the same key type, so the kind is needed to
/// tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// Key of a child.
    Child(NationalId),
    /// Key of a driver.
    Driver(NationalId),
    /// Key of a vehicle.
    Vehicle(PlateNumber),
}

impl EntityKey {
    /// The kind of record this key addresses.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Child(_) => Kind::Child,
            Self::Driver(_) => Kind::Driver,
            Self::Vehicle(_) => Kind::Vehicle,
        }
    }

    /// The bare key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Child(id) | Self::Driver(id) => id.as_str(),
            Self::Vehicle(plate) => plate.as_str(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.as_str())
    }
}

/// A record of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// A child record.
    Child(Child),
    /// A driver record.
    Driver(Driver),
    /// A vehicle record.
    Vehicle(Vehicle),
}

impl Entity {
    /// The business key of this record.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Child(child) => EntityKey::Child(child.national_id.clone()),
            Self::Driver(driver) => EntityKey::Driver(driver.national_id.clone()),
            Self::Vehicle(vehicle) => EntityKey::Vehicle(vehicle.plate_number.clone()),
        }
    }

    /// The surrogate id of this record.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Child(child) => child.id,
            Self::Driver(driver) => driver.id,
            Self::Vehicle(vehicle) => vehicle.id,
        }
    }
}

impl From<Child> for Entity {
    fn from(child: Child) -> Self {
        Self::Child(child)
    }
}

impl From<Driver> for Entity {
    fn from(driver: Driver) -> Self {
        Self::Driver(driver)
    }
}

impl From<Vehicle> for Entity {
    fn from(vehicle: Vehicle) -> Self {
        Self::Vehicle(vehicle)
    }
}
