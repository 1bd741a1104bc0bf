//! School Transport Roster
//!
//! Children, drivers and vehicles are stored as plain-text records. The
//! [`Roster`] service keeps the links between them consistent: a vehicle never
//! carries more children than its capacity, and a driver and their vehicle
//! always point at each other.

pub mod domain;
pub use domain::{
    Child, ChildPatch, Config, Driver, DriverPatch, Entity, EntityKey, IntegrityError, Kind,
    LicenseNumber, LinkError, NationalId, NewChild, NewDriver, NewVehicle, PlateNumber, Tables,
    Vehicle, VehiclePatch,
};

pub mod roster;
pub use roster::{DriverLink, ErrorKind, Roster, RosterError};

/// Record storage backends.
pub mod storage;
pub use storage::{DirectoryStore, MemoryStore, Store, StoreError};
