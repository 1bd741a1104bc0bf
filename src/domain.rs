//! Domain models for the transport roster.
//!
//! This module contains the record types, their validated business keys, the
//! in-memory [`Tables`] that hold them, and the link invariant rules that
//! govern how children and drivers are attached to vehicles.

mod changeset;
pub use changeset::{Change, Changeset};

mod child;
pub use child::{Child, ChildPatch, NewChild};

mod config;
pub use config::{Config, ConfigError};

mod driver;
pub use driver::{Driver, DriverPatch, NewDriver};

mod entity;
pub use entity::{Entity, EntityKey, Kind};

pub mod keys;
pub use keys::{LicenseNumber, NationalId, PlateNumber};

pub mod links;
pub use links::{IntegrityError, LinkError, Problem};

mod name;
pub use name::{EmptyNameError, parse_name};

mod tables;
pub use tables::{Conflict, DuplicateId, DuplicateKey, Tables};

mod vehicle;
pub use vehicle::{NewVehicle, Vehicle, VehiclePatch};
