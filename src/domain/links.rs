//! Link invariant rules.
//!
//! Every function here is a pure decision over a read-only [`Tables`] view:
//! it either allows a mutation or names the invariant it would break. None of
//! them write anything; applying the mutation is the caller's job.
//!
//! Two link types exist:
//!
//! - child → vehicle: many children to one vehicle, bounded by the vehicle's
//!   capacity. Only the child stores the link.
//! - driver ↔ vehicle: one to one, stored on both records. Both sides must
//!   always agree.

use std::fmt;

use nonempty::NonEmpty;
use uuid::Uuid;

use crate::domain::{Child, Driver, EntityKey, NationalId, PlateNumber, Tables, Vehicle};

/// A mutation that would break a link invariant.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    /// The child already rides a vehicle.
    #[error("child {child} is already assigned to a vehicle")]
    ChildAlreadyAssigned {
        /// The child being assigned.
        child: NationalId,
    },

    /// The driver already operates a vehicle.
    #[error("driver {driver} is already assigned to a vehicle")]
    DriverAlreadyAssigned {
        /// The driver being assigned.
        driver: NationalId,
    },

    /// The vehicle already has a driver.
    #[error("vehicle {vehicle} already has a driver assigned")]
    VehicleHasDriver {
        /// The vehicle being assigned.
        vehicle: PlateNumber,
    },

    /// The child does not ride any vehicle.
    #[error("child {child} is not assigned to any vehicle")]
    ChildNotAssigned {
        /// The child being removed.
        child: NationalId,
    },

    /// The driver does not operate any vehicle.
    #[error("driver {driver} is not assigned to any vehicle")]
    DriverNotAssigned {
        /// The driver being removed.
        driver: NationalId,
    },

    /// The vehicle has no driver to remove.
    #[error("vehicle {vehicle} does not have a driver assigned")]
    VehicleHasNoDriver {
        /// The vehicle whose driver is being removed.
        vehicle: PlateNumber,
    },

    /// The vehicle is full.
    #[error("vehicle {vehicle} has reached its capacity of {capacity}")]
    CapacityExceeded {
        /// The full vehicle.
        vehicle: PlateNumber,
        /// Its capacity.
        capacity: u16,
    },

    /// The requested capacity is lower than the number of children riding.
    #[error(
        "cannot reduce capacity of vehicle {vehicle} to {requested}: {occupancy} children are \
         assigned"
    )]
    CapacityBelowOccupancy {
        /// The vehicle being updated.
        vehicle: PlateNumber,
        /// Children currently riding.
        occupancy: usize,
        /// The rejected capacity.
        requested: u16,
    },

    /// The vehicle cannot be deleted while children ride it.
    #[error("cannot delete vehicle {vehicle}: {count} children are assigned")]
    HasAssignedChildren {
        /// The vehicle being deleted.
        vehicle: PlateNumber,
        /// Children currently riding.
        count: usize,
    },

    /// A driver/vehicle link is one-sided: `record` points at `partner`, but
    /// the partner is missing or does not point back.
    #[error("{record} links to {partner}, which does not link back")]
    BrokenLink {
        /// The record holding the unmatched link.
        record: EntityKey,
        /// The UUID it points at.
        partner: Uuid,
    },
}

/// Checks that `child` may start riding `vehicle`.
///
/// # Errors
///
/// - [`LinkError::ChildAlreadyAssigned`] if the child already rides a vehicle
/// - [`LinkError::CapacityExceeded`] if the vehicle is full
pub fn can_assign_child_to_vehicle(
    tables: &Tables,
    child: &Child,
    vehicle: &Vehicle,
) -> Result<(), LinkError> {
    if child.vehicle_id.is_some() {
        return Err(LinkError::ChildAlreadyAssigned {
            child: child.national_id.clone(),
        });
    }

    if tables.occupancy(vehicle.id) >= usize::from(vehicle.capacity) {
        return Err(LinkError::CapacityExceeded {
            vehicle: vehicle.plate_number.clone(),
            capacity: vehicle.capacity,
        });
    }

    Ok(())
}

/// Checks that `child` may stop riding its vehicle.
///
/// # Errors
///
/// Returns [`LinkError::ChildNotAssigned`] if the child rides no vehicle.
pub fn can_remove_child_from_vehicle(child: &Child) -> Result<(), LinkError> {
    if child.vehicle_id.is_none() {
        return Err(LinkError::ChildNotAssigned {
            child: child.national_id.clone(),
        });
    }
    Ok(())
}

/// Checks that `driver` may be linked to `vehicle`.
///
/// Both slots are checked independently and must both be free. An occupied
/// slot whose partner does not link back is reported as
/// [`LinkError::BrokenLink`] rather than as an ordinary conflict.
///
/// # Errors
///
/// - [`LinkError::BrokenLink`] if either side holds a one-sided link
/// - [`LinkError::DriverAlreadyAssigned`] if the driver operates a vehicle
/// - [`LinkError::VehicleHasDriver`] if the vehicle has a driver
pub fn can_assign_driver_to_vehicle(
    tables: &Tables,
    driver: &Driver,
    vehicle: &Vehicle,
) -> Result<(), LinkError> {
    if driver.vehicle_id.is_some() {
        linked_vehicle(tables, driver)?;
        return Err(LinkError::DriverAlreadyAssigned {
            driver: driver.national_id.clone(),
        });
    }

    if vehicle.driver_id.is_some() {
        linked_driver(tables, vehicle)?;
        return Err(LinkError::VehicleHasDriver {
            vehicle: vehicle.plate_number.clone(),
        });
    }

    Ok(())
}

/// Checks that `driver` may be unlinked from its vehicle, returning that
/// vehicle.
///
/// # Errors
///
/// - [`LinkError::DriverNotAssigned`] if the driver operates no vehicle
/// - [`LinkError::BrokenLink`] if the vehicle does not link back
pub fn can_remove_driver_from_vehicle<'t>(
    tables: &'t Tables,
    driver: &Driver,
) -> Result<&'t Vehicle, LinkError> {
    if driver.vehicle_id.is_none() {
        return Err(LinkError::DriverNotAssigned {
            driver: driver.national_id.clone(),
        });
    }
    linked_vehicle(tables, driver)
}

/// Checks that `vehicle` may be deleted.
///
/// A linked driver does not block deletion; the caller clears the driver's
/// side of the link as part of the delete.
///
/// # Errors
///
/// Returns [`LinkError::HasAssignedChildren`] while any child rides the
/// vehicle.
pub fn can_delete_vehicle(tables: &Tables, vehicle: &Vehicle) -> Result<(), LinkError> {
    let count = tables.occupancy(vehicle.id);
    if count > 0 {
        return Err(LinkError::HasAssignedChildren {
            vehicle: vehicle.plate_number.clone(),
            count,
        });
    }
    Ok(())
}

/// Checks that the capacity of `vehicle` may be set to `new_capacity`.
///
/// # Errors
///
/// Returns [`LinkError::CapacityBelowOccupancy`] if more children ride the
/// vehicle than `new_capacity` allows.
pub fn can_reduce_capacity(
    tables: &Tables,
    vehicle: &Vehicle,
    new_capacity: u16,
) -> Result<(), LinkError> {
    let occupancy = tables.occupancy(vehicle.id);
    if occupancy > usize::from(new_capacity) {
        return Err(LinkError::CapacityBelowOccupancy {
            vehicle: vehicle.plate_number.clone(),
            occupancy,
            requested: new_capacity,
        });
    }
    Ok(())
}

/// Resolves the vehicle a driver links to, requiring it to link back.
///
/// # Errors
///
/// Returns [`LinkError::DriverNotAssigned`] if the driver has no link, or
/// [`LinkError::BrokenLink`] if the link is one-sided.
pub fn linked_vehicle<'t>(tables: &'t Tables, driver: &Driver) -> Result<&'t Vehicle, LinkError> {
    let vehicle_id = driver
        .vehicle_id
        .ok_or_else(|| LinkError::DriverNotAssigned {
            driver: driver.national_id.clone(),
        })?;

    tables
        .vehicle_by_id(vehicle_id)
        .filter(|vehicle| vehicle.driver_id == Some(driver.id))
        .ok_or_else(|| LinkError::BrokenLink {
            record: EntityKey::Driver(driver.national_id.clone()),
            partner: vehicle_id,
        })
}

/// Resolves the driver a vehicle links to, requiring it to link back.
///
/// # Errors
///
/// Returns [`LinkError::VehicleHasNoDriver`] if the vehicle has no link, or
/// [`LinkError::BrokenLink`] if the link is one-sided.
pub fn linked_driver<'t>(tables: &'t Tables, vehicle: &Vehicle) -> Result<&'t Driver, LinkError> {
    let driver_id = vehicle
        .driver_id
        .ok_or_else(|| LinkError::VehicleHasNoDriver {
            vehicle: vehicle.plate_number.clone(),
        })?;

    tables
        .driver_by_id(driver_id)
        .filter(|driver| driver.vehicle_id == Some(vehicle.id))
        .ok_or_else(|| LinkError::BrokenLink {
            record: EntityKey::Vehicle(vehicle.plate_number.clone()),
            partner: driver_id,
        })
}

/// An invariant found broken by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// More children ride a vehicle than it can carry.
    OverCapacity {
        /// The overloaded vehicle.
        vehicle: PlateNumber,
        /// Children riding.
        occupancy: usize,
        /// Its capacity.
        capacity: u16,
    },
    /// A record links to a UUID that resolves to no record.
    DanglingLink {
        /// The record holding the link.
        record: EntityKey,
        /// The unresolved UUID.
        target: Uuid,
    },
    /// A driver/vehicle link is not matched by the other side.
    OneSidedLink {
        /// The record holding the link.
        record: EntityKey,
        /// The record it points at, which points elsewhere.
        partner: EntityKey,
    },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverCapacity {
                vehicle,
                occupancy,
                capacity,
            } => write!(
                f,
                "vehicle {vehicle} carries {occupancy} children but has capacity {capacity}"
            ),
            Self::DanglingLink { record, target } => {
                write!(f, "{record} links to missing record {target}")
            }
            Self::OneSidedLink { record, partner } => {
                write!(f, "{record} links to {partner}, which does not link back")
            }
        }
    }
}

/// Error listing every invariant [`audit`] found broken.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub struct IntegrityError {
    problems: NonEmpty<Problem>,
}

impl IntegrityError {
    /// The problems found.
    #[must_use]
    pub const fn problems(&self) -> &NonEmpty<Problem> {
        &self.problems
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        write!(f, "roster integrity check failed: ")?;

        let total = self.problems.len();
        let msg = self
            .problems
            .iter()
            .take(MAX_DISPLAY)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        if total <= MAX_DISPLAY {
            write!(f, "{msg}")
        } else {
            write!(f, "{msg}... (and {} more)", total - MAX_DISPLAY)
        }
    }
}

/// Scans every record for broken link invariants.
///
/// Reports over-capacity vehicles, links to records that do not exist, and
/// driver/vehicle links that are not mirrored on the other side.
///
/// # Errors
///
/// Returns an [`IntegrityError`] listing every problem found.
pub fn audit(tables: &Tables) -> Result<(), IntegrityError> {
    let mut problems = Vec::new();

    for child in tables.children() {
        if let Some(vehicle_id) = child.vehicle_id {
            if tables.vehicle_by_id(vehicle_id).is_none() {
                problems.push(Problem::DanglingLink {
                    record: EntityKey::Child(child.national_id.clone()),
                    target: vehicle_id,
                });
            }
        }
    }

    for driver in tables.drivers() {
        let Some(vehicle_id) = driver.vehicle_id else {
            continue;
        };
        let record = EntityKey::Driver(driver.national_id.clone());
        match tables.vehicle_by_id(vehicle_id) {
            None => problems.push(Problem::DanglingLink {
                record,
                target: vehicle_id,
            }),
            Some(vehicle) if vehicle.driver_id != Some(driver.id) => {
                problems.push(Problem::OneSidedLink {
                    record,
                    partner: EntityKey::Vehicle(vehicle.plate_number.clone()),
                });
            }
            Some(_) => {}
        }
    }

    for vehicle in tables.vehicles() {
        let occupancy = tables.occupancy(vehicle.id);
        if occupancy > usize::from(vehicle.capacity) {
            problems.push(Problem::OverCapacity {
                vehicle: vehicle.plate_number.clone(),
                occupancy,
                capacity: vehicle.capacity,
            });
        }

        let Some(driver_id) = vehicle.driver_id else {
            continue;
        };
        let record = EntityKey::Vehicle(vehicle.plate_number.clone());
        match tables.driver_by_id(driver_id) {
            None => problems.push(Problem::DanglingLink {
                record,
                target: driver_id,
            }),
            Some(driver) if driver.vehicle_id != Some(vehicle.id) => {
                problems.push(Problem::OneSidedLink {
                    record,
                    partner: EntityKey::Driver(driver.national_id.clone()),
                });
            }
            Some(_) => {}
        }
    }

    NonEmpty::from_vec(problems).map_or(Ok(()), |problems| Err(IntegrityError { problems }))
}
