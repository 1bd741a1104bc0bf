//! The roster service.
//!
//! [`Roster`] is the single entry point for changing roster data. Every
//! operation runs as one transaction: lock the store, read the records
//! involved, ask the [`links`] rules whether the change is legal, build a
//! [`Changeset`] covering every affected record, and commit it. Nothing is
//! written unless every check passes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::instrument;

use crate::{
    domain::{
        Changeset, Child, ChildPatch, Driver, DriverPatch, DuplicateKey, EntityKey, NationalId,
        NewChild, NewDriver, NewVehicle, PlateNumber, Tables, Vehicle, VehiclePatch,
        links::{self, IntegrityError, LinkError},
    },
    storage::{Store, StoreError},
};

/// The transport roster.
///
/// Operations are serialized through an internal lock, so a `Roster` can be
/// shared between threads. Two concurrent assignments to the same vehicle
/// can never both observe a free seat.
#[derive(Debug)]
pub struct Roster<S> {
    store: Mutex<S>,
}

/// A driver and the vehicle they are linked to (or were, after removal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLink {
    /// The vehicle side of the link.
    pub vehicle: Vehicle,
    /// The driver side of the link.
    pub driver: Driver,
}

/// Errors returned by roster operations.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// The key does not resolve to a record.
    #[error("{0} not found")]
    NotFound(EntityKey),

    /// A creation collided with an existing business key.
    #[error("{0} already exists")]
    DuplicateKey(EntityKey),

    /// The change would break a link invariant.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The store failed to persist the change.
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(DuplicateKey(key)) => Self::DuplicateKey(key),
            other => Self::Storage(other),
        }
    }
}

/// The kind of a [`RosterError`], without its context.
///
/// Callers map these to user-facing statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A key did not resolve to a record.
    NotFound,
    /// A business key is already in use.
    DuplicateKey,
    /// The relationship slot is already occupied.
    AlreadyAssigned,
    /// There is no relationship to remove.
    NotAssigned,
    /// The vehicle is full.
    CapacityExceeded,
    /// The new capacity is below the current occupancy.
    CapacityBelowOccupancy,
    /// The vehicle still has children assigned.
    HasAssignedChildren,
    /// Stored data holds a one-sided driver/vehicle link.
    BrokenLink,
    /// The store failed.
    Storage,
}

impl RosterError {
    /// The kind of failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::Link(link) => match link {
                LinkError::ChildAlreadyAssigned { .. }
                | LinkError::DriverAlreadyAssigned { .. }
                | LinkError::VehicleHasDriver { .. } => ErrorKind::AlreadyAssigned,
                LinkError::ChildNotAssigned { .. }
                | LinkError::DriverNotAssigned { .. }
                | LinkError::VehicleHasNoDriver { .. } => ErrorKind::NotAssigned,
                LinkError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
                LinkError::CapacityBelowOccupancy { .. } => ErrorKind::CapacityBelowOccupancy,
                LinkError::HasAssignedChildren { .. } => ErrorKind::HasAssignedChildren,
                LinkError::BrokenLink { .. } => ErrorKind::BrokenLink,
            },
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl<S: Store> Roster<S> {
    /// Creates a roster over `store`.
    pub const fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Consumes the roster, returning the store.
    pub fn into_inner(self) -> S {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a read-only function against the current records.
    ///
    /// The roster is locked for the duration of the call.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(self.lock().tables())
    }

    /// Runs one read-decide-write transaction.
    ///
    /// `decide` sees the current tables and fills in a changeset. If it
    /// succeeds, the changeset is committed while the lock is still held.
    fn transaction<T>(
        &self,
        decide: impl FnOnce(&Tables, &mut Changeset) -> Result<T, RosterError>,
    ) -> Result<T, RosterError> {
        let mut store = self.lock();
        let mut changes = Changeset::new();
        let output = decide(store.tables(), &mut changes)?;
        if !changes.is_empty() {
            store.commit(changes)?;
        }
        Ok(output)
    }

    // A panic inside `decide` happens before anything is committed, so the
    // tables behind a poisoned lock are still consistent.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new child.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::DuplicateKey`] if the national ID is taken.
    #[instrument(skip(self, data), fields(child = %data.national_id))]
    pub fn create_child(&self, data: NewChild) -> Result<Child, RosterError> {
        let child = self.transaction(|_, changes| {
            let child = Child::new(data);
            changes.insert(child.clone());
            Ok(child)
        })?;
        tracing::info!("Created child {}", child.national_id);
        Ok(child)
    }

    /// Registers a new driver.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::DuplicateKey`] if the national ID is taken.
    #[instrument(skip(self, data), fields(driver = %data.national_id))]
    pub fn create_driver(&self, data: NewDriver) -> Result<Driver, RosterError> {
        let driver = self.transaction(|_, changes| {
            let driver = Driver::new(data);
            changes.insert(driver.clone());
            Ok(driver)
        })?;
        tracing::info!("Created driver {}", driver.national_id);
        Ok(driver)
    }

    /// Registers a new vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::DuplicateKey`] if the plate number is taken.
    #[instrument(skip(self, data), fields(vehicle = %data.plate_number))]
    pub fn create_vehicle(&self, data: NewVehicle) -> Result<Vehicle, RosterError> {
        let vehicle = self.transaction(|_, changes| {
            let vehicle = Vehicle::new(data);
            changes.insert(vehicle.clone());
            Ok(vehicle)
        })?;
        tracing::info!("Created vehicle {}", vehicle.plate_number);
        Ok(vehicle)
    }

    /// Updates the supplied fields of a child.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the child does not exist.
    #[instrument(skip(self, patch))]
    pub fn update_child(&self, key: &NationalId, patch: ChildPatch) -> Result<Child, RosterError> {
        self.transaction(|tables, changes| {
            let mut child = find_child(tables, key)?.clone();
            child.apply(patch);
            changes.put(child.clone());
            Ok(child)
        })
    }

    /// Updates the supplied fields of a driver.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the driver does not exist.
    #[instrument(skip(self, patch))]
    pub fn update_driver(
        &self,
        key: &NationalId,
        patch: DriverPatch,
    ) -> Result<Driver, RosterError> {
        self.transaction(|tables, changes| {
            let mut driver = find_driver(tables, key)?.clone();
            driver.apply(patch);
            changes.put(driver.clone());
            Ok(driver)
        })
    }

    /// Updates the supplied fields of a vehicle.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if the vehicle does not exist
    /// - [`LinkError::CapacityBelowOccupancy`] if the new capacity is lower
    ///   than the number of children riding
    #[instrument(skip(self, patch))]
    pub fn update_vehicle(
        &self,
        key: &PlateNumber,
        patch: VehiclePatch,
    ) -> Result<Vehicle, RosterError> {
        self.transaction(|tables, changes| {
            let mut vehicle = find_vehicle(tables, key)?.clone();
            if let Some(capacity) = patch.capacity {
                links::can_reduce_capacity(tables, &vehicle, capacity)?;
            }
            vehicle.apply(patch);
            changes.put(vehicle.clone());
            Ok(vehicle)
        })
    }

    /// Deletes a child, first releasing its seat if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the child does not exist.
    #[instrument(skip(self))]
    pub fn delete_child(&self, key: &NationalId) -> Result<(), RosterError> {
        self.transaction(|tables, changes| {
            let child = find_child(tables, key)?;
            if child.vehicle_id.is_some() {
                let mut released = child.clone();
                released.vehicle_id = None;
                changes.put(released);
            }
            changes.delete(EntityKey::Child(key.clone()));
            Ok(())
        })?;
        tracing::info!("Deleted child {key}");
        Ok(())
    }

    /// Deletes a driver, first clearing the driver slot of their vehicle.
    ///
    /// Any vehicle whose driver slot points at this driver is cleared, even
    /// if the driver's own link is missing or points elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the driver does not exist.
    #[instrument(skip(self))]
    pub fn delete_driver(&self, key: &NationalId) -> Result<(), RosterError> {
        self.transaction(|tables, changes| {
            let driver = find_driver(tables, key)?;
            if driver.vehicle_id.is_some() {
                if let Err(e) = links::linked_vehicle(tables, driver) {
                    tracing::warn!("Deleting driver with inconsistent link: {e}");
                }
            }
            for vehicle in tables
                .vehicles()
                .filter(|vehicle| vehicle.driver_id == Some(driver.id))
            {
                let mut vehicle = vehicle.clone();
                vehicle.driver_id = None;
                changes.put(vehicle);
            }
            changes.delete(EntityKey::Driver(key.clone()));
            Ok(())
        })?;
        tracing::info!("Deleted driver {key}");
        Ok(())
    }

    /// Deletes a vehicle, first clearing its driver's link.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if the vehicle does not exist
    /// - [`LinkError::HasAssignedChildren`] while any child rides the vehicle
    #[instrument(skip(self))]
    pub fn delete_vehicle(&self, key: &PlateNumber) -> Result<(), RosterError> {
        self.transaction(|tables, changes| {
            let vehicle = find_vehicle(tables, key)?;
            links::can_delete_vehicle(tables, vehicle)?;
            if vehicle.driver_id.is_some() {
                if let Err(e) = links::linked_driver(tables, vehicle) {
                    tracing::warn!("Deleting vehicle with inconsistent link: {e}");
                }
            }
            for driver in tables
                .drivers()
                .filter(|driver| driver.vehicle_id == Some(vehicle.id))
            {
                let mut driver = driver.clone();
                driver.vehicle_id = None;
                changes.put(driver);
            }
            changes.delete(EntityKey::Vehicle(key.clone()));
            Ok(())
        })?;
        tracing::info!("Deleted vehicle {key}");
        Ok(())
    }

    /// Seats a child on a vehicle.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// - [`RosterError::NotFound`] if the child does not exist
    /// - [`LinkError::ChildAlreadyAssigned`] if the child already rides a
    ///   vehicle, whether or not `vehicle` exists
    /// - [`RosterError::NotFound`] if the vehicle does not exist
    /// - [`LinkError::CapacityExceeded`] if the vehicle is full
    #[instrument(skip(self))]
    pub fn assign_child_to_vehicle(
        &self,
        child: &NationalId,
        vehicle: &PlateNumber,
    ) -> Result<Child, RosterError> {
        let child = self.transaction(|tables, changes| {
            let child = find_child(tables, child)?;
            if child.vehicle_id.is_some() {
                return Err(LinkError::ChildAlreadyAssigned {
                    child: child.national_id.clone(),
                }
                .into());
            }
            let vehicle = find_vehicle(tables, vehicle)?;
            links::can_assign_child_to_vehicle(tables, child, vehicle)?;

            let mut child = child.clone();
            child.vehicle_id = Some(vehicle.id);
            changes.put(child.clone());
            Ok(child)
        })?;
        tracing::info!("Assigned child {} to vehicle {vehicle}", child.national_id);
        Ok(child)
    }

    /// Releases a child's seat.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if the child does not exist
    /// - [`LinkError::ChildNotAssigned`] if the child rides no vehicle
    #[instrument(skip(self))]
    pub fn remove_child_from_vehicle(&self, child: &NationalId) -> Result<Child, RosterError> {
        let child = self.transaction(|tables, changes| {
            let child = find_child(tables, child)?;
            links::can_remove_child_from_vehicle(child)?;

            let mut child = child.clone();
            child.vehicle_id = None;
            changes.put(child.clone());
            Ok(child)
        })?;
        tracing::info!("Removed child {} from vehicle", child.national_id);
        Ok(child)
    }

    /// Links a driver and a vehicle, writing both sides together.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if either record does not exist
    /// - [`LinkError::DriverAlreadyAssigned`] if the driver has a vehicle
    /// - [`LinkError::VehicleHasDriver`] if the vehicle has a driver
    /// - [`LinkError::BrokenLink`] if either side holds a one-sided link
    #[instrument(skip(self))]
    pub fn assign_driver_to_vehicle(
        &self,
        vehicle: &PlateNumber,
        driver: &NationalId,
    ) -> Result<DriverLink, RosterError> {
        let link = self.transaction(|tables, changes| {
            let vehicle = find_vehicle(tables, vehicle)?;
            let driver = find_driver(tables, driver)?;
            links::can_assign_driver_to_vehicle(tables, driver, vehicle)?;

            let mut vehicle = vehicle.clone();
            let mut driver = driver.clone();
            vehicle.driver_id = Some(driver.id);
            driver.vehicle_id = Some(vehicle.id);
            changes.put(vehicle.clone()).put(driver.clone());
            Ok(DriverLink { vehicle, driver })
        })?;
        tracing::info!(
            "Assigned driver {} to vehicle {}",
            link.driver.national_id,
            link.vehicle.plate_number
        );
        Ok(link)
    }

    /// Unlinks a vehicle from its driver, clearing both sides together.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if the vehicle does not exist
    /// - [`LinkError::VehicleHasNoDriver`] if the vehicle has no driver
    /// - [`LinkError::BrokenLink`] if the link is one-sided
    #[instrument(skip(self))]
    pub fn remove_driver_from_vehicle(
        &self,
        vehicle: &PlateNumber,
    ) -> Result<DriverLink, RosterError> {
        self.unlink_driver(|tables| {
            let vehicle = find_vehicle(tables, vehicle)?;
            Ok(links::linked_driver(tables, vehicle)?)
        })
    }

    /// Unlinks a driver from their vehicle, clearing both sides together.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] if the driver does not exist
    /// - [`LinkError::DriverNotAssigned`] if the driver has no vehicle
    /// - [`LinkError::BrokenLink`] if the link is one-sided
    #[instrument(skip(self))]
    pub fn remove_driver_from_vehicle_by_driver(
        &self,
        driver: &NationalId,
    ) -> Result<DriverLink, RosterError> {
        self.unlink_driver(|tables| Ok(find_driver(tables, driver)?))
    }

    fn unlink_driver(
        &self,
        resolve: impl FnOnce(&Tables) -> Result<&Driver, RosterError>,
    ) -> Result<DriverLink, RosterError> {
        let link = self.transaction(|tables, changes| {
            let driver = resolve(tables)?;
            let vehicle = links::can_remove_driver_from_vehicle(tables, driver)?;

            let mut vehicle = vehicle.clone();
            let mut driver = driver.clone();
            vehicle.driver_id = None;
            driver.vehicle_id = None;
            changes.put(vehicle.clone()).put(driver.clone());
            Ok(DriverLink { vehicle, driver })
        })?;
        tracing::info!(
            "Removed driver {} from vehicle {}",
            link.driver.national_id,
            link.vehicle.plate_number
        );
        Ok(link)
    }

    /// Children currently riding a vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the vehicle does not exist.
    pub fn list_children_of_vehicle(
        &self,
        vehicle: &PlateNumber,
    ) -> Result<Vec<Child>, RosterError> {
        self.read(|tables| {
            let vehicle = find_vehicle(tables, vehicle)?;
            Ok(tables.children_of(vehicle.id).cloned().collect())
        })
    }

    /// Number of children currently riding a vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the vehicle does not exist.
    pub fn occupancy(&self, vehicle: &PlateNumber) -> Result<usize, RosterError> {
        self.read(|tables| Ok(tables.occupancy(find_vehicle(tables, vehicle)?.id)))
    }

    /// Looks up a child.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the child does not exist.
    pub fn child(&self, key: &NationalId) -> Result<Child, RosterError> {
        self.read(|tables| find_child(tables, key).cloned())
    }

    /// Looks up a driver.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the driver does not exist.
    pub fn driver(&self, key: &NationalId) -> Result<Driver, RosterError> {
        self.read(|tables| find_driver(tables, key).cloned())
    }

    /// Looks up a vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::NotFound`] if the vehicle does not exist.
    pub fn vehicle(&self, key: &PlateNumber) -> Result<Vehicle, RosterError> {
        self.read(|tables| find_vehicle(tables, key).cloned())
    }

    /// All children.
    pub fn children(&self) -> Vec<Child> {
        self.read(|tables| tables.children().cloned().collect())
    }

    /// All drivers.
    pub fn drivers(&self) -> Vec<Driver> {
        self.read(|tables| tables.drivers().cloned().collect())
    }

    /// All vehicles.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.read(|tables| tables.vehicles().cloned().collect())
    }

    /// Checks every record for broken link invariants.
    ///
    /// # Errors
    ///
    /// Returns an [`IntegrityError`] listing every problem found.
    pub fn audit(&self) -> Result<(), IntegrityError> {
        self.read(links::audit)
    }
}

fn find_child<'t>(tables: &'t Tables, key: &NationalId) -> Result<&'t Child, RosterError> {
    tables
        .child(key)
        .ok_or_else(|| RosterError::NotFound(EntityKey::Child(key.clone())))
}

fn find_driver<'t>(tables: &'t Tables, key: &NationalId) -> Result<&'t Driver, RosterError> {
    tables
        .driver(key)
        .ok_or_else(|| RosterError::NotFound(EntityKey::Driver(key.clone())))
}

fn find_vehicle<'t>(tables: &'t Tables, key: &PlateNumber) -> Result<&'t Vehicle, RosterError> {
    tables
        .vehicle(key)
        .ok_or_else(|| RosterError::NotFound(EntityKey::Vehicle(key.clone())))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{Entity, parse_name},
        storage::{DirectoryStore, MemoryStore},
    };

    fn roster() -> Roster<MemoryStore> {
        Roster::new(MemoryStore::new())
    }

    fn id(s: &str) -> NationalId {
        s.parse().unwrap()
    }

    fn plate(s: &str) -> PlateNumber {
        s.parse().unwrap()
    }

    fn add_child<S: Store>(roster: &Roster<S>, national_id: &str) -> Child {
        roster
            .create_child(NewChild {
                national_id: id(national_id),
                first_name: parse_name("Lucía").unwrap(),
                last_name: parse_name("Fernández").unwrap(),
                age: 9,
            })
            .unwrap()
    }

    fn add_driver<S: Store>(roster: &Roster<S>, national_id: &str) -> Driver {
        roster
            .create_driver(NewDriver {
                national_id: id(national_id),
                first_name: parse_name("Jorge").unwrap(),
                last_name: parse_name("Paz").unwrap(),
                license_number: "LIC98765".parse().unwrap(),
            })
            .unwrap()
    }

    fn add_vehicle<S: Store>(roster: &Roster<S>, plate_number: &str, capacity: u16) -> Vehicle {
        roster
            .create_vehicle(NewVehicle {
                plate_number: plate(plate_number),
                model: parse_name("Toyota Hiace").unwrap(),
                capacity,
            })
            .unwrap()
    }

    fn assert_links_mutual(tables: &Tables) {
        for driver in tables.drivers() {
            if let Some(vehicle_id) = driver.vehicle_id {
                let vehicle = tables.vehicle_by_id(vehicle_id).unwrap();
                assert_eq!(vehicle.driver_id, Some(driver.id));
            }
        }
        for vehicle in tables.vehicles() {
            if let Some(driver_id) = vehicle.driver_id {
                let driver = tables.driver_by_id(driver_id).unwrap();
                assert_eq!(driver.vehicle_id, Some(vehicle.id));
            }
            assert!(tables.occupancy(vehicle.id) <= usize::from(vehicle.capacity));
        }
    }

    #[test]
    fn capacity_two_vehicle_fills_and_frees_seats() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 2);
        for child in ["1111111", "2222222", "3333333"] {
            add_child(&roster, child);
        }

        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();
        roster.assign_child_to_vehicle(&id("2222222"), &bus).unwrap();
        assert_eq!(roster.occupancy(&bus).unwrap(), 2);

        let err = roster
            .assign_child_to_vehicle(&id("3333333"), &bus)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

        roster.remove_child_from_vehicle(&id("1111111")).unwrap();
        assert_eq!(roster.occupancy(&bus).unwrap(), 1);

        roster.assign_child_to_vehicle(&id("3333333"), &bus).unwrap();
        let mut riding: Vec<_> = roster
            .list_children_of_vehicle(&bus)
            .unwrap()
            .into_iter()
            .map(|child| child.national_id)
            .collect();
        riding.sort();
        assert_eq!(riding, vec![id("2222222"), id("3333333")]);
    }

    #[test]
    fn driver_swap_requires_removal_first() {
        let roster = roster();
        let bus = plate("XYZ999");
        add_vehicle(&roster, "XYZ999", 20);
        add_driver(&roster, "5555555");
        add_driver(&roster, "6666666");

        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();

        let err = roster
            .assign_driver_to_vehicle(&bus, &id("6666666"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyAssigned);

        let unlinked = roster.remove_driver_from_vehicle(&bus).unwrap();
        assert_eq!(unlinked.vehicle.driver_id, None);
        assert_eq!(unlinked.driver.vehicle_id, None);
        assert_eq!(roster.driver(&id("5555555")).unwrap().vehicle_id, None);

        let linked = roster.assign_driver_to_vehicle(&bus, &id("6666666")).unwrap();
        assert_eq!(linked.vehicle.driver_id, Some(linked.driver.id));
        assert_eq!(linked.driver.vehicle_id, Some(linked.vehicle.id));
        roster.read(assert_links_mutual);
    }

    #[test]
    fn capacity_cannot_shrink_below_occupancy() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        for n in 1..=5 {
            let key = format!("{n}{n}{n}{n}{n}{n}{n}");
            add_child(&roster, &key);
            roster.assign_child_to_vehicle(&id(&key), &bus).unwrap();
        }

        let err = roster
            .update_vehicle(
                &bus,
                VehiclePatch {
                    capacity: Some(3),
                    ..VehiclePatch::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityBelowOccupancy);
        assert_eq!(roster.vehicle(&bus).unwrap().capacity, 10);

        let updated = roster
            .update_vehicle(
                &bus,
                VehiclePatch {
                    capacity: Some(5),
                    ..VehiclePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.capacity, 5);
    }

    #[test]
    fn assigning_twice_fails_and_leaves_state_unchanged() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_vehicle(&roster, "DEF456", 10);
        add_child(&roster, "1111111");
        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();

        let before = roster.read(Tables::clone);
        for vehicle in [&bus, &plate("DEF456")] {
            let err = roster
                .assign_child_to_vehicle(&id("1111111"), vehicle)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AlreadyAssigned);
        }
        assert_eq!(roster.read(Tables::clone), before);
    }

    #[test]
    fn occupied_vehicle_cannot_be_deleted() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_driver(&roster, "5555555");
        add_child(&roster, "1111111");
        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();
        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();

        let before = roster.read(Tables::clone);
        let err = roster.delete_vehicle(&bus).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HasAssignedChildren);
        assert_eq!(roster.read(Tables::clone), before);
    }

    #[test]
    fn assign_then_remove_restores_child_exactly() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        let original = add_child(&roster, "1111111");

        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();
        let restored = roster.remove_child_from_vehicle(&id("1111111")).unwrap();

        assert_eq!(restored, original);
        assert_eq!(roster.child(&id("1111111")).unwrap(), original);
    }

    #[test]
    fn deleting_vehicle_clears_driver_link() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_driver(&roster, "5555555");
        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();

        roster.delete_vehicle(&bus).unwrap();

        assert_eq!(roster.driver(&id("5555555")).unwrap().vehicle_id, None);
        assert_eq!(
            roster.vehicle(&bus).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn deleting_driver_clears_vehicle_link() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_driver(&roster, "5555555");
        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();

        roster.delete_driver(&id("5555555")).unwrap();

        assert_eq!(roster.vehicle(&bus).unwrap().driver_id, None);
        assert!(roster.drivers().is_empty());
        assert!(roster.audit().is_ok());
    }

    #[test]
    fn deleting_child_frees_its_seat() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_child(&roster, "1111111");
        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();

        roster.delete_child(&id("1111111")).unwrap();

        assert_eq!(roster.occupancy(&bus).unwrap(), 0);
        roster.delete_vehicle(&bus).unwrap();
    }

    #[test]
    fn removing_driver_by_either_side_clears_both() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_driver(&roster, "5555555");
        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();

        let link = roster
            .remove_driver_from_vehicle_by_driver(&id("5555555"))
            .unwrap();
        assert_eq!(link.vehicle.plate_number, bus);
        assert_eq!(roster.vehicle(&bus).unwrap().driver_id, None);

        let err = roster
            .remove_driver_from_vehicle_by_driver(&id("5555555"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAssigned);
        let err = roster.remove_driver_from_vehicle(&bus).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAssigned);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let roster = roster();
        add_child(&roster, "1111111");
        add_vehicle(&roster, "ABC123", 10);

        let err = roster
            .create_child(NewChild {
                national_id: id("1111111"),
                first_name: parse_name("Otro").unwrap(),
                last_name: parse_name("Niño").unwrap(),
                age: 5,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(roster.children().len(), 1);

        let err = roster
            .create_vehicle(NewVehicle {
                plate_number: plate("abc123"),
                model: parse_name("Ford Transit").unwrap(),
                capacity: 12,
            })
            .unwrap_err();
        assert!(matches!(err, RosterError::DuplicateKey(EntityKey::Vehicle(_))));
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let roster = roster();
        let original = add_child(&roster, "1111111");

        let updated = roster
            .update_child(
                &id("1111111"),
                ChildPatch {
                    age: Some(10),
                    ..ChildPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.age, 10);
        assert_eq!(updated.first_name, original.first_name);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created, original.created);
    }

    #[test_case(|r: &Roster<MemoryStore>| r.child(&id("9999999")).map(drop); "child lookup")]
    #[test_case(|r: &Roster<MemoryStore>| r.delete_driver(&id("9999999")); "driver delete")]
    #[test_case(|r: &Roster<MemoryStore>| r.occupancy(&plate("ZZZ999")).map(drop); "occupancy")]
    #[test_case(
        |r: &Roster<MemoryStore>| r.list_children_of_vehicle(&plate("ZZZ999")).map(drop);
        "list children"
    )]
    #[test_case(
        |r: &Roster<MemoryStore>| {
            r.assign_child_to_vehicle(&id("1111111"), &plate("ZZZ999")).map(drop)
        };
        "assign to missing vehicle"
    )]
    #[test_case(
        |r: &Roster<MemoryStore>| {
            r.update_vehicle(&plate("ZZZ999"), VehiclePatch::default()).map(drop)
        };
        "vehicle update"
    )]
    fn missing_keys_are_not_found(op: fn(&Roster<MemoryStore>) -> Result<(), RosterError>) {
        let roster = roster();
        add_child(&roster, "1111111");
        assert_eq!(op(&roster).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn seated_child_is_already_assigned_even_to_a_missing_vehicle() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_child(&roster, "1111111");
        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();

        let err = roster
            .assign_child_to_vehicle(&id("1111111"), &plate("ZZZ999"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyAssigned);
        assert_eq!(roster.occupancy(&bus).unwrap(), 1);
    }

    #[test]
    fn one_sided_link_is_a_broken_link() {
        let roster = roster();
        let bus = add_vehicle(&roster, "ABC123", 10);
        let mut driver = add_driver(&roster, "5555555");

        // Corrupt the data underneath the service.
        driver.vehicle_id = Some(bus.id);
        let mut store = roster.into_inner();
        store.put(Entity::Driver(driver)).unwrap();
        let roster = Roster::new(store);

        let err = roster
            .assign_driver_to_vehicle(&bus.plate_number, &id("5555555"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenLink);
        let err = roster
            .remove_driver_from_vehicle_by_driver(&id("5555555"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenLink);
        assert!(roster.audit().is_err());

        roster.delete_driver(&id("5555555")).unwrap();
        assert!(roster.audit().is_ok());
    }

    #[test]
    fn invariants_hold_across_mixed_operations() {
        let roster = roster();
        let buses = ["AAA111", "BBB222", "CCC333"];
        for (n, bus) in buses.iter().enumerate() {
            add_vehicle(&roster, bus, u16::try_from(n + 1).unwrap());
        }
        let children: Vec<String> = (1..=9).map(|n| format!("{}", 1_000_000 + n)).collect();
        for child in &children {
            add_child(&roster, child);
        }
        for driver in ["5555555", "6666666"] {
            add_driver(&roster, driver);
        }

        for step in 0..60_usize {
            let child = id(&children[step * 7 % children.len()]);
            let bus = plate(buses[step % buses.len()]);
            let driver = id(if step % 2 == 0 { "5555555" } else { "6666666" });
            let _ = match step % 5 {
                0 | 1 => roster.assign_child_to_vehicle(&child, &bus).map(drop),
                2 => roster.remove_child_from_vehicle(&child).map(drop),
                3 => roster.assign_driver_to_vehicle(&bus, &driver).map(drop),
                _ => roster.remove_driver_from_vehicle(&bus).map(drop),
            };
            if step % 11 == 0 {
                let _ = roster.update_vehicle(
                    &bus,
                    VehiclePatch {
                        capacity: Some(u16::try_from(step % 3).unwrap()),
                        ..VehiclePatch::default()
                    },
                );
            }
            roster.read(assert_links_mutual);
            assert!(roster.audit().is_ok());
        }
    }

    #[test]
    fn concurrent_assignments_never_overfill() {
        let roster = roster();
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 5);
        let children: Vec<NationalId> = (0..32)
            .map(|n| {
                let key = format!("{}", 2_000_000 + n);
                add_child(&roster, &key);
                id(&key)
            })
            .collect();

        let (roster, bus) = (&roster, &bus);
        let seated = thread::scope(|scope| {
            let handles: Vec<_> = children
                .iter()
                .map(|child| scope.spawn(move || roster.assign_child_to_vehicle(child, bus)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(seated, 5);
        assert_eq!(roster.occupancy(bus).unwrap(), 5);
    }

    #[test]
    fn directory_backed_roster_persists_links() {
        let tmp = TempDir::new().unwrap();
        DirectoryStore::init(tmp.path()).unwrap();
        let roster = Roster::new(DirectoryStore::open(tmp.path().to_path_buf()).unwrap());
        let bus = plate("ABC123");
        add_vehicle(&roster, "ABC123", 10);
        add_driver(&roster, "5555555");
        add_child(&roster, "1111111");
        roster.assign_driver_to_vehicle(&bus, &id("5555555")).unwrap();
        roster.assign_child_to_vehicle(&id("1111111"), &bus).unwrap();
        drop(roster);

        let reopened = Roster::new(DirectoryStore::open(tmp.path().to_path_buf()).unwrap());
        assert_eq!(reopened.occupancy(&bus).unwrap(), 1);
        assert!(reopened.audit().is_ok());
        let link = reopened
            .remove_driver_from_vehicle_by_driver(&id("5555555"))
            .unwrap();
        assert_eq!(link.vehicle.plate_number, bus);
    }
}
