//! In-memory tables of roster records.
//!
//! [`Tables`] knows nothing about the filesystem. It holds every record keyed
//! by business key, plus reverse indexes from surrogate UUID to key so that
//! links (which store UUIDs) can be followed in O(1).

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::domain::{
    Change, Changeset, Child, Driver, Entity, EntityKey, Kind, NationalId, PlateNumber, Vehicle,
};

/// Every record in a roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    children: BTreeMap<NationalId, Child>,
    drivers: BTreeMap<NationalId, Driver>,
    vehicles: BTreeMap<PlateNumber, Vehicle>,

    /// Owner of each child id, so a reused id can be rejected.
    child_keys: HashMap<Uuid, NationalId>,
    /// Reverse lookup for following `Vehicle::driver_id`.
    driver_keys: HashMap<Uuid, NationalId>,
    /// Reverse lookup for following `Child::vehicle_id` and
    /// `Driver::vehicle_id`.
    vehicle_keys: HashMap<Uuid, PlateNumber>,
}

/// Error returned when an insert collides with an existing business key.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0} already exists")]
pub struct DuplicateKey(pub EntityKey);

/// Error returned when two records of the same kind would share a surrogate
/// id.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{duplicate} reuses id {id}, already held by {existing}")]
pub struct DuplicateId {
    /// The shared id.
    pub id: Uuid,
    /// The record already holding the id.
    pub existing: EntityKey,
    /// The record that tried to take it.
    pub duplicate: EntityKey,
}

/// Error returned when a changeset would break the identity of a record.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Conflict {
    /// An insert collided with an existing business key.
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKey),

    /// A record carries an id another record of its kind already holds.
    #[error(transparent)]
    DuplicateId(#[from] DuplicateId),
}

impl Tables {
    /// Looks up a child by national ID.
    #[must_use]
    pub fn child(&self, key: &NationalId) -> Option<&Child> {
        self.children.get(key)
    }

    /// Looks up a driver by national ID.
    #[must_use]
    pub fn driver(&self, key: &NationalId) -> Option<&Driver> {
        self.drivers.get(key)
    }

    /// Looks up a vehicle by plate number.
    #[must_use]
    pub fn vehicle(&self, key: &PlateNumber) -> Option<&Vehicle> {
        self.vehicles.get(key)
    }

    /// Follows a driver link.
    #[must_use]
    pub fn driver_by_id(&self, id: Uuid) -> Option<&Driver> {
        self.driver_keys.get(&id).and_then(|key| self.drivers.get(key))
    }

    /// Follows a vehicle link.
    #[must_use]
    pub fn vehicle_by_id(&self, id: Uuid) -> Option<&Vehicle> {
        self.vehicle_keys.get(&id).and_then(|key| self.vehicles.get(key))
    }

    /// All children, in key order.
    pub fn children(&self) -> impl Iterator<Item = &Child> {
        self.children.values()
    }

    /// All drivers, in key order.
    pub fn drivers(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.values()
    }

    /// All vehicles, in key order.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Children whose vehicle link points at `vehicle_id`.
    pub fn children_of(&self, vehicle_id: Uuid) -> impl Iterator<Item = &Child> {
        self.children
            .values()
            .filter(move |child| child.vehicle_id == Some(vehicle_id))
    }

    /// Number of children currently linked to `vehicle_id`.
    ///
    /// Always counted from the child records; never cached.
    #[must_use]
    pub fn occupancy(&self, vehicle_id: Uuid) -> usize {
        self.children_of(vehicle_id).count()
    }

    /// Whether a record exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        match key {
            EntityKey::Child(id) => self.children.contains_key(id),
            EntityKey::Driver(id) => self.drivers.contains_key(id),
            EntityKey::Vehicle(plate) => self.vehicles.contains_key(plate),
        }
    }

    /// Total number of records of all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len() + self.drivers.len() + self.vehicles.len()
    }

    /// Whether the tables hold no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that `changes` can be applied.
    ///
    /// Changes are simulated in order, so a delete followed by an insert of
    /// the same key is accepted, while two inserts of the same key are not.
    ///
    /// # Errors
    ///
    /// - [`Conflict::DuplicateKey`] for the first insert whose key already
    ///   exists
    /// - [`Conflict::DuplicateId`] for the first insert or put whose id is
    ///   held by a different record of the same kind
    pub fn check(&self, changes: &Changeset) -> Result<(), Conflict> {
        // The id stored under each touched key, and the key holding each
        // touched id, after the changes seen so far.
        let mut ids: HashMap<EntityKey, Option<Uuid>> = HashMap::new();
        let mut owners: HashMap<(Kind, Uuid), Option<EntityKey>> = HashMap::new();

        for change in changes {
            let (key, id) = match change {
                Change::Insert(entity) | Change::Put(entity) => (entity.key(), Some(entity.id())),
                Change::Delete(key) => (key.clone(), None),
            };
            let kind = key.kind();
            let current = ids.get(&key).copied().unwrap_or_else(|| self.id_at(&key));

            if matches!(change, Change::Insert(_)) && current.is_some() {
                return Err(DuplicateKey(key).into());
            }
            if let Some(id) = id {
                let owner = owners
                    .get(&(kind, id))
                    .cloned()
                    .unwrap_or_else(|| self.key_of(kind, id));
                if let Some(existing) = owner.filter(|owner| owner != &key) {
                    return Err(DuplicateId {
                        id,
                        existing,
                        duplicate: key,
                    }
                    .into());
                }
            }

            if let Some(old) = current {
                owners.insert((kind, old), None);
            }
            if let Some(id) = id {
                owners.insert((kind, id), Some(key.clone()));
            }
            ids.insert(key, id);
        }

        Ok(())
    }

    /// Applies every change, or none of them.
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if [`Tables::check`] rejects the changeset, in
    /// which case the tables are unchanged.
    pub fn apply(&mut self, changes: Changeset) -> Result<(), Conflict> {
        self.check(&changes)?;
        self.apply_unchecked(changes);
        Ok(())
    }

    /// Applies a changeset that has already passed [`Tables::check`].
    pub(crate) fn apply_unchecked(&mut self, changes: Changeset) {
        for change in changes {
            match change {
                Change::Insert(entity) | Change::Put(entity) => self.upsert(entity),
                Change::Delete(key) => self.remove(&key),
            }
        }
    }

    fn id_at(&self, key: &EntityKey) -> Option<Uuid> {
        match key {
            EntityKey::Child(id) => self.children.get(id).map(|child| child.id),
            EntityKey::Driver(id) => self.drivers.get(id).map(|driver| driver.id),
            EntityKey::Vehicle(plate) => self.vehicles.get(plate).map(|vehicle| vehicle.id),
        }
    }

    fn key_of(&self, kind: Kind, id: Uuid) -> Option<EntityKey> {
        match kind {
            Kind::Child => self.child_keys.get(&id).cloned().map(EntityKey::Child),
            Kind::Driver => self.driver_keys.get(&id).cloned().map(EntityKey::Driver),
            Kind::Vehicle => self.vehicle_keys.get(&id).cloned().map(EntityKey::Vehicle),
        }
    }

    fn upsert(&mut self, entity: Entity) {
        match entity {
            Entity::Child(child) => {
                if let Some(old) = self.children.get(&child.national_id) {
                    self.child_keys.remove(&old.id);
                }
                self.child_keys.insert(child.id, child.national_id.clone());
                self.children.insert(child.national_id.clone(), child);
            }
            Entity::Driver(driver) => {
                if let Some(old) = self.drivers.get(&driver.national_id) {
                    self.driver_keys.remove(&old.id);
                }
                self.driver_keys
                    .insert(driver.id, driver.national_id.clone());
                self.drivers.insert(driver.national_id.clone(), driver);
            }
            Entity::Vehicle(vehicle) => {
                if let Some(old) = self.vehicles.get(&vehicle.plate_number) {
                    self.vehicle_keys.remove(&old.id);
                }
                self.vehicle_keys
                    .insert(vehicle.id, vehicle.plate_number.clone());
                self.vehicles.insert(vehicle.plate_number.clone(), vehicle);
            }
        }
    }

    fn remove(&mut self, key: &EntityKey) {
        match key {
            EntityKey::Child(id) => {
                if let Some(child) = self.children.remove(id) {
                    self.child_keys.remove(&child.id);
                }
            }
            EntityKey::Driver(id) => {
                if let Some(driver) = self.drivers.remove(id) {
                    self.driver_keys.remove(&driver.id);
                }
            }
            EntityKey::Vehicle(plate) => {
                if let Some(vehicle) = self.vehicles.remove(plate) {
                    self.vehicle_keys.remove(&vehicle.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewChild, NewVehicle, parse_name};

    fn child(id: &str) -> Child {
        Child::new(NewChild {
            national_id: id.parse().unwrap(),
            first_name: parse_name("Ana").unwrap(),
            last_name: parse_name("Gómez").unwrap(),
            age: 8,
        })
    }

    fn vehicle(plate: &str) -> Vehicle {
        Vehicle::new(NewVehicle {
            plate_number: plate.parse().unwrap(),
            model: parse_name("Mercedes Sprinter").unwrap(),
            capacity: 10,
        })
    }

    #[test]
    fn insert_of_existing_key_is_rejected_without_partial_writes() {
        let mut tables = Tables::default();
        tables.apply({
            let mut changes = Changeset::new();
            changes.insert(child("1111111"));
            changes
        })
        .unwrap();

        let mut changes = Changeset::new();
        changes.insert(vehicle("ABC123")).insert(child("1111111"));
        let err = tables.apply(changes).unwrap_err();

        assert_eq!(
            err,
            Conflict::DuplicateKey(DuplicateKey(EntityKey::Child("1111111".parse().unwrap())))
        );
        assert!(tables.vehicle(&"ABC123".parse().unwrap()).is_none());
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn duplicate_insert_within_one_changeset_is_rejected() {
        let tables = Tables::default();
        let mut changes = Changeset::new();
        changes.insert(child("1111111")).insert(child("1111111"));
        assert!(tables.check(&changes).is_err());
    }

    #[test]
    fn delete_then_insert_is_accepted() {
        let mut tables = Tables::default();
        let original = child("1111111");
        tables.apply({
            let mut changes = Changeset::new();
            changes.insert(original.clone());
            changes
        })
        .unwrap();

        let mut changes = Changeset::new();
        changes
            .delete(EntityKey::Child(original.national_id.clone()))
            .insert(child("1111111"));
        tables.apply(changes).unwrap();

        assert_ne!(
            tables.child(&original.national_id).unwrap().id,
            original.id
        );
    }

    #[test]
    fn links_can_be_followed_by_uuid() {
        let mut tables = Tables::default();
        let vehicle = vehicle("ABC123");
        let mut rider = child("1111111");
        rider.vehicle_id = Some(vehicle.id);

        let mut changes = Changeset::new();
        changes.insert(vehicle.clone()).insert(rider);
        tables.apply(changes).unwrap();

        assert_eq!(tables.vehicle_by_id(vehicle.id), Some(&vehicle));
        assert_eq!(tables.occupancy(vehicle.id), 1);

        let mut changes = Changeset::new();
        changes.delete(EntityKey::Vehicle(vehicle.plate_number.clone()));
        tables.apply(changes).unwrap();
        assert!(tables.vehicle_by_id(vehicle.id).is_none());
    }

    #[test]
    fn copied_vehicle_with_the_same_id_is_rejected() {
        let mut tables = Tables::default();
        let original = vehicle("ABC123");
        let mut changes = Changeset::new();
        changes.insert(original.clone());
        tables.apply(changes).unwrap();

        let mut copy = vehicle("DEF456");
        copy.id = original.id;
        let mut changes = Changeset::new();
        changes.insert(copy);
        let err = tables.apply(changes).unwrap_err();

        assert_eq!(
            err,
            Conflict::DuplicateId(DuplicateId {
                id: original.id,
                existing: EntityKey::Vehicle(original.plate_number.clone()),
                duplicate: EntityKey::Vehicle("DEF456".parse().unwrap()),
            })
        );
        assert_eq!(tables.vehicle_by_id(original.id), Some(&original));
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn children_sharing_an_id_in_one_changeset_are_rejected() {
        let first = child("1111111");
        let mut second = child("2222222");
        second.id = first.id;

        let mut changes = Changeset::new();
        changes.insert(first).insert(second);
        let err = Tables::default().check(&changes).unwrap_err();
        assert!(matches!(err, Conflict::DuplicateId(_)));
    }

    #[test]
    fn id_freed_by_a_delete_can_be_reused() {
        let mut tables = Tables::default();
        let original = vehicle("ABC123");
        let mut changes = Changeset::new();
        changes.insert(original.clone());
        tables.apply(changes).unwrap();

        let mut renamed = vehicle("DEF456");
        renamed.id = original.id;
        let mut changes = Changeset::new();
        changes
            .delete(EntityKey::Vehicle(original.plate_number.clone()))
            .insert(renamed.clone());
        tables.apply(changes).unwrap();

        assert_eq!(tables.vehicle_by_id(original.id), Some(&renamed));
    }
}
