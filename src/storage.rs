//! Entity storage backends.
//!
//! A [`Store`] exposes a read-only view of its [`Tables`] and commits
//! [`Changeset`]s all-or-nothing. Two backends are provided: the
//! [`MemoryStore`], and the [`DirectoryStore`] which persists one YAML file
//! per record.

use std::{io, path::PathBuf};

use crate::domain::{
    Changeset, Child, Conflict, Driver, DuplicateId, DuplicateKey, Entity, EntityKey, Tables,
    Vehicle,
};

pub mod directory;
pub use directory::{DirectoryStore, LoadError};

mod record;

/// Keyed storage for roster records.
pub trait Store {
    /// The current records.
    fn tables(&self) -> &Tables;

    /// Applies every change in `changes`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if an insert collides with an
    /// existing key, [`StoreError::DuplicateId`] if a record reuses another
    /// record's id, or a backend-specific error if persisting fails. In every
    /// case the store is left unchanged.
    fn commit(&mut self, changes: Changeset) -> Result<(), StoreError>;

    /// Creates a record, failing if its key is taken.
    ///
    /// # Errors
    ///
    /// See [`Store::commit`].
    fn insert(&mut self, entity: Entity) -> Result<(), StoreError> {
        let mut changes = Changeset::new();
        changes.insert(entity);
        self.commit(changes)
    }

    /// Creates or replaces a record.
    ///
    /// # Errors
    ///
    /// See [`Store::commit`].
    fn put(&mut self, entity: Entity) -> Result<(), StoreError> {
        let mut changes = Changeset::new();
        changes.put(entity);
        self.commit(changes)
    }

    /// Removes a record. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// See [`Store::commit`].
    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        let mut changes = Changeset::new();
        changes.delete(key);
        self.commit(changes)
    }

    /// Looks up any record by key.
    fn get(&self, key: &EntityKey) -> Option<Entity> {
        let tables = self.tables();
        match key {
            EntityKey::Child(id) => tables.child(id).cloned().map(Entity::from),
            EntityKey::Driver(id) => tables.driver(id).cloned().map(Entity::from),
            EntityKey::Vehicle(plate) => tables.vehicle(plate).cloned().map(Entity::from),
        }
    }

    /// All children.
    fn list_children(&self) -> Vec<Child> {
        self.tables().children().cloned().collect()
    }

    /// All drivers.
    fn list_drivers(&self) -> Vec<Driver> {
        self.tables().drivers().cloned().collect()
    }

    /// All vehicles.
    fn list_vehicles(&self) -> Vec<Vehicle> {
        self.tables().vehicles().cloned().collect()
    }
}

/// Errors committing a changeset.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert collided with an existing business key.
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKey),

    /// A record carries an id another record of its kind already holds.
    #[error(transparent)]
    DuplicateId(#[from] DuplicateId),

    /// A record file could not be written, renamed or removed.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        /// The file being written.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize {key}: {source}")]
    Serialize {
        /// The record being serialized.
        key: EntityKey,
        /// The underlying error.
        source: serde_yaml::Error,
    },
}

impl From<Conflict> for StoreError {
    fn from(err: Conflict) -> Self {
        match err {
            Conflict::DuplicateKey(err) => err.into(),
            Conflict::DuplicateId(err) => err.into(),
        }
    }
}

/// A store that keeps records in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn tables(&self) -> &Tables {
        &self.tables
    }

    fn commit(&mut self, changes: Changeset) -> Result<(), StoreError> {
        self.tables.apply(changes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewVehicle, parse_name};

    fn vehicle(plate: &str) -> Vehicle {
        Vehicle::new(NewVehicle {
            plate_number: plate.parse().unwrap(),
            model: parse_name("Mercedes Sprinter").unwrap(),
            capacity: 20,
        })
    }

    #[test]
    fn put_upserts_and_insert_rejects_duplicates() {
        let mut store = MemoryStore::new();
        let mut bus = vehicle("ABC123");
        store.insert(bus.clone().into()).unwrap();

        let err = store.insert(vehicle("ABC123").into()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        bus.capacity = 30;
        store.put(bus.clone().into()).unwrap();
        assert_eq!(
            store.get(&EntityKey::Vehicle(bus.plate_number.clone())),
            Some(Entity::Vehicle(bus.clone()))
        );

        store
            .delete(EntityKey::Vehicle(bus.plate_number.clone()))
            .unwrap();
        assert!(store.list_vehicles().is_empty());
    }
}
