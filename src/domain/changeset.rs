use crate::domain::{Entity, EntityKey};

/// A single write within a [`Changeset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create a record. Fails if the key already exists.
    Insert(Entity),
    /// Create or replace a record.
    Put(Entity),
    /// Remove a record. Removing an absent key is a no-op.
    Delete(EntityKey),
}

impl Change {
    /// The key this change writes to.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Insert(entity) | Self::Put(entity) => entity.key(),
            Self::Delete(key) => key.clone(),
        }
    }
}

/// An ordered group of writes committed as one unit.
///
/// A store either applies every change in the set or none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    /// Creates an empty changeset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Appends an insert of a new record.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> &mut Self {
        self.changes.push(Change::Insert(entity.into()));
        self
    }

    /// Appends an upsert.
    pub fn put(&mut self, entity: impl Into<Entity>) -> &mut Self {
        self.changes.push(Change::Put(entity.into()));
        self
    }

    /// Appends a deletion.
    pub fn delete(&mut self, key: EntityKey) -> &mut Self {
        self.changes.push(Change::Delete(key));
        self
    }

    /// Whether the changeset contains no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterates over the writes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }
}

impl IntoIterator for Changeset {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Changeset {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
