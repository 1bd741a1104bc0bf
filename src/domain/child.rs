use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use uuid::Uuid;

use crate::domain::NationalId;

/// A child riding the school transport.
///
/// The vehicle link is only ever changed by the roster service, which keeps
/// it consistent with the vehicle's capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub(crate) id: Uuid,
    pub(crate) national_id: NationalId,
    pub(crate) first_name: NonEmptyString,
    pub(crate) last_name: NonEmptyString,
    pub(crate) age: u8,
    pub(crate) vehicle_id: Option<Uuid>,
    pub(crate) created: DateTime<Utc>,
}

/// The data required to register a new child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChild {
    /// National ID, the business key.
    pub national_id: NationalId,
    /// Given name.
    pub first_name: NonEmptyString,
    /// Family name.
    pub last_name: NonEmptyString,
    /// Age in years.
    pub age: u8,
}

/// A partial update to a child. Only the supplied fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPatch {
    /// Replacement given name.
    pub first_name: Option<NonEmptyString>,
    /// Replacement family name.
    pub last_name: Option<NonEmptyString>,
    /// Replacement age.
    pub age: Option<u8>,
}

impl Child {
    pub(crate) fn new(data: NewChild) -> Self {
        Self {
            id: Uuid::new_v4(),
            national_id: data.national_id,
            first_name: data.first_name,
            last_name: data.last_name,
            age: data.age,
            vehicle_id: None,
            created: Utc::now(),
        }
    }

    pub(crate) fn apply(&mut self, patch: ChildPatch) {
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        if let Some(age) = patch.age {
            self.age = age;
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

    /// Age in years.
    #[must_use]
    pub const fn age(&self) -> u8 {
        self.age
    }

    /// The vehicle this child rides, if any.
    #[must_use]
    pub const fn vehicle_id(&self) -> Option<Uuid> {
        self.vehicle_id
    }

    /// When the child was registered.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }
}
