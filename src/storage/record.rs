// On-disk forms of roster records.
//
// The business key is not stored in the file; it is the file stem. Links are
// omitted entirely when unset, so "no link" has a single representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Child, Driver, EmptyNameError, Entity, Kind, LicenseNumber, Vehicle,
    keys::{InvalidNationalId, InvalidPlateNumber},
    parse_name,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum ChildFile {
    #[serde(rename = "1")]
    V1 {
        id: Uuid,
        first_name: String,
        last_name: String,
        age: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vehicle_id: Option<Uuid>,
        created: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum DriverFile {
    #[serde(rename = "1")]
    V1 {
        id: Uuid,
        first_name: String,
        last_name: String,
        license_number: LicenseNumber,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vehicle_id: Option<Uuid>,
        created: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum VehicleFile {
    #[serde(rename = "1")]
    V1 {
        id: Uuid,
        model: String,
        capacity: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver_id: Option<Uuid>,
        created: DateTime<Utc>,
    },
}

/// Errors decoding a record file.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    NationalId(#[from] InvalidNationalId),
    #[error(transparent)]
    Plate(#[from] InvalidPlateNumber),
    #[error(transparent)]
    Name(#[from] EmptyNameError),
}

/// Serializes a record to YAML.
pub fn encode(entity: &Entity) -> Result<String, serde_yaml::Error> {
    match entity {
        Entity::Child(child) => serde_yaml::to_string(&ChildFile::V1 {
            id: child.id,
            first_name: child.first_name().to_string(),
            last_name: child.last_name().to_string(),
            age: child.age,
            vehicle_id: child.vehicle_id,
            created: child.created,
        }),
        Entity::Driver(driver) => serde_yaml::to_string(&DriverFile::V1 {
            id: driver.id,
            first_name: driver.first_name().to_string(),
            last_name: driver.last_name().to_string(),
            license_number: driver.license_number.clone(),
            vehicle_id: driver.vehicle_id,
            created: driver.created,
        }),
        Entity::Vehicle(vehicle) => serde_yaml::to_string(&VehicleFile::V1 {
            id: vehicle.id,
            model: vehicle.model().to_string(),
            capacity: vehicle.capacity,
            driver_id: vehicle.driver_id,
            created: vehicle.created,
        }),
    }
}

/// Parses a record of the given kind from its file stem and YAML content.
pub fn decode(kind: Kind, stem: &str, content: &str) -> Result<Entity, RecordError> {
    let entity = match kind {
        Kind::Child => {
            let ChildFile::V1 {
                id,
                first_name,
                last_name,
                age,
                vehicle_id,
                created,
            } = serde_yaml::from_str(content)?;
            Entity::Child(Child {
                id,
                national_id: stem.parse()?,
                first_name: parse_name(&first_name)?,
                last_name: parse_name(&last_name)?,
                age,
                vehicle_id,
                created,
            })
        }
        Kind::Driver => {
            let DriverFile::V1 {
                id,
                first_name,
                last_name,
                license_number,
                vehicle_id,
                created,
            } = serde_yaml::from_str(content)?;
            Entity::Driver(Driver {
                id,
                national_id: stem.parse()?,
                first_name: parse_name(&first_name)?,
                last_name: parse_name(&last_name)?,
                license_number,
                vehicle_id,
                created,
            })
        }
        Kind::Vehicle => {
            let VehicleFile::V1 {
                id,
                model,
                capacity,
                driver_id,
                created,
            } = serde_yaml::from_str(content)?;
            Entity::Vehicle(Vehicle {
                id,
                plate_number: stem.parse()?,
                model: parse_name(&model)?,
                capacity,
                driver_id,
                created,
            })
        }
    };
    Ok(entity)
}
