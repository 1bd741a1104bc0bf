use std::path::PathBuf;

use clap::Parser;
use non_empty_string::NonEmptyString;
use school_roster::{Driver, DriverPatch, LicenseNumber, NationalId, NewDriver, PlateNumber, Tables};
use serde_json::json;
use tracing::instrument;

use super::{
    OutputFormat, check_length, confirm, open, parse_license_number, parse_name,
    parse_national_id, parse_plate_number, plate_of, terminal::Colorize,
};

#[derive(Debug, clap::Subcommand)]
pub enum DriverCommand {
    /// Register a new driver
    Add(Add),

    /// Change a driver's details
    Update(Update),

    /// Remove a driver from the roster, freeing their vehicle
    Delete(Delete),

    /// Show a driver's details
    Show(Show),

    /// List drivers
    List(List),

    /// Put a driver in charge of a vehicle
    Assign(Assign),

    /// Take a driver off their vehicle
    Unassign(Unassign),
}

impl DriverCommand {
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Add(command) => command.run(root),
            Self::Update(command) => command.run(root),
            Self::Delete(command) => command.run(root),
            Self::Show(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Assign(command) => command.run(root),
            Self::Unassign(command) => command.run(root),
        }
    }
}

#[derive(Debug, Parser)]
pub struct Add {
    /// National ID (7 or 8 digits)
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// Given name
    #[arg(long, value_parser = parse_name)]
    first_name: NonEmptyString,

    /// Family name
    #[arg(long, value_parser = parse_name)]
    last_name: NonEmptyString,

    /// Driving licence number
    #[arg(long = "license", value_parser = parse_license_number)]
    license_number: LicenseNumber,
}

impl Add {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        check_length("first name", &self.first_name, &config.name_length_range())?;
        check_length("last name", &self.last_name, &config.name_length_range())?;

        let driver = roster.create_driver(NewDriver {
            national_id: self.national_id,
            first_name: self.first_name,
            last_name: self.last_name,
            license_number: self.license_number,
        })?;

        println!("{}", format!("✅ Added driver {}", driver.national_id()).success());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Update {
    /// National ID of the driver to update
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// New given name
    #[arg(long, value_parser = parse_name)]
    first_name: Option<NonEmptyString>,

    /// New family name
    #[arg(long, value_parser = parse_name)]
    last_name: Option<NonEmptyString>,

    /// New driving licence number
    #[arg(long = "license", value_parser = parse_license_number)]
    license_number: Option<LicenseNumber>,
}

impl Update {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        for (field, name) in [("first name", &self.first_name), ("last name", &self.last_name)] {
            if let Some(name) = name {
                check_length(field, name, &config.name_length_range())?;
            }
        }

        let patch = DriverPatch {
            first_name: self.first_name,
            last_name: self.last_name,
            license_number: self.license_number,
        };
        if patch == DriverPatch::default() {
            anyhow::bail!(
                "nothing to update: pass at least one of --first-name, --last-name, --license"
            );
        }

        let driver = roster.update_driver(&self.national_id, patch)?;
        println!("{}", format!("✅ Updated driver {}", driver.national_id()).success());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Delete {
    /// National ID of the driver to delete
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let driver = roster.driver(&self.national_id)?;

        if !self.yes {
            let vehicle = roster.read(|tables| plate_of(tables, driver.vehicle_id()));
            if let Some(vehicle) = &vehicle {
                println!("Vehicle {vehicle} will be left without a driver.");
            }
            confirm(&format!(
                "Delete driver {} ({} {})?",
                driver.national_id(),
                driver.first_name(),
                driver.last_name()
            ))?;
        }

        roster.delete_driver(&self.national_id)?;
        println!(
            "{}",
            format!("✅ Deleted driver {}", self.national_id).success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Show {
    /// National ID of the driver
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl Show {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let driver = roster.driver(&self.national_id)?;

        match self.output {
            OutputFormat::Json => {
                let value = roster.read(|tables| to_json(tables, &driver));
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                let vehicle = roster.read(|tables| plate_of(tables, driver.vehicle_id()));
                println!("Driver {}", driver.national_id());
                println!("  Name:    {} {}", driver.first_name(), driver.last_name());
                println!("  Licence: {}", driver.license_number());
                println!(
                    "  Vehicle: {}",
                    vehicle.unwrap_or_else(|| "unassigned".dim())
                );
                println!("  Created: {}", driver.created().format("%Y-%m-%d %H:%M"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct List {
    /// Only drivers without a vehicle
    #[arg(long)]
    unassigned: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let drivers: Vec<Driver> = roster
            .drivers()
            .into_iter()
            .filter(|driver| !self.unassigned || driver.vehicle_id().is_none())
            .collect();

        roster.read(|tables| -> anyhow::Result<()> {
            match self.output {
                OutputFormat::Json => {
                    let values: Vec<_> = drivers.iter().map(|d| to_json(tables, d)).collect();
                    println!("{}", serde_json::to_string_pretty(&values)?);
                    Ok(())
                }
                OutputFormat::Table => {
                    if drivers.is_empty() {
                        println!("{}", "No drivers found.".dim());
                        return Ok(());
                    }
                    println!("{:<10} {:<30} {:<12} Vehicle", "ID", "Name", "Licence");
                    for driver in &drivers {
                        let name = format!("{} {}", driver.first_name(), driver.last_name());
                        let vehicle =
                            plate_of(tables, driver.vehicle_id()).unwrap_or_else(|| "–".dim());
                        println!(
                            "{:<10} {name:<30} {:<12} {vehicle}",
                            driver.national_id(),
                            driver.license_number()
                        );
                    }
                    Ok(())
                }
            }
        })
    }
}

#[derive(Debug, Parser)]
pub struct Assign {
    /// National ID of the driver
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// Plate number of the vehicle
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,
}

impl Assign {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        roster.assign_driver_to_vehicle(&self.plate_number, &self.national_id)?;
        println!(
            "{}",
            format!(
                "✅ Assigned driver {} to vehicle {}",
                self.national_id, self.plate_number
            )
            .success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Unassign {
    /// National ID of the driver
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,
}

impl Unassign {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let link = roster.remove_driver_from_vehicle_by_driver(&self.national_id)?;
        println!(
            "{}",
            format!(
                "✅ Removed driver {} from vehicle {}",
                self.national_id,
                link.vehicle.plate_number()
            )
            .success()
        );
        Ok(())
    }
}

fn to_json(tables: &Tables, driver: &Driver) -> serde_json::Value {
    json!({
        "id": driver.id(),
        "national_id": driver.national_id().as_str(),
        "first_name": driver.first_name(),
        "last_name": driver.last_name(),
        "license_number": driver.license_number().as_str(),
        "vehicle": plate_of(tables, driver.vehicle_id()),
        "created": driver.created(),
    })
}
