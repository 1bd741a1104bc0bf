use std::path::PathBuf;

use clap::Parser;
use non_empty_string::NonEmptyString;
use school_roster::{NationalId, NewVehicle, PlateNumber, Tables, Vehicle, VehiclePatch};
use serde_json::json;
use tracing::instrument;

use super::{
    OutputFormat, check_length, check_range, child::print_children, confirm, national_id_of, open,
    parse_name, parse_national_id, parse_plate_number, terminal::Colorize,
};

#[derive(Debug, clap::Subcommand)]
pub enum VehicleCommand {
    /// Register a new vehicle
    Add(Add),

    /// Change a vehicle's model or capacity
    Update(Update),

    /// Remove an empty vehicle from the roster
    Delete(Delete),

    /// Show a vehicle's details and occupancy
    Show(Show),

    /// List vehicles
    List(List),

    /// List the children riding a vehicle
    Children(Children),

    /// Put a driver in charge of a vehicle
    AssignDriver(AssignDriver),

    /// Take the driver off a vehicle
    RemoveDriver(RemoveDriver),
}

impl VehicleCommand {
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Add(command) => command.run(root),
            Self::Update(command) => command.run(root),
            Self::Delete(command) => command.run(root),
            Self::Show(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Children(command) => command.run(root),
            Self::AssignDriver(command) => command.run(root),
            Self::RemoveDriver(command) => command.run(root),
        }
    }
}

#[derive(Debug, Parser)]
pub struct Add {
    /// Plate number (three letters followed by three or four digits)
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// Make and model
    #[arg(long, value_parser = parse_name)]
    model: NonEmptyString,

    /// Number of children the vehicle can carry
    #[arg(long)]
    capacity: u16,
}

impl Add {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        check_range("capacity", self.capacity, &config.capacity_range())?;
        check_length("model", &self.model, &config.name_length_range())?;

        let vehicle = roster.create_vehicle(NewVehicle {
            plate_number: self.plate_number,
            model: self.model,
            capacity: self.capacity,
        })?;

        println!(
            "{}",
            format!(
                "✅ Added vehicle {} with {} seats",
                vehicle.plate_number(),
                vehicle.capacity()
            )
            .success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Update {
    /// Plate number of the vehicle to update
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// New make and model
    #[arg(long, value_parser = parse_name)]
    model: Option<NonEmptyString>,

    /// New capacity; may not drop below the children currently riding
    #[arg(long)]
    capacity: Option<u16>,
}

impl Update {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        if let Some(capacity) = self.capacity {
            check_range("capacity", capacity, &config.capacity_range())?;
        }
        if let Some(model) = &self.model {
            check_length("model", model, &config.name_length_range())?;
        }

        let patch = VehiclePatch {
            model: self.model,
            capacity: self.capacity,
        };
        if patch == VehiclePatch::default() {
            anyhow::bail!("nothing to update: pass at least one of --model, --capacity");
        }

        let vehicle = roster.update_vehicle(&self.plate_number, patch)?;
        println!(
            "{}",
            format!("✅ Updated vehicle {}", vehicle.plate_number()).success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Delete {
    /// Plate number of the vehicle to delete
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let vehicle = roster.vehicle(&self.plate_number)?;

        if !self.yes {
            let occupancy = roster.occupancy(&self.plate_number)?;
            if occupancy > 0 {
                eprintln!(
                    "{}",
                    format!(
                        "⚠️  Vehicle {} still carries {occupancy} children; \
                         unassign them first",
                        vehicle.plate_number()
                    )
                    .warning()
                );
            }
            confirm(&format!(
                "Delete vehicle {} ({})?",
                vehicle.plate_number(),
                vehicle.model()
            ))?;
        }

        roster.delete_vehicle(&self.plate_number)?;
        println!(
            "{}",
            format!("✅ Deleted vehicle {}", self.plate_number).success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Show {
    /// Plate number of the vehicle
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl Show {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let vehicle = roster.vehicle(&self.plate_number)?;

        match self.output {
            OutputFormat::Json => {
                let value = roster.read(|tables| to_json(tables, &vehicle));
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                let (driver, occupancy) = roster.read(|tables| {
                    (
                        national_id_of(tables, vehicle.driver_id()),
                        tables.occupancy(vehicle.id()),
                    )
                });
                println!("Vehicle {}", vehicle.plate_number());
                println!("  Model:     {}", vehicle.model());
                println!("  Occupancy: {occupancy}/{}", vehicle.capacity());
                println!(
                    "  Driver:    {}",
                    driver.unwrap_or_else(|| "unassigned".dim())
                );
                println!("  Created:   {}", vehicle.created().format("%Y-%m-%d %H:%M"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct List {
    /// Only vehicles with free seats
    #[arg(long)]
    available: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;

        roster.read(|tables| -> anyhow::Result<()> {
            let vehicles: Vec<&Vehicle> = tables
                .vehicles()
                .filter(|v| !self.available || tables.occupancy(v.id()) < usize::from(v.capacity()))
                .collect();

            match self.output {
                OutputFormat::Json => {
                    let values: Vec<_> = vehicles.iter().map(|v| to_json(tables, v)).collect();
                    println!("{}", serde_json::to_string_pretty(&values)?);
                }
                OutputFormat::Table => {
                    if vehicles.is_empty() {
                        println!("{}", "No vehicles found.".dim());
                        return Ok(());
                    }
                    println!(
                        "{:<9} {:<20} {:>9}  Driver",
                        "Plate", "Model", "Occupancy"
                    );
                    for vehicle in vehicles {
                        let load = format!(
                            "{}/{}",
                            tables.occupancy(vehicle.id()),
                            vehicle.capacity()
                        );
                        let driver = national_id_of(tables, vehicle.driver_id())
                            .unwrap_or_else(|| "–".dim());
                        println!(
                            "{:<9} {:<20} {load:>9}  {driver}",
                            vehicle.plate_number(),
                            vehicle.model()
                        );
                    }
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug, Parser)]
pub struct Children {
    /// Plate number of the vehicle
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl Children {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let children = roster.list_children_of_vehicle(&self.plate_number)?;
        roster.read(|tables| print_children(tables, &children, self.output))
    }
}

#[derive(Debug, Parser)]
pub struct AssignDriver {
    /// Plate number of the vehicle
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,

    /// National ID of the driver
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,
}

impl AssignDriver {
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
pub struct RemoveDriver {
    /// Plate number of the vehicle
    #[arg(value_parser = parse_plate_number)]
    plate_number: PlateNumber,
}

impl RemoveDriver {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        let link = roster.remove_driver_from_vehicle(&self.plate_number)?;
        println!(
            "{}",
            format!(
                "✅ Removed driver {} from vehicle {}",
                link.driver.national_id(),
                self.plate_number
            )
            .success()
        );
        Ok(())
    }
}

fn to_json(tables: &Tables, vehicle: &Vehicle) -> serde_json::Value {
    json!({
        "id": vehicle.id(),
        "plate_number": vehicle.plate_number().as_str(),
        "model": vehicle.model(),
        "capacity": vehicle.capacity(),
        "occupancy": tables.occupancy(vehicle.id()),
        "driver": national_id_of(tables, vehicle.driver_id()),
        "created": vehicle.created(),
    })
}
