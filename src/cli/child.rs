use std::path::PathBuf;

use clap::Parser;
use non_empty_string::NonEmptyString;
use school_roster::{Child, ChildPatch, NationalId, NewChild, PlateNumber, Tables};
use serde_json::json;
use tracing::instrument;

use super::{
    OutputFormat, check_length, check_range, confirm, open, parse_name, parse_national_id,
    parse_plate_number, plate_of, terminal::Colorize,
};

#[derive(Debug, clap::Subcommand)]
pub enum ChildCommand {
    /// Register a new child
    Add(Add),

    /// Change a child's details
    Update(Update),

    /// Remove a child from the roster, releasing their seat
    Delete(Delete),

    /// Show a child's details
    Show(Show),

    /// List children
    List(List),

    /// Seat a child on a vehicle
    Assign(Assign),

    /// Release a child's seat
    Unassign(Unassign),
}

impl ChildCommand {
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

    /// Age in years
    #[arg(long)]
    age: u8,
}

impl Add {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        check_range("age", self.age, &config.age_range())?;
        check_length("first name", &self.first_name, &config.name_length_range())?;
        check_length("last name", &self.last_name, &config.name_length_range())?;

        let child = roster.create_child(NewChild {
            national_id: self.national_id,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
        })?;

        println!("{}", format!("✅ Added child {}", child.national_id()).success());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Update {
    /// National ID of the child to update
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,

    /// New given name
    #[arg(long, value_parser = parse_name)]
    first_name: Option<NonEmptyString>,

    /// New family name
    #[arg(long, value_parser = parse_name)]
    last_name: Option<NonEmptyString>,

    /// New age in years
    #[arg(long)]
    age: Option<u8>,
}

impl Update {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, config) = open(root)?;
        if let Some(age) = self.age {
            check_range("age", age, &config.age_range())?;
        }
        for (field, name) in [("first name", &self.first_name), ("last name", &self.last_name)] {
            if let Some(name) = name {
                check_length(field, name, &config.name_length_range())?;
            }
        }

        let patch = ChildPatch {
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
        };
        if patch == ChildPatch::default() {
            anyhow::bail!(
                "nothing to update: pass at least one of --first-name, --last-name, --age"
            );
        }

        let child = roster.update_child(&self.national_id, patch)?;
        println!("{}", format!("✅ Updated child {}", child.national_id()).success());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Delete {
    /// National ID of the child to delete
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
        let child = roster.child(&self.national_id)?;

        if !self.yes {
            confirm(&format!(
                "Delete child {} ({} {})?",
                child.national_id(),
                child.first_name(),
                child.last_name()
            ))?;
        }

        roster.delete_child(&self.national_id)?;
        println!(
            "{}",
            format!("✅ Deleted child {}", self.national_id).success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Show {
    /// National ID of the child
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
        let child = roster.child(&self.national_id)?;
        let vehicle = roster.read(|tables| plate_of(tables, child.vehicle_id()));

        match self.output {
            OutputFormat::Json => {
                let value = roster.read(|tables| to_json(tables, &child));
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                println!("Child {}", child.national_id());
                println!("  Name:    {} {}", child.first_name(), child.last_name());
                println!("  Age:     {}", child.age());
                println!(
                    "  Vehicle: {}",
                    vehicle.unwrap_or_else(|| "unassigned".dim())
                );
                println!("  Created: {}", child.created().format("%Y-%m-%d %H:%M"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct List {
    /// Only children without a seat
    #[arg(long, conflicts_with = "vehicle")]
    unassigned: bool,

    /// Only children riding this vehicle
    #[arg(long, value_parser = parse_plate_number)]
    vehicle: Option<PlateNumber>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;

        let children = match &self.vehicle {
            Some(plate) => roster.list_children_of_vehicle(plate)?,
            None if self.unassigned => roster
                .children()
                .into_iter()
                .filter(|child| child.vehicle_id().is_none())
                .collect(),
            None => roster.children(),
        };

        roster.read(|tables| print_children(tables, &children, self.output))
    }
}

#[derive(Debug, Parser)]
pub struct Assign {
    /// National ID of the child
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
        roster.assign_child_to_vehicle(&self.national_id, &self.plate_number)?;
        let occupancy = roster.occupancy(&self.plate_number)?;
        let capacity = roster.vehicle(&self.plate_number)?.capacity();

        println!(
            "{}",
            format!(
                "✅ Assigned child {} to vehicle {} ({occupancy}/{capacity})",
                self.national_id, self.plate_number
            )
            .success()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Unassign {
    /// National ID of the child
    #[arg(value_parser = parse_national_id)]
    national_id: NationalId,
}

impl Unassign {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;
        roster.remove_child_from_vehicle(&self.national_id)?;
        println!(
            "{}",
            format!("✅ Removed child {} from their vehicle", self.national_id).success()
        );
        Ok(())
    }
}

fn to_json(tables: &Tables, child: &Child) -> serde_json::Value {
    json!({
        "id": child.id(),
        "national_id": child.national_id().as_str(),
        "first_name": child.first_name(),
        "last_name": child.last_name(),
        "age": child.age(),
        "vehicle": plate_of(tables, child.vehicle_id()),
        "created": child.created(),
    })
}

/// Prints children as a table or a JSON array.
pub(super) fn print_children(
    tables: &Tables,
    children: &[Child],
    output: OutputFormat,
) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => {
            let values: Vec<_> = children.iter().map(|child| to_json(tables, child)).collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        OutputFormat::Table => {
            if children.is_empty() {
                println!("{}", "No children found.".dim());
                return Ok(());
            }
            println!("{:<10} {:<30} {:>3}  Vehicle", "ID", "Name", "Age");
            for child in children {
                let name = format!("{} {}", child.first_name(), child.last_name());
                let vehicle = plate_of(tables, child.vehicle_id()).unwrap_or_else(|| "–".dim());
                println!(
                    "{:<10} {name:<30} {:>3}  {vehicle}",
                    child.national_id(),
                    child.age()
                );
            }
        }
    }
    Ok(())
}
