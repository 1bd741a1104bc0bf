use std::{fmt, ops::RangeInclusive, path::PathBuf, process};

mod child;
mod driver;
mod init;
mod status;
mod terminal;
mod validate;
mod vehicle;

use anyhow::Context;
use child::ChildCommand;
use clap::ArgAction;
use driver::DriverCommand;
use init::Init;
use non_empty_string::NonEmptyString;
use school_roster::{
    Config, DirectoryStore, ErrorKind, IntegrityError, LicenseNumber, NationalId, PlateNumber,
    Roster, RosterError, Tables,
};
use status::Status;
use uuid::Uuid;
use validate::Validate;
use vehicle::VehicleCommand;

/// Parse a national ID, ignoring surrounding whitespace.
fn parse_national_id(s: &str) -> Result<NationalId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Parse a plate number, normalizing to uppercase.
fn parse_plate_number(s: &str) -> Result<PlateNumber, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Parse a driving licence number, normalizing to uppercase.
fn parse_license_number(s: &str) -> Result<LicenseNumber, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_name(s: &str) -> Result<NonEmptyString, String> {
    school_roster::domain::parse_name(s).map_err(|e| format!("{e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the roster directory
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Show record counts and vehicle occupancy (default)
    Status(Status),

    /// Initialize a new roster directory
    Init(Init),

    /// Check every record for broken links
    Validate(Validate),

    /// Manage children
    #[command(subcommand)]
    Child(ChildCommand),

    /// Manage drivers
    #[command(subcommand)]
    Driver(DriverCommand),

    /// Manage vehicles and their assignments
    #[command(subcommand)]
    Vehicle(VehicleCommand),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root),
            Self::Init(command) => command.run(&root),
            Self::Validate(command) => command.run(root),
            Self::Child(command) => command.run(root),
            Self::Driver(command) => command.run(root),
            Self::Vehicle(command) => command.run(root),
        }
    }
}

/// Output format for commands that print records.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Opens the roster at `root`, returning it with its configuration.
fn open(root: PathBuf) -> anyhow::Result<(Roster<DirectoryStore>, Config)> {
    let store = DirectoryStore::open(root.clone())
        .with_context(|| format!("failed to open roster at {}", root.display()))?;
    let config = store.config().clone();
    Ok((Roster::new(store), config))
}

/// Rejects values outside the configured limits.
fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> anyhow::Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if !range.contains(&value) {
        anyhow::bail!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Rejects names whose trimmed length is outside the configured limits.
fn check_length(
    field: &str,
    value: &NonEmptyString,
    range: &RangeInclusive<usize>,
) -> anyhow::Result<()> {
    let length = value.as_str().chars().count();
    if !range.contains(&length) {
        anyhow::bail!(
            "{field} must be between {} and {} characters long, got {length}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Asks before a destructive change, exiting if the user declines.
fn confirm(prompt: &str) -> anyhow::Result<()> {
    let proceed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !proceed {
        println!("Cancelled");
        process::exit(130);
    }
    Ok(())
}

fn plate_of(tables: &Tables, vehicle_id: Option<Uuid>) -> Option<String> {
    vehicle_id.map(|id| {
        tables
            .vehicle_by_id(id)
            .map_or_else(|| format!("<missing {id}>"), |v| v.plate_number().to_string())
    })
}

fn national_id_of(tables: &Tables, driver_id: Option<Uuid>) -> Option<String> {
    driver_id.map(|id| {
        tables
            .driver_by_id(id)
            .map_or_else(|| format!("<missing {id}>"), |d| d.national_id().to_string())
    })
}

/// The process exit status for a failed command.
///
/// Roster failures map to a status per kind so that scripts can tell them
/// apart; everything else exits with 1.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    if let Some(error) = error.downcast_ref::<RosterError>() {
        return match error.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::DuplicateKey => 3,
            ErrorKind::AlreadyAssigned | ErrorKind::NotAssigned => 4,
            ErrorKind::CapacityExceeded | ErrorKind::CapacityBelowOccupancy => 5,
            ErrorKind::HasAssignedChildren => 6,
            ErrorKind::BrokenLink => 7,
            ErrorKind::Storage => 1,
        };
    }
    if error.downcast_ref::<IntegrityError>().is_some() {
        return 7;
    }
    1
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;
    use school_roster::{Store, domain::EntityKey};
    use tempfile::tempdir;
    use test_case::test_case;

    use super::*;

    fn run(root: &Path, args: &[&str]) -> anyhow::Result<()> {
        let root = root.to_str().unwrap();
        let args = ["roster", "--root", root].into_iter().chain(args.iter().copied());
        let cli = Cli::try_parse_from(args)?;
        cli.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(cli.root)
    }

    fn initialized() -> tempfile::TempDir {
        let tmp = tempdir().unwrap();
        run(tmp.path(), &["init"]).unwrap();
        tmp
    }

    fn seed(root: &Path) {
        run(
            root,
            &["vehicle", "add", "abc123", "--model", "Iveco Daily", "--capacity", "10"],
        )
        .unwrap();
        run(
            root,
            &[
                "driver", "add", "5555555", "--first-name", "Marta", "--last-name", "López",
                "--license", "lic12345",
            ],
        )
        .unwrap();
        run(
            root,
            &[
                "child", "add", "1111111", "--first-name", "Tomás", "--last-name", "Ruiz", "--age",
                "8",
            ],
        )
        .unwrap();
    }

    #[test]
    fn init_twice_fails() {
        let tmp = initialized();
        assert!(run(tmp.path(), &["init"]).is_err());
    }

    #[test]
    fn assignments_are_written_to_disk() {
        let tmp = initialized();
        seed(tmp.path());

        run(tmp.path(), &["child", "assign", "1111111", "ABC123"]).unwrap();
        run(tmp.path(), &["vehicle", "assign-driver", "abc123", "5555555"]).unwrap();

        let store = DirectoryStore::open(tmp.path().to_path_buf()).unwrap();
        let tables = store.tables();
        let vehicle = tables.vehicle(&"ABC123".parse().unwrap()).unwrap();
        let driver = tables.driver(&"5555555".parse().unwrap()).unwrap();
        assert_eq!(tables.occupancy(vehicle.id()), 1);
        assert_eq!(vehicle.driver_id(), Some(driver.id()));
        assert_eq!(driver.vehicle_id(), Some(vehicle.id()));

        run(tmp.path(), &["validate"]).unwrap();
        run(tmp.path(), &["status", "--output", "json"]).unwrap();
    }

    #[test]
    fn delete_with_yes_removes_record() {
        let tmp = initialized();
        seed(tmp.path());

        run(tmp.path(), &["child", "delete", "1111111", "--yes"]).unwrap();

        let store = DirectoryStore::open(tmp.path().to_path_buf()).unwrap();
        assert!(store.get(&EntityKey::Child("1111111".parse().unwrap())).is_none());
    }

    #[test]
    fn out_of_range_values_are_rejected_before_writing() {
        let tmp = initialized();

        let args = ["vehicle", "add", "XYZ999", "--model", "Van", "--capacity", "4"];
        let err = run(tmp.path(), &args).unwrap_err();
        assert_eq!(exit_code(&err), 1);

        let store = DirectoryStore::open(tmp.path().to_path_buf()).unwrap();
        assert!(store.list_vehicles().is_empty());
    }

    #[test_case(&["child", "show", "9999999"], 2; "missing child")]
    #[test_case(
        &["child", "add", "1111111", "--first-name", "Ana", "--last-name", "Gil", "--age", "7"], 3;
        "duplicate child"
    )]
    #[test_case(&["child", "unassign", "1111111"], 4; "unassigned child")]
    #[test_case(&["vehicle", "remove-driver", "ABC123"], 4; "vehicle without driver")]
    #[test_case(&["vehicle", "update", "ABC123", "--capacity", "10"], 0; "capacity unchanged")]
    fn failures_map_to_exit_codes(args: &[&str], expected: u8) {
        let tmp = initialized();
        seed(tmp.path());

        let code = run(tmp.path(), args).map_or_else(|e| exit_code(&e), |()| 0);
        assert_eq!(code, expected);
    }

    const LONG_MODEL: &str = "Mercedes-Benz Sprinter 516 CDI Long Wheelbase School Bus";

    #[test_case(
        &["child", "add", "2222222", "--first-name", "A", "--last-name", "Gil", "--age", "7"];
        "short first name"
    )]
    #[test_case(
        &["driver", "update", "5555555", "--last-name", "  P  "];
        "short name after trimming"
    )]
    #[test_case(
        &["vehicle", "update", "ABC123", "--model", LONG_MODEL];
        "long model"
    )]
    fn names_outside_length_limits_are_rejected_before_writing(args: &[&str]) {
        let tmp = initialized();
        seed(tmp.path());
        let before = DirectoryStore::open(tmp.path().to_path_buf()).unwrap();

        let err = run(tmp.path(), args).unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(err.to_string().contains("characters long"));

        let after = DirectoryStore::open(tmp.path().to_path_buf()).unwrap();
        assert_eq!(after.tables(), before.tables());
    }

    #[test]
    fn names_at_the_length_limits_are_accepted() {
        let tmp = initialized();
        let model = "M".repeat(50);

        let vehicle = ["vehicle", "add", "XYZ999", "--model", model.as_str(), "--capacity", "10"];
        run(tmp.path(), &vehicle).unwrap();
        let child = [
            "child", "add", "2222222", "--first-name", "Li", "--last-name", "Wu", "--age", "7",
        ];
        run(tmp.path(), &child).unwrap();
    }

    #[test]
    fn occupied_vehicle_delete_exits_with_dedicated_code() {
        let tmp = initialized();
        seed(tmp.path());
        run(tmp.path(), &["child", "assign", "1111111", "ABC123"]).unwrap();

        let err = run(tmp.path(), &["vehicle", "delete", "ABC123", "--yes"]).unwrap_err();
        assert_eq!(exit_code(&err), 6);
    }

    #[test]
    fn broken_link_fails_validation() {
        let tmp = initialized();
        seed(tmp.path());

        let path = tmp.path().join("drivers").join("5555555.yaml");
        let content = std::fs::read_to_string(&path).unwrap();
        let vehicle_id = DirectoryStore::open(tmp.path().to_path_buf())
            .unwrap()
            .tables()
            .vehicle(&"ABC123".parse().unwrap())
            .unwrap()
            .id();
        std::fs::write(&path, format!("{content}vehicle_id: {vehicle_id}\n")).unwrap();

        let err = run(tmp.path(), &["validate"]).unwrap_err();
        assert_eq!(exit_code(&err), 7);
        let err = run(tmp.path(), &["driver", "unassign", "5555555"]).unwrap_err();
        assert_eq!(exit_code(&err), 7);
    }
}
