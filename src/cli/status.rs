use std::path::PathBuf;

use clap::Parser;
use school_roster::Tables;
use serde_json::json;
use tracing::instrument;

use super::{
    OutputFormat, national_id_of, open,
    terminal::{Colorize, is_narrow},
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show record counts, vehicle occupancy and integrity problems")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

/// One vehicle's row in the occupancy table.
struct Row {
    plate: String,
    model: String,
    driver: Option<String>,
    occupancy: usize,
    capacity: u16,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;

        let (counts, rows) = roster.read(|tables| {
            let counts = [
                ("children", tables.children().count()),
                ("drivers", tables.drivers().count()),
                ("vehicles", tables.vehicles().count()),
            ];
            (counts, occupancy_rows(tables))
        });
        let problems = roster
            .audit()
            .map_or_else(|e| e.problems().len(), |()| 0);

        if counts.iter().all(|(_, count)| *count == 0) {
            println!("No records found yet. Add one with 'roster vehicle add'.");
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => Self::output_json(&counts, &rows, problems)?,
            OutputFormat::Table if self.quiet => Self::output_quiet(&counts, problems),
            OutputFormat::Table => Self::output_table(&counts, &rows, problems),
        }

        Ok(())
    }

    fn output_json(counts: &[(&str, usize)], rows: &[Row], problems: usize) -> anyhow::Result<()> {
        let vehicles: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "plate_number": row.plate,
                    "model": row.model,
                    "driver": row.driver,
                    "occupancy": row.occupancy,
                    "capacity": row.capacity,
                })
            })
            .collect();

        let totals: serde_json::Map<_, _> = counts
            .iter()
            .map(|(kind, count)| ((*kind).to_string(), json!(count)))
            .collect();

        let output = json!({
            "counts": totals,
            "vehicles": vehicles,
            "problems": problems,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(counts: &[(&str, usize)], problems: usize) {
        let fields: Vec<String> = counts
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        println!("{} problems={problems}", fields.join(" "));
    }

    fn output_table(counts: &[(&str, usize)], rows: &[Row], problems: usize) {
        println!("Roster");
        println!("{}", "──────".dim());
        for (kind, count) in counts {
            println!("{kind:<10} {count}");
        }
        println!();

        if !rows.is_empty() {
            if is_narrow() {
                for row in rows {
                    println!("{}: {}/{}", row.plate, row.occupancy, row.capacity);
                }
            } else {
                println!(
                    "{:<9} {:<20} {:<10} {:>9}",
                    "Vehicle", "Model", "Driver", "Occupancy"
                );
                for row in rows {
                    let driver = row.driver.as_deref().unwrap_or("–");
                    let load = format!("{}/{}", row.occupancy, row.capacity);
                    let load = if row.occupancy >= usize::from(row.capacity) {
                        load.warning()
                    } else {
                        load
                    };
                    println!(
                        "{:<9} {:<20} {:<10} {:>9}",
                        row.plate, row.model, driver, load
                    );
                }
            }
            println!();
        }

        if problems == 0 {
            println!("Integrity problems: {} ✅", "0".success());
        } else {
            println!(
                "Integrity problems: {} ⚠️",
                problems.to_string().failure()
            );
            println!("{}", "Run 'roster validate' for details.".dim());
        }
    }
}

fn occupancy_rows(tables: &Tables) -> Vec<Row> {
    tables
        .vehicles()
        .map(|vehicle| Row {
            plate: vehicle.plate_number().to_string(),
            model: vehicle.model().to_string(),
            driver: national_id_of(tables, vehicle.driver_id()),
            occupancy: tables.occupancy(vehicle.id()),
            capacity: vehicle.capacity(),
        })
        .collect()
}
