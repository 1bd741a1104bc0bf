use std::path::PathBuf;

use clap::Parser;
use school_roster::domain::Problem;
use serde_json::json;
use tracing::instrument;

use super::{OutputFormat, open, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Check every record for broken link invariants")]
pub struct Validate {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (roster, _) = open(root)?;

        let Err(error) = roster.audit() else {
            match self.output {
                OutputFormat::Json => println!("{}", json!({ "problems": [] })),
                OutputFormat::Table if !self.quiet => {
                    println!("{}", "✅ No integrity problems found".success());
                }
                OutputFormat::Table => {}
            }
            return Ok(());
        };

        match self.output {
            OutputFormat::Json => {
                let problems: Vec<_> = error.problems().iter().map(problem_json).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "problems": problems }))?
                );
            }
            OutputFormat::Table if !self.quiet => {
                println!(
                    "{}",
                    format!("Found {} integrity problem(s):", error.problems().len()).failure()
                );
                for problem in error.problems().iter() {
                    println!("  • {problem}");
                }
            }
            OutputFormat::Table => {}
        }

        Err(error.into())
    }
}

fn problem_json(problem: &Problem) -> serde_json::Value {
    match problem {
        Problem::OverCapacity {
            vehicle,
            occupancy,
            capacity,
        } => json!({
            "type": "over_capacity",
            "vehicle": vehicle.as_str(),
            "occupancy": occupancy,
            "capacity": capacity,
        }),
        Problem::DanglingLink { record, target } => json!({
            "type": "dangling_link",
            "record": record.to_string(),
            "target": target,
        }),
        Problem::OneSidedLink { record, partner } => json!({
            "type": "one_sided_link",
            "record": record.to_string(),
            "partner": partner.to_string(),
        }),
    }
}
