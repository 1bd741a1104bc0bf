use std::path::Path;

use school_roster::DirectoryStore;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Init {}

impl Init {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        DirectoryStore::init(root)?;

        println!(
            "{}",
            format!("✅ Initialized roster in {}", root.display()).success()
        );
        println!("  Created: config.toml");
        println!("  Created: children/ drivers/ vehicles/");
        println!();
        println!("Next steps:");
        println!("  roster vehicle add ABC123 --model \"Iveco Daily\" --capacity 20");
        println!("  roster child add 1111111 --first-name Ana --last-name Gil --age 8");

        Ok(())
    }
}
