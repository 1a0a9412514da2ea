mod cli;
mod config;
mod driver;
mod interrupt;
mod logger;
mod run_id;
mod services;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    match cli::run() {
        Ok(exit_code) => {
            info!(exit_code, "dojo finished");
            std::process::exit(exit_code)
        }
        Err(err) => {
            error!(error = ?err, "dojo failed");
            Err(err)
        }
    }
}
