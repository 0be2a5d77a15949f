use std::fs::File;

use anyhow::{Context, Result};
use money_transfer::bin_utils::{Service, ServiceError};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|line, err| match err {
            ServiceError::RequestErr(err) => eprintln!("Error at line {line}: {err}"),
            // business failures don't stop the batch
            other => eprintln!("Request at line {line} failed: {other}"),
        }),
    };
    service.run()
}
