//! Background removal pipeline CLI
//!
//! Runs a single select, remove and export pass against an external engine
//! command.

#[cfg(feature = "cli")]
use bgremove_pipeline::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
