//! Sweep expired records.

use crate::backend::{backend_label, open_storage, persist};
use crate::cli::PurgeExpiredArgs;
use crate::output::OutputFormat;

/// Run the `purge-expired` command
pub async fn run(
    args: &PurgeExpiredArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.backend_config).await?;
    let removed = storage.purge_expired(args.namespace.as_deref()).await?;
    persist(&args.backend_config, &storage).await?;

    match format {
        OutputFormat::Human => println!(
            "Removed {removed} expired records ({})",
            backend_label(&args.backend_config)
        ),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "removed": removed }));
        }
    }

    Ok(())
}
