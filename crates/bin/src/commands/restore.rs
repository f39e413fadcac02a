//! Restore a snapshot file into the store.

use coffer::{Migrator, migration::BackupSnapshot};

use crate::backend::{open_storage, persist};
use crate::cli::RestoreArgs;
use crate::output::OutputFormat;

/// Run the `restore` command
pub async fn run(
    args: &RestoreArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(&args.input).await?;
    let snapshot: BackupSnapshot = serde_json::from_str(&text)?;

    let storage = open_storage(&args.backend_config).await?;
    let restored = Migrator::new(storage.clone())
        .restore_backup(&snapshot)
        .await?;
    persist(&args.backend_config, &storage).await?;

    match format {
        OutputFormat::Human => println!(
            "Restored {restored} records from snapshot taken {}",
            snapshot.created_at
        ),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "namespace": snapshot.namespace,
                "restored": restored,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
