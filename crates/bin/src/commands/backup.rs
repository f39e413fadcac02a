//! Write a namespace snapshot to a file.

use coffer::Migrator;

use crate::backend::open_storage;
use crate::cli::BackupArgs;
use crate::output::OutputFormat;

/// Run the `backup` command
pub async fn run(args: &BackupArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.backend_config).await?;
    let snapshot = Migrator::new(storage)
        .create_backup(args.namespace.as_deref())
        .await?;

    tokio::fs::write(&args.output, serde_json::to_string_pretty(&snapshot)?).await?;

    match format {
        OutputFormat::Human => println!(
            "Backed up {} records to {}",
            snapshot.len(),
            args.output.display()
        ),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "namespace": snapshot.namespace,
                "created_at": snapshot.created_at,
                "records": snapshot.len(),
                "output": args.output.display().to_string(),
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
