//! List records in a namespace.

use coffer::{backend::RecordStore, clock::millis_to_rfc3339, storage::record};

use crate::backend::open_storage;
use crate::cli::ListArgs;
use crate::output::{OutputFormat, print_table};

/// Run the `list` command
pub async fn run(args: &ListArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.backend_config).await?;
    let namespace = args.namespace.as_deref();
    let prefix = record::namespace_prefix(namespace.unwrap_or_default());

    let mut entries = Vec::new();
    for key in storage.keys(namespace).await? {
        let physical_key = format!("{prefix}{key}");
        let Some(raw) = storage.store().get(&physical_key).await? else {
            continue;
        };
        let (kind, expires_at) = match record::parse_envelope(&raw) {
            Ok(envelope) => (envelope.payload.kind(), envelope.expires_at),
            Err(_) => ("malformed", None),
        };
        entries.push((key, kind, expires_at));
    }

    match format {
        OutputFormat::Human => {
            if entries.is_empty() {
                println!("No records found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|(key, kind, expires_at)| {
                    vec![
                        key.clone(),
                        kind.to_string(),
                        expires_at.map(millis_to_rfc3339).unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["KEY", "KIND", "EXPIRES"], &rows);
        }
        OutputFormat::Json => {
            let value: Vec<_> = entries
                .iter()
                .map(|(key, kind, expires_at)| {
                    serde_json::json!({
                        "key": key,
                        "kind": kind,
                        "expires_at": expires_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
