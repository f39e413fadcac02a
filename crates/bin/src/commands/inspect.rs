//! Show the envelope of one record without decrypting it.

use coffer::{
    Clock,
    backend::RecordStore,
    clock::millis_to_rfc3339,
    storage::{
        StorageOptions,
        record::{Payload, parse_envelope},
    },
};

use crate::backend::open_storage;
use crate::cli::InspectArgs;
use crate::output::OutputFormat;

/// Run the `inspect` command
pub async fn run(
    args: &InspectArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.backend_config).await?;
    let mut options = StorageOptions::new();
    options.namespace = args.namespace.clone();
    let physical_key = storage.physical_key(&args.key, &options)?;

    let Some(raw) = storage.store().get(&physical_key).await? else {
        return Err(format!("No record at '{physical_key}'").into());
    };
    let envelope = parse_envelope(&raw)?;
    let expired = envelope
        .expires_at
        .is_some_and(|deadline| storage.clock().now_millis() > deadline);

    let (plain_value, sealed_bytes) = match &envelope.payload {
        Payload::Plain { value } => (Some(value.as_str()), None),
        Payload::Cipher { ciphertext, .. } => (None, Some(ciphertext.len())),
    };

    match format {
        OutputFormat::Human => {
            println!("Key:         {physical_key}");
            println!("Kind:        {}", envelope.payload.kind());
            println!("Created:     {}", millis_to_rfc3339(envelope.created_at));
            match envelope.expires_at {
                Some(deadline) => println!(
                    "Expires:     {}{}",
                    millis_to_rfc3339(deadline),
                    if expired { " (expired)" } else { "" }
                ),
                None => println!("Expires:     never"),
            }
            if let Some(value) = plain_value {
                println!("Value:       {value}");
            }
            if let Some(len) = sealed_bytes {
                println!("Ciphertext:  {len} bytes");
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "key": physical_key,
                "kind": envelope.payload.kind(),
                "created_at": envelope.created_at,
                "expires_at": envelope.expires_at,
                "expired": expired,
                "value": plain_value,
                "ciphertext_bytes": sealed_bytes,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
