//! Master reference data store
//!
//! The address and price master lists live as configuration documents
//! scoped by the deployment app id. A list that outgrows a practical
//! single-document size is split into fixed-size chunk documents beneath
//! a manifest recording the chunk count and source metadata; loading
//! reassembles the chunks in order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::domain::import::{AddressRecord, PriceRecord};

/// Records per chunk document.
pub const CHUNK_SIZE: usize = 500;

const ADDRESS_MANIFEST: &str = "address_master";
const PRICE_DOC: &str = "price_master";

/// Manifest payload for the chunked address master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressMasterManifest {
    pub chunk_count: usize,
    pub sheets: Vec<String>,
}

/// Number of chunk documents a list of `len` records needs.
pub fn chunk_count(len: usize) -> usize {
    len.div_ceil(CHUNK_SIZE)
}

fn chunk_doc_id(index: usize) -> String {
    format!("{ADDRESS_MANIFEST}_chunk_{index}")
}

async fn upsert_document(
    pool: &PgPool,
    app_id: &str,
    doc_id: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO config_documents (app_id, doc_id, payload, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (app_id, doc_id) DO UPDATE SET
            payload = EXCLUDED.payload,
            updated_at = NOW()
        "#,
    )
    .bind(app_id)
    .bind(doc_id)
    .bind(payload)
    .execute(pool)
    .await
    .context("Failed to write configuration document")?;
    Ok(())
}

async fn load_document(
    pool: &PgPool,
    app_id: &str,
    doc_id: &str,
) -> Result<Option<serde_json::Value>> {
    let payload: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT payload FROM config_documents WHERE app_id = $1 AND doc_id = $2")
            .bind(app_id)
            .bind(doc_id)
            .fetch_optional(pool)
            .await
            .context("Failed to read configuration document")?;
    Ok(payload.map(|(v,)| v))
}

/// Replace the stored address master with a freshly imported list.
///
/// Writes the chunk documents first and the manifest last, then clears
/// any stale chunks a previous, larger import left behind. There is no
/// atomicity across the writes; a failure partway leaves the previous
/// manifest pointing at intact chunks.
pub async fn save_address_master(
    pool: &PgPool,
    app_id: &str,
    records: &[AddressRecord],
    sheets: &[String],
) -> Result<AddressMasterManifest> {
    let manifest = AddressMasterManifest {
        chunk_count: chunk_count(records.len()),
        sheets: sheets.to_vec(),
    };

    for (index, chunk) in records.chunks(CHUNK_SIZE).enumerate() {
        upsert_document(
            pool,
            app_id,
            &chunk_doc_id(index),
            &json!({ "list": chunk }),
        )
        .await?;
    }
    upsert_document(
        pool,
        app_id,
        ADDRESS_MANIFEST,
        &serde_json::to_value(&manifest).context("Failed to serialize manifest")?,
    )
    .await?;

    sqlx::query(
        r#"
        DELETE FROM config_documents
        WHERE app_id = $1
          AND doc_id LIKE $2
          AND split_part(doc_id, '_chunk_', 2)::int >= $3
        "#,
    )
    .bind(app_id)
    .bind(format!("{ADDRESS_MANIFEST}_chunk_%"))
    .bind(manifest.chunk_count as i32)
    .execute(pool)
    .await
    .context("Failed to clear stale chunk documents")?;

    Ok(manifest)
}

/// Reassemble the address master from its chunk documents. A missing
/// manifest reads as an empty list, not an error.
pub async fn load_address_master(pool: &PgPool, app_id: &str) -> Result<Vec<AddressRecord>> {
    let manifest = match load_document(pool, app_id, ADDRESS_MANIFEST).await? {
        Some(value) => serde_json::from_value::<AddressMasterManifest>(value)
            .context("Malformed address master manifest")?,
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for index in 0..manifest.chunk_count {
        let Some(payload) = load_document(pool, app_id, &chunk_doc_id(index)).await? else {
            // A missing chunk means a previous import died partway;
            // surface what we have rather than failing the lookup.
            tracing::warn!(chunk = index, "Address master chunk missing");
            continue;
        };
        let list = payload.get("list").cloned().unwrap_or(json!([]));
        let chunk: Vec<AddressRecord> =
            serde_json::from_value(list).context("Malformed address master chunk")?;
        records.extend(chunk);
    }
    Ok(records)
}

/// Store the price master catalog as a single configuration document.
pub async fn save_price_master(
    pool: &PgPool,
    app_id: &str,
    records: &[PriceRecord],
) -> Result<()> {
    upsert_document(pool, app_id, PRICE_DOC, &json!({ "list": records })).await
}

/// Load the price master catalog; missing reads as empty.
pub async fn load_price_master(pool: &PgPool, app_id: &str) -> Result<Vec<PriceRecord>> {
    match load_document(pool, app_id, PRICE_DOC).await? {
        Some(payload) => {
            let list = payload.get("list").cloned().unwrap_or(json!([]));
            serde_json::from_value(list).context("Malformed price master document")
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(500), 1);
        assert_eq!(chunk_count(501), 2);
        assert_eq!(chunk_count(1499), 3);
    }

    #[test]
    fn chunk_doc_ids_are_stable() {
        assert_eq!(chunk_doc_id(0), "address_master_chunk_0");
        assert_eq!(chunk_doc_id(12), "address_master_chunk_12");
    }
}
