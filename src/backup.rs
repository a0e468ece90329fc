use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store::Store;

const MANIFEST_ENTRY: &str = "manifest.json";
const SNAPSHOT_ENTRY: &str = "store/snapshot.json";
pub const BUNDLE_FORMAT: &str = "schoold-store-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_id: String,
    pub key_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_id: Option<String>,
    pub key_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes every stored key, still wrapped in its envelope, to a zip bundle.
pub fn export_store_bundle(store: &Store, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let snapshot = store.snapshot()?;
    let snapshot_bytes =
        serde_json::to_vec_pretty(&snapshot).context("failed to serialize store snapshot")?;
    let sha256 = sha256_hex(&snapshot_bytes);
    let bundle_id = Uuid::new_v4().to_string();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "bundleId": bundle_id,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "keyCount": snapshot.len(),
        "sha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SNAPSHOT_ENTRY, opts)
        .context("failed to start snapshot entry")?;
    zip.write_all(&snapshot_bytes)
        .context("failed to write snapshot entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_id,
        key_count: snapshot.len(),
        sha256,
    })
}

/// Reads and verifies a bundle. Nothing in the store changes until both the
/// format and the checksum check out.
pub fn read_store_bundle(
    in_path: &Path,
) -> anyhow::Result<(BTreeMap<String, Value>, ImportSummary)> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut snapshot_bytes = Vec::new();
    archive
        .by_name(SNAPSHOT_ENTRY)
        .context("bundle missing store/snapshot.json")?
        .read_to_end(&mut snapshot_bytes)
        .context("failed to read store snapshot")?;
    let expected = manifest.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
    let actual = sha256_hex(&snapshot_bytes);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(anyhow!(
            "snapshot checksum mismatch: manifest {}, bundle {}",
            expected,
            actual
        ));
    }
    let snapshot: BTreeMap<String, Value> =
        serde_json::from_slice(&snapshot_bytes).context("store snapshot is invalid JSON")?;

    let summary = ImportSummary {
        bundle_id: manifest
            .get("bundleId")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        key_count: snapshot.len(),
    };
    Ok((snapshot, summary))
}

pub fn import_store_bundle(store: &mut Store, in_path: &Path) -> anyhow::Result<ImportSummary> {
    let (snapshot, summary) = read_store_bundle(in_path)?;
    store.restore(&snapshot)?;
    Ok(summary)
}
