use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::model::ALL_COLLECTIONS;

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/campus.sqlite3";
const FALLBACK_PREFIX: &str = "fallback/";
pub const BUNDLE_FORMAT_V1: &str = "campus-store-v1";

const DB_FILE: &str = "campus.sqlite3";
const FALLBACK_DIR: &str = "fallback";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub entry_count: usize,
}

/// Bundle both physical stores into one zip: the document store database
/// plus every fallback collection file, with sha256 checksums recorded in
/// the manifest. A workspace running fallback-only (no database yet)
/// still exports cleanly.
pub fn export_store_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    let fallback_dir = workspace_path.join(FALLBACK_DIR);

    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    if db_path.is_file() {
        let bytes = std::fs::read(&db_path)
            .with_context(|| format!("failed to read database {}", db_path.display()))?;
        entries.push((DB_ENTRY.to_string(), bytes));
    }
    for collection in ALL_COLLECTIONS {
        let path = fallback_dir.join(format!("{}.json", collection.name()));
        if !path.is_file() {
            continue;
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read fallback file {}", path.display()))?;
        entries.push((
            format!("{}{}.json", FALLBACK_PREFIX, collection.name()),
            bytes,
        ));
    }
    if entries.is_empty() {
        return Err(anyhow!(
            "nothing to export: workspace {} holds neither store",
            workspace_path.display()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let mut checksums = serde_json::Map::new();
    for (name, bytes) in &entries {
        checksums.insert(name.clone(), json!(sha256_hex(bytes)));
    }
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "checksums": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, bytes) in &entries {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {}", name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: entries.len() + 1,
    })
}

/// Restore a bundle into a workspace. Checksums are verified before any
/// file is replaced; each file lands via a temp-and-rename so a failed
/// import cannot leave a half-written store behind.
pub fn import_store_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;

    if !is_zip_file(in_path)? {
        return Err(anyhow!(
            "not a store bundle (zip expected): {}",
            in_path.display()
        ));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let checksums = manifest
        .get("checksums")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let mut restored = 0usize;
    for (entry_name, expected) in &checksums {
        let mut bytes = Vec::new();
        archive
            .by_name(entry_name)
            .with_context(|| format!("bundle missing entry {}", entry_name))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read entry {}", entry_name))?;

        let actual = sha256_hex(&bytes);
        if Some(actual.as_str()) != expected.as_str() {
            return Err(anyhow!("checksum mismatch for entry {}", entry_name));
        }

        let dst = if entry_name == DB_ENTRY {
            workspace_path.join(DB_FILE)
        } else if let Some(file_name) = entry_name.strip_prefix(FALLBACK_PREFIX) {
            if file_name.contains('/') || file_name.contains("..") {
                return Err(anyhow!("suspicious entry path: {}", entry_name));
            }
            workspace_path.join(FALLBACK_DIR).join(file_name)
        } else {
            return Err(anyhow!("unexpected entry in bundle: {}", entry_name));
        };

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let tmp_dst = dst.with_extension("importing");
        if tmp_dst.exists() {
            let _ = std::fs::remove_file(&tmp_dst);
        }
        std::fs::write(&tmp_dst, &bytes)
            .with_context(|| format!("failed to write {}", tmp_dst.display()))?;
        if dst.exists() {
            std::fs::remove_file(&dst)
                .with_context(|| format!("failed to remove existing {}", dst.display()))?;
        }
        std::fs::rename(&tmp_dst, &dst)
            .with_context(|| format!("failed to move imported file to {}", dst.display()))?;
        restored += 1;
    }

    if restored == 0 {
        return Err(anyhow!("bundle manifest lists no entries"));
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        entry_count: restored,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
