//! Workspace backup bundles.
//!
//! A bundle is a zip with a manifest, a consistent snapshot of the database
//! and a little workspace metadata. A bare SQLite file is also accepted on
//! import as a legacy backup.

use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db::{db_path, DB_FILE_NAME};
use crate::store::Store;

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/classbook.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
pub const BUNDLE_FORMAT_V1: &str = "classbook-workspace-v1";
pub const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

pub fn export_workspace_bundle(store: &Store, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    // VACUUM INTO refuses to overwrite, and a half-written snapshot must not linger.
    let snapshot = sibling(out_path, "snapshot");
    remove_if_exists(&snapshot)?;
    let result = write_bundle(store, &snapshot, out_path);
    let _ = std::fs::remove_file(&snapshot);
    let summary = result?;
    info!(
        out = %out_path.display(),
        sha256 = %summary.db_sha256,
        "exported workspace bundle"
    );
    Ok(summary)
}

fn write_bundle(store: &Store, snapshot: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    store
        .snapshot_to(snapshot)
        .context("failed to snapshot database")?;
    let db_sha256 = sha256_file(snapshot)?;

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(snapshot)
        .with_context(|| format!("failed to open snapshot {}", snapshot.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": store.workspace().map(|p| p.to_string_lossy().to_string()),
        "pending": store.pending_counts().context("failed to count pending rows")?,
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("failed to start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("failed to serialize workspace metadata")?
            .as_bytes(),
    )
    .context("failed to write workspace metadata entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        db_sha256,
    })
}

/// Replace the workspace database with the one in `in_path`.
///
/// The store for `workspace_path` must be closed first; the caller reopens it
/// afterwards. The live file is only replaced once the new one is fully
/// extracted and verified.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = db_path(workspace_path);
    let tmp_dst = workspace_path.join(format!("{DB_FILE_NAME}.importing"));
    remove_if_exists(&tmp_dst)?;

    let detected = match sniff(in_path)? {
        InputKind::Zip => {
            extract_bundle(in_path, &tmp_dst)?;
            BUNDLE_FORMAT_V1
        }
        InputKind::Sqlite => {
            std::fs::copy(in_path, &tmp_dst).with_context(|| {
                format!(
                    "failed to copy legacy sqlite backup from {} to {}",
                    in_path.to_string_lossy(),
                    tmp_dst.to_string_lossy()
                )
            })?;
            LEGACY_SQLITE_FORMAT
        }
        InputKind::Unknown => {
            return Err(anyhow!(
                "not a classbook bundle or sqlite file: {}",
                in_path.to_string_lossy()
            ))
        }
    };

    // WAL side files belong to the old database and must not be replayed onto the new one.
    for suffix in ["-wal", "-shm"] {
        remove_if_exists(&workspace_path.join(format!("{DB_FILE_NAME}{suffix}")))?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;
    info!(workspace = %workspace_path.display(), format = detected, "imported workspace backup");

    Ok(ImportSummary {
        bundle_format_detected: detected.to_string(),
    })
}

fn extract_bundle(in_path: &Path, tmp_dst: &Path) -> anyhow::Result<()> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
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
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut db_out = File::create(tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    {
        let mut db_entry = archive
            .by_name(DB_ENTRY)
            .context("bundle missing db/classbook.sqlite3")?;
        std::io::copy(&mut db_entry, &mut db_out).context("failed to extract database entry")?;
    }
    db_out
        .flush()
        .context("failed to flush extracted database")?;
    drop(db_out);

    if let Some(expected) = expected_sha {
        let actual = sha256_file(tmp_dst)?;
        if actual != expected {
            let _ = std::fs::remove_file(tmp_dst);
            return Err(anyhow!(
                "database checksum mismatch: manifest {} vs extracted {}",
                expected,
                actual
            ));
        }
    }
    Ok(())
}

enum InputKind {
    Zip,
    Sqlite,
    Unknown,
}

fn sniff(path: &Path) -> anyhow::Result<InputKind> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 16];
    let mut read = 0;
    while read < sig.len() {
        let n = f
            .read(&mut sig[read..])
            .context("failed to read file signature")?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if read >= 4 && sig[..4] == [0x50, 0x4B, 0x03, 0x04] {
        return Ok(InputKind::Zip);
    }
    if read == sig.len() && &sig == SQLITE_HEADER {
        return Ok(InputKind::Sqlite);
    }
    Ok(InputKind::Unknown)
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut f, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.to_string_lossy()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.to_string_lossy())),
    }
}
