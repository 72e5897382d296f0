//! Roster Cache Library
//!
//! Cost center dump (JSON) + curated tables → roster snapshot (MessagePack + LZ4)
//! Metadata records (JSON Lines) → resolution reports / annotated records

pub mod records;
pub mod roster_snapshot;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use sysgroup_core::RosterEntry;

pub use records::{parse_records, read_records, RecordLine, RecordReader, ResolutionPass};
pub use roster_snapshot::{
    build_roster_cache, build_roster_snapshot, load_roster_cache, RosterSnapshot,
};

/// Snapshot metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Schema version (e.g. "v1")
    pub schema_version: String,
    /// SHA256 checksum (hex)
    pub checksum: String,
    /// Creation time (RFC3339)
    pub created_at: String,
    /// MessagePack payload size (bytes)
    pub original_size: u64,
    /// Size after compression (bytes)
    pub compressed_size: u64,
    /// compressed / original
    pub compression_ratio: f64,
    /// Roster entries in the snapshot
    pub entries: u32,
}

/// Read the cost center dump: a JSON array of PI/lab entries.
pub fn load_cost_center_dump(path: &Path) -> Result<Vec<RosterEntry>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open cost center dump: {}", path.display()))?;
    let entries: Vec<RosterEntry> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse cost center dump: {}", path.display()))?;
    Ok(entries)
}

/// Read the curated `cost center<TAB>groups` overrides.
pub fn load_special_cases(path: &Path) -> Result<FxHashMap<String, String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open special cases file: {}", path.display()))?;
    sysgroup_core::parse_special_cases(BufReader::new(file))
        .with_context(|| format!("Invalid special cases file: {}", path.display()))
}

/// Read the listing of every group on the cluster.
pub fn load_valid_groups(path: &Path) -> Result<FxHashSet<String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open group listing: {}", path.display()))?;
    sysgroup_core::parse_valid_groups(BufReader::new(file))
        .with_context(|| format!("Invalid group listing: {}", path.display()))
}

/// Verify a snapshot file against its checksum
pub fn verify_cache(cache_file: &Path, expected_checksum: &str) -> Result<bool> {
    let bytes = fs::read(cache_file)
        .with_context(|| format!("Failed to read cache file: {}", cache_file.display()))?;

    Ok(sha256_hex(&bytes) == expected_checksum)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Human-readable byte size formatting
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}
