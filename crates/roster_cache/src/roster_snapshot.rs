//! Roster Snapshot - Cost Center Dump → Binary Cache Pipeline
//!
//! Dump JSON → Vec<RosterEntry> (groups mapped) → MessagePack → LZ4
//!
//! The snapshot stores entries with their system groups already mapped, so
//! resolution passes only need the snapshot and the resolver config.

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use sysgroup_core::{build_roster, ExceptionTables, Roster, RosterBuildStats, RosterEntry};

use crate::{human_bytes, load_cost_center_dump, load_special_cases, load_valid_groups};

/// Serialized roster, sorted by surname
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub entries: Vec<RosterEntry>,
    pub count: u32,
    pub schema_version: String,
    /// Stats from the build that produced this snapshot
    pub stats: RosterBuildStats,
}

impl RosterSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index the snapshot for a resolution pass.
    ///
    /// Groups are already mapped, so no overrides or group listing are needed.
    pub fn to_roster(&self, exceptions: &ExceptionTables) -> Result<(Roster, RosterBuildStats)> {
        build_roster(
            self.entries.iter().cloned(),
            &FxHashMap::default(),
            &FxHashSet::default(),
            exceptions,
        )
        .context("Roster snapshot has no usable entries")
    }
}

/// Map system groups onto cost center entries and keep the ones that got any.
pub fn build_roster_snapshot(
    mut entries: Vec<RosterEntry>,
    special_cases: &FxHashMap<String, String>,
    valid_groups: &FxHashSet<String>,
    schema_version: &str,
) -> Result<RosterSnapshot> {
    entries.sort_by(|a, b| a.surname.cmp(&b.surname));

    let (roster, stats) = build_roster(
        entries,
        special_cases,
        valid_groups,
        &ExceptionTables::default(),
    )
    .context("No cost center entry could be mapped to a system group")?;

    Ok(RosterSnapshot {
        entries: roster.entries().to_vec(),
        count: roster.len() as u32,
        schema_version: schema_version.to_string(),
        stats,
    })
}

/// Build binary roster snapshot from the cost center dump
///
/// Pipeline: JSON dump → RosterSnapshot → MessagePack → LZ4 → Binary file
///
/// # Arguments
///
/// * `dump_path` - Cost center dump (JSON array)
/// * `special_cases_path` - Optional `cost center<TAB>groups` overrides
/// * `valid_groups_path` - Optional listing of all cluster groups
/// * `output_msgpack_lz4` - Output binary file
/// * `schema_version` - Schema version (e.g., "v1")
///
/// # Returns
///
/// Cache metadata and the roster build stats
pub fn build_roster_cache(
    dump_path: &Path,
    special_cases_path: Option<&Path>,
    valid_groups_path: Option<&Path>,
    output_msgpack_lz4: &Path,
    schema_version: &str,
) -> Result<(crate::CacheMetadata, RosterBuildStats)> {
    // 1. Read inputs
    let entries = load_cost_center_dump(dump_path)?;
    let special_cases = match special_cases_path {
        Some(path) => load_special_cases(path)?,
        None => FxHashMap::default(),
    };
    let valid_groups = match valid_groups_path {
        Some(path) => load_valid_groups(path)?,
        None => FxHashSet::default(),
    };
    tracing::info!(
        entries = entries.len(),
        special_cases = special_cases.len(),
        valid_groups = valid_groups.len(),
        "loaded cost center inputs"
    );

    // 2. Map groups
    let snapshot = build_roster_snapshot(entries, &special_cases, &valid_groups, schema_version)?;
    let stats = snapshot.stats.clone();

    // 3. Serialize, compress, write
    let metadata = write_roster_cache(&snapshot, output_msgpack_lz4)?;
    Ok((metadata, stats))
}

/// Write a snapshot as size-prepended LZ4 over named MessagePack.
pub fn write_roster_cache(
    snapshot: &RosterSnapshot,
    output_msgpack_lz4: &Path,
) -> Result<crate::CacheMetadata> {
    let msgpack_bytes = rmp_serde::to_vec_named(snapshot)
        .context("Failed to serialize RosterSnapshot to MessagePack")?;
    let original_size = msgpack_bytes.len() as u64;

    let compressed = lz4_flex::compress_prepend_size(&msgpack_bytes);
    let compressed_size = compressed.len() as u64;
    let checksum = crate::sha256_hex(&compressed);

    if let Some(parent) = output_msgpack_lz4.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    fs::write(output_msgpack_lz4, &compressed).with_context(|| {
        format!(
            "Failed to write output file: {}",
            output_msgpack_lz4.display()
        )
    })?;

    let compression_ratio = compressed_size as f64 / original_size as f64;
    tracing::info!(
        entries = snapshot.count,
        original = %human_bytes(original_size),
        compressed = %human_bytes(compressed_size),
        "roster snapshot written"
    );

    Ok(crate::CacheMetadata {
        schema_version: snapshot.schema_version.clone(),
        checksum,
        created_at: chrono::Utc::now().to_rfc3339(),
        original_size,
        compressed_size,
        compression_ratio,
        entries: snapshot.count,
    })
}

/// Load binary snapshot
///
/// Pipeline: Binary file → LZ4 decompress → MessagePack deserialize → RosterSnapshot
pub fn load_roster_cache(cache_file: &Path) -> Result<RosterSnapshot> {
    let compressed = fs::read(cache_file)
        .with_context(|| format!("Failed to read roster snapshot: {}", cache_file.display()))?;

    let msgpack_bytes =
        lz4_flex::decompress_size_prepended(&compressed).context("Failed to decompress LZ4")?;

    let snapshot: RosterSnapshot = rmp_serde::from_slice(&msgpack_bytes)
        .context("Failed to deserialize RosterSnapshot from MessagePack")?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify_cache;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn dump_entry(cc_name: &str, surname: &str, userid: &str) -> RosterEntry {
        let mut entry = RosterEntry::new(surname, userid, None, &[]);
        entry.cost_center = Some(cc_name.to_string());
        entry
    }

    #[test]
    fn test_build_snapshot_maps_and_sorts() -> Result<()> {
        let valid: FxHashSet<String> = ["smith-lab", "doelab"]
            .iter()
            .map(|g| g.to_string())
            .collect();
        let mut special = FxHashMap::default();
        special.insert("Genome Technologies".to_string(), "gt-core".to_string());

        let entries = vec![
            dump_entry("Smith Lab", "Smith", "asmith"),
            dump_entry("Genome Technologies", "Core", "gtcore"),
            dump_entry("Doe Lab", "Doe", "jdoe"),
            dump_entry("Finance", "Penny", "mpenny"),
        ];

        let snapshot = build_roster_snapshot(entries, &special, &valid, "v1")?;

        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.stats.derived, 3);
        assert_eq!(snapshot.stats.skipped_no_groups, 1);
        let surnames: Vec<&str> = snapshot.entries.iter().map(|e| e.surname.as_str()).collect();
        assert_eq!(surnames, vec!["Core", "Doe", "Smith"]);
        assert_eq!(snapshot.entries[1].system_groups, vec!["doelab".to_string()]);
        Ok(())
    }

    #[test]
    fn test_build_write_verify_load() -> Result<()> {
        let mut dump = NamedTempFile::new()?;
        dump.write_all(
            br#"[
                {"cc_name": "Doe Lab", "surname": "Doe", "firstname": "John", "userid": "jdoe"},
                {"cc_name": "Smith Lab", "surname": "Smith", "userid": "asmith"}
            ]"#,
        )?;
        let mut groups = NamedTempFile::new()?;
        groups.write_all(b"doe-lab\nsmithlab\n")?;

        let dir = TempDir::new()?;
        let out = dir.path().join("nested/roster.v1.msgpack.lz4");

        let (metadata, stats) =
            build_roster_cache(dump.path(), None, Some(groups.path()), &out, "v1")?;

        assert_eq!(metadata.entries, 2);
        assert_eq!(stats.indexed, 2);
        assert!(verify_cache(&out, &metadata.checksum)?);
        assert!(!verify_cache(&out, "0000")?);

        let snapshot = load_roster_cache(&out)?;
        assert_eq!(snapshot.schema_version, "v1");
        assert_eq!(snapshot.len(), 2);

        let (roster, _) = snapshot.to_roster(&ExceptionTables::default())?;
        assert_eq!(
            roster.lookup_by_full_name("john", "doe").map(|g| g.to_vec()),
            Some(vec!["doe-lab".to_string()])
        );
        assert_eq!(
            roster.lookup_by_user_id("asmith").map(|g| g.to_vec()),
            Some(vec!["smithlab".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_unmappable_dump_is_fatal() -> Result<()> {
        let entries = vec![dump_entry("Finance", "Penny", "mpenny")];
        let result = build_roster_snapshot(
            entries,
            &FxHashMap::default(),
            &FxHashSet::default(),
            "v1",
        );
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_load_corrupt_cache_fails() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"not a snapshot")?;
        assert!(load_roster_cache(file.path()).is_err());
        Ok(())
    }
}
