//! PI/lab roster
//!
//! Built once from the cost-center reference collection. Every identity
//! field is indexed by its normalized value, so all lookups are O(1).
//!
//! Entries that arrive without system groups have them derived from the
//! cost-center name: curated overrides first, then the `"<Surname> Lab"` →
//! `surname-lab` / `surnamelab` convention checked against the full listing
//! of groups on the cluster.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::ExceptionTables;
use crate::error::RosterError;
use crate::normalize::normalize_value;

/// One PI or lab from the cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub surname: String,
    pub userid: String,
    #[serde(default)]
    pub firstname: Option<String>,
    /// Cost center (billing unit) name, e.g. "Smith Lab"
    #[serde(default, alias = "cc_name")]
    pub cost_center: Option<String>,
    #[serde(
        default,
        alias = "system_group",
        deserialize_with = "deserialize_groups"
    )]
    pub system_groups: Vec<String>,
}

impl RosterEntry {
    pub fn new(surname: &str, userid: &str, firstname: Option<&str>, groups: &[&str]) -> Self {
        Self {
            surname: surname.to_string(),
            userid: userid.to_string(),
            firstname: firstname.map(str::to_string),
            cost_center: None,
            system_groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// The dump stores a single group string, snapshots store a list.
fn deserialize_groups<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(group)) => split_groups(&group),
        Some(OneOrMany::Many(groups)) => groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect(),
        None => Vec::new(),
    })
}

/// Split a comma-delimited group list, dropping blanks.
pub fn split_groups(groups: &str) -> Vec<String> {
    groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Derive the system groups of a cost center from its name.
///
/// Returns `None` when the name has no override, does not end in `Lab`, or
/// neither `surname-lab` nor `surnamelab` exists on the cluster.
pub fn map_cost_center_group(
    cc_name: &str,
    overrides: &FxHashMap<String, String>,
    valid_group_names: &FxHashSet<String>,
) -> Option<Vec<String>> {
    if let Some(groups) = overrides.get(cc_name) {
        let groups = split_groups(groups);
        return (!groups.is_empty()).then_some(groups);
    }

    if !cc_name.ends_with("Lab") {
        return None;
    }

    let hyphenated = cc_name.to_lowercase().replace(' ', "-");
    if valid_group_names.contains(&hyphenated) {
        return Some(vec![hyphenated]);
    }

    // some labs have no hyphen between the surname and "lab"
    let joined = hyphenated.replace('-', "");
    valid_group_names.contains(&joined).then(|| vec![joined])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterField {
    UserId,
    Surname,
    FullName,
    GroupName,
}

/// Two entries share a normalized key. The later entry won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousKey {
    pub field: RosterField,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterBuildStats {
    pub total: usize,
    pub indexed: usize,
    /// Entries whose groups came from the cost-center name
    pub derived: usize,
    pub skipped_no_groups: usize,
    /// Indexed entries carrying a group missing from the cluster listing
    pub unknown_groups: usize,
    pub ambiguous: Vec<AmbiguousKey>,
}

/// Read-only lookup structure shared by every resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    by_userid: FxHashMap<String, usize>,
    by_surname: FxHashMap<String, usize>,
    by_full_name: FxHashMap<(String, String), usize>,
    by_group: FxHashMap<String, usize>,
    odd_groupnames: Arc<FxHashMap<String, String>>,
}

/// Build the roster in one pass over the reference entries.
///
/// Duplicate user ids, surnames, full names or group names keep the last
/// entry seen and are reported in [`RosterBuildStats::ambiguous`].
pub fn build_roster<I>(
    entries: I,
    cost_center_overrides: &FxHashMap<String, String>,
    valid_group_names: &FxHashSet<String>,
    exceptions: &ExceptionTables,
) -> Result<(Roster, RosterBuildStats), RosterError>
where
    I: IntoIterator<Item = RosterEntry>,
{
    let mut roster = Roster {
        odd_groupnames: Arc::clone(&exceptions.odd_groupnames),
        ..Roster::default()
    };
    let mut stats = RosterBuildStats::default();

    for mut entry in entries {
        stats.total += 1;

        if entry.system_groups.is_empty() {
            if let Some(groups) = entry.cost_center.as_deref().and_then(|cc| {
                map_cost_center_group(cc, cost_center_overrides, valid_group_names)
            }) {
                entry.system_groups = groups;
                stats.derived += 1;
            }
        }

        if entry.system_groups.is_empty() {
            stats.skipped_no_groups += 1;
            tracing::warn!(
                surname = %entry.surname,
                userid = %entry.userid,
                cost_center = entry.cost_center.as_deref().unwrap_or(""),
                "no system group for roster entry, skipping"
            );
            continue;
        }

        if !valid_group_names.is_empty()
            && entry
                .system_groups
                .iter()
                .any(|g| !valid_group_names.contains(g))
        {
            stats.unknown_groups += 1;
            tracing::warn!(
                userid = %entry.userid,
                groups = ?entry.system_groups,
                "roster entry has a group not present on the cluster"
            );
        }

        roster.insert(entry, &mut stats);
    }

    if roster.is_empty() {
        return Err(RosterError::Empty {
            skipped: stats.skipped_no_groups,
        });
    }

    stats.indexed = roster.len();
    Ok((roster, stats))
}

impl Roster {
    fn insert(&mut self, entry: RosterEntry, stats: &mut RosterBuildStats) {
        let idx = self.entries.len();
        let userid = normalize_value(&entry.userid);
        let surname = normalize_value(&entry.surname);

        if !userid.is_empty() {
            note_duplicate(&mut self.by_userid, userid, idx, RosterField::UserId, stats);
        }
        if !surname.is_empty() {
            note_duplicate(
                &mut self.by_surname,
                surname.clone(),
                idx,
                RosterField::Surname,
                stats,
            );
            if let Some(first) = entry.firstname.as_deref().map(normalize_value) {
                if !first.is_empty() {
                    if self
                        .by_full_name
                        .insert((first.clone(), surname.clone()), idx)
                        .is_some()
                    {
                        record_ambiguous(
                            stats,
                            RosterField::FullName,
                            format!("{first} {surname}"),
                        );
                    }
                }
            }
        }
        for group in &entry.system_groups {
            note_duplicate(
                &mut self.by_group,
                normalize_value(group),
                idx,
                RosterField::GroupName,
                stats,
            );
        }

        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn groups_at(&self, idx: Option<&usize>) -> Option<&[String]> {
        idx.map(|&i| self.entries[i].system_groups.as_slice())
    }

    pub fn lookup_by_user_id(&self, userid: &str) -> Option<&[String]> {
        self.groups_at(self.by_userid.get(&normalize_value(userid)))
    }

    pub fn lookup_by_surname(&self, surname: &str) -> Option<&[String]> {
        self.groups_at(self.by_surname.get(&normalize_value(surname)))
    }

    /// Both the first name and the surname must match the same entry.
    pub fn lookup_by_full_name(&self, firstname: &str, surname: &str) -> Option<&[String]> {
        let key = (normalize_value(firstname), normalize_value(surname));
        self.groups_at(self.by_full_name.get(&key))
    }

    /// Odd group names are translated to their canonical group first.
    pub fn lookup_by_group_name(&self, name: &str) -> Option<&[String]> {
        let name = normalize_value(name);
        let key = match self.odd_groupnames.get(&name) {
            Some(canonical) => normalize_value(canonical),
            None => name,
        };
        self.groups_at(self.by_group.get(&key))
    }

    pub fn resolve_exception(&self, value: &str) -> Option<&str> {
        self.odd_groupnames
            .get(&normalize_value(value))
            .map(String::as_str)
    }
}

fn note_duplicate(
    index: &mut FxHashMap<String, usize>,
    key: String,
    idx: usize,
    field: RosterField,
    stats: &mut RosterBuildStats,
) {
    // an entry listing the same group twice is not ambiguous
    if let Some(previous) = index.insert(key.clone(), idx) {
        if previous != idx {
            record_ambiguous(stats, field, key);
        }
    }
}

fn record_ambiguous(stats: &mut RosterBuildStats, field: RosterField, key: String) {
    tracing::warn!(?field, %key, "duplicate roster key, last entry wins");
    stats.ambiguous.push(AmbiguousKey { field, key });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<RosterEntry> {
        vec![
            RosterEntry::new("Doe", "jdoe", Some("John"), &["doe-lab"]),
            RosterEntry::new("Smith", "asmith", Some("Ann"), &["smithlab", "smith-seq"]),
            RosterEntry::new("Lee", "lee_k", None, &["lee-lab"]),
        ]
    }

    fn exceptions() -> ExceptionTables {
        ExceptionTables::new(
            ["", "na"],
            [("Genome Tech Lab".to_string(), "smith-seq".to_string())],
        )
    }

    fn build(entries: Vec<RosterEntry>) -> (Roster, RosterBuildStats) {
        build_roster(
            entries,
            &FxHashMap::default(),
            &FxHashSet::default(),
            &exceptions(),
        )
        .unwrap()
    }

    #[test]
    fn test_lookups() {
        let (roster, stats) = build(sample_entries());

        assert_eq!(stats.total, 3);
        assert_eq!(stats.indexed, 3);
        assert!(stats.ambiguous.is_empty());

        assert_eq!(
            roster.lookup_by_user_id(" JDoe "),
            Some(&["doe-lab".to_string()][..])
        );
        assert_eq!(roster.lookup_by_surname("SMITH").map(|g| g.len()), Some(2));
        assert_eq!(
            roster.lookup_by_full_name("ann", "smith").map(|g| g[0].as_str()),
            Some("smithlab")
        );
        assert!(roster.lookup_by_full_name("john", "smith").is_none());
        assert!(roster.lookup_by_user_id("nobody").is_none());
    }

    #[test]
    fn test_userid_matches_normalized_query() {
        let (roster, _) = build(sample_entries());
        // "lee_k" is indexed the way record values are normalized
        assert!(roster.lookup_by_user_id("lee-k").is_some());
        assert!(roster.lookup_by_user_id("LEE_K").is_some());
    }

    #[test]
    fn test_group_name_lookup_with_override() {
        let (roster, _) = build(sample_entries());

        assert_eq!(
            roster.lookup_by_group_name("Smith-Seq").map(|g| g[0].as_str()),
            Some("smithlab")
        );
        assert_eq!(
            roster
                .lookup_by_group_name("genome tech lab")
                .map(|g| g.to_vec()),
            Some(vec!["smithlab".to_string(), "smith-seq".to_string()])
        );
        assert_eq!(roster.resolve_exception("Genome Tech Lab"), Some("smith-seq"));
        assert_eq!(roster.resolve_exception("smith-seq"), None);
        assert!(roster.lookup_by_group_name("unknown-lab").is_none());
    }

    #[test]
    fn test_duplicate_surname_last_wins() {
        let mut entries = sample_entries();
        entries.push(RosterEntry::new("Doe", "kdoe", Some("Kim"), &["kdoe-lab"]));
        let (roster, stats) = build(entries);

        assert_eq!(
            roster.lookup_by_surname("doe").map(|g| g[0].as_str()),
            Some("kdoe-lab")
        );
        // both full names stay distinct
        assert_eq!(
            roster.lookup_by_full_name("john", "doe").map(|g| g[0].as_str()),
            Some("doe-lab")
        );
        assert_eq!(
            stats.ambiguous,
            vec![AmbiguousKey {
                field: RosterField::Surname,
                key: "doe".to_string()
            }]
        );
    }

    #[test]
    fn test_shared_group_last_wins() {
        let mut entries = sample_entries();
        entries.push(RosterEntry::new("Roe", "kroe", Some("Kim"), &["doe-lab", "doe-lab"]));
        let (roster, stats) = build(entries);

        assert_eq!(
            roster.lookup_by_group_name("doe-lab").map(|g| g.to_vec()),
            Some(vec!["doe-lab".to_string(), "doe-lab".to_string()])
        );
        assert_eq!(roster.lookup_by_surname("roe").map(|g| g.len()), Some(2));
        assert_eq!(
            stats.ambiguous,
            vec![AmbiguousKey {
                field: RosterField::GroupName,
                key: "doe-lab".to_string()
            }]
        );
    }

    #[test]
    fn test_roster_shares_odd_group_names() {
        let tables = exceptions();
        let (roster, _) = build_roster(
            sample_entries(),
            &FxHashMap::default(),
            &FxHashSet::default(),
            &tables,
        )
        .unwrap();

        assert!(Arc::ptr_eq(&roster.odd_groupnames, &tables.odd_groupnames));
    }

    #[test]
    fn test_cost_center_group_mapping() {
        let valid: FxHashSet<String> = ["smith-lab", "doelab", "gt-core"]
            .iter()
            .map(|g| g.to_string())
            .collect();
        let mut overrides = FxHashMap::default();
        overrides.insert("Genome Technologies".to_string(), "gt-core, gt-seq".to_string());

        assert_eq!(
            map_cost_center_group("Smith Lab", &overrides, &valid),
            Some(vec!["smith-lab".to_string()])
        );
        assert_eq!(
            map_cost_center_group("Doe Lab", &overrides, &valid),
            Some(vec!["doelab".to_string()])
        );
        assert_eq!(
            map_cost_center_group("Genome Technologies", &overrides, &valid),
            Some(vec!["gt-core".to_string(), "gt-seq".to_string()])
        );
        assert_eq!(map_cost_center_group("Lee Lab", &overrides, &valid), None);
        assert_eq!(map_cost_center_group("Finance", &overrides, &valid), None);
    }

    #[test]
    fn test_build_derives_and_skips() {
        let valid: FxHashSet<String> = ["smith-lab"].iter().map(|g| g.to_string()).collect();
        let mut with_cc = RosterEntry::new("Smith", "asmith", None, &[]);
        with_cc.cost_center = Some("Smith Lab".to_string());
        let mut unmapped = RosterEntry::new("Lee", "klee", None, &[]);
        unmapped.cost_center = Some("Lee Lab".to_string());

        let (roster, stats) = build_roster(
            vec![with_cc, unmapped],
            &FxHashMap::default(),
            &valid,
            &ExceptionTables::default(),
        )
        .unwrap();

        assert_eq!(stats.derived, 1);
        assert_eq!(stats.skipped_no_groups, 1);
        assert_eq!(roster.len(), 1);
        assert!(roster.lookup_by_surname("lee").is_none());
        assert!(roster.entries().iter().all(|e| !e.system_groups.is_empty()));
    }

    #[test]
    fn test_empty_roster_is_fatal() {
        let err = build_roster(
            vec![RosterEntry::new("Lee", "klee", None, &[])],
            &FxHashMap::default(),
            &FxHashSet::default(),
            &ExceptionTables::default(),
        )
        .unwrap_err();
        assert_eq!(err, RosterError::Empty { skipped: 1 });
    }

    #[test]
    fn test_deserialize_dump_entry() {
        let single: RosterEntry = serde_json::from_str(
            r#"{"surname": "Doe", "userid": "jdoe", "cc_name": "Doe Lab", "system_group": "doe-lab"}"#,
        )
        .unwrap();
        assert_eq!(single.cost_center.as_deref(), Some("Doe Lab"));
        assert_eq!(single.system_groups, vec!["doe-lab".to_string()]);

        let missing: RosterEntry =
            serde_json::from_str(r#"{"surname": "Doe", "userid": "jdoe", "system_groups": null}"#)
                .unwrap();
        assert!(missing.system_groups.is_empty());
    }
}
