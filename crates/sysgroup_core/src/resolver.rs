//! Group resolution cascade
//!
//! Each record is run through an ordered list of strategies; the first one
//! that yields groups wins:
//!
//! - **A / DirectFields**: scan identity keys (`userId`, `pi`, `fs_lab`, ...)
//!   in document order
//! - **B / SpecialPath**: fixed groups for configured path prefixes
//! - **C / PathSearch**: find `...Lab` directory names in the archived path
//!   and treat the text before `lab` as a PI name or lab name
//!
//! Nothing here mutates the roster or config, so one resolver can be shared
//! across threads.

use rayon::prelude::*;

use crate::config::ResolverConfig;
use crate::normalize::{normalize_key, normalize_value};
use crate::record::{scalar_text, MetadataRecord};
use crate::report::{FieldKind, MatchSource, ResolutionOutcome, ResolutionReport, Strategy};
use crate::roster::Roster;

/// Evaluation order of the cascade.
pub const STRATEGIES: [Strategy; 3] = [
    Strategy::DirectFields,
    Strategy::SpecialPath,
    Strategy::PathSearch,
];

/// Batches smaller than this are resolved sequentially.
const PARALLEL_THRESHOLD: usize = 64;

/// Groups found by a single lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldMatch {
    groups: Vec<String>,
    via_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Found {
    groups: Vec<String>,
    source: MatchSource,
}

/// Per-record bookkeeping carried across strategies.
#[derive(Debug, Default)]
struct ScanState {
    usable_query: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupResolver<'a> {
    roster: &'a Roster,
    config: &'a ResolverConfig,
}

impl<'a> GroupResolver<'a> {
    pub fn new(roster: &'a Roster, config: &'a ResolverConfig) -> Self {
        Self { roster, config }
    }

    pub fn resolve(&self, record: &MetadataRecord) -> ResolutionReport {
        let mut state = ScanState::default();

        for strategy in STRATEGIES {
            let found = match strategy {
                Strategy::DirectFields => self.scan_fields(record, &mut state),
                Strategy::SpecialPath => self.match_special_path(record.archived_path()),
                Strategy::PathSearch => self.search_archived_path(record.archived_path()),
            };

            if let Some(found) = found {
                tracing::debug!(
                    path = record.archived_path(),
                    ?strategy,
                    groups = ?found.groups,
                    "resolved"
                );
                return ResolutionReport::new(
                    record.archived_path(),
                    ResolutionOutcome::Resolved {
                        system_groups: found.groups,
                        source: found.source,
                    },
                );
            }
        }

        let outcome = if state.usable_query {
            ResolutionOutcome::NoGroupFound
        } else {
            ResolutionOutcome::NoUsableQuery
        };
        tracing::debug!(path = record.archived_path(), ?outcome, "unresolved");
        ResolutionReport::new(record.archived_path(), outcome)
    }

    /// Reports come back in input order.
    pub fn resolve_all(&self, records: &[MetadataRecord]) -> Vec<ResolutionReport> {
        records.iter().map(|r| self.resolve(r)).collect()
    }

    /// Same as [`resolve_all`](Self::resolve_all), sharded across the rayon pool.
    pub fn resolve_all_parallel(&self, records: &[MetadataRecord]) -> Vec<ResolutionReport> {
        if records.len() < PARALLEL_THRESHOLD {
            return self.resolve_all(records);
        }
        records.par_iter().map(|r| self.resolve(r)).collect()
    }

    // ------------------------------------------------------------------
    // Strategy A
    // ------------------------------------------------------------------

    fn scan_fields(&self, record: &MetadataRecord, state: &mut ScanState) -> Option<Found> {
        let exceptions = &self.config.exceptions;

        for (key, value) in record.fields() {
            let Some(kind) = FieldKind::classify(&normalize_key(key)) else {
                continue;
            };
            let Some(text) = scalar_text(value) else {
                continue;
            };
            let value = normalize_value(&text);
            if exceptions.is_ignored(&value) {
                continue;
            }
            state.usable_query = true;

            let Some(found) = self.lookup_field(kind, &value) else {
                continue;
            };
            if !self.is_usable(&found) {
                continue;
            }

            return Some(Found {
                groups: found.groups,
                source: MatchSource {
                    strategy: Strategy::DirectFields,
                    field: Some(kind),
                    key: Some(key.to_string()),
                    value: Some(value),
                    via_override: found.via_override,
                },
            });
        }

        None
    }

    /// Dispatch one normalized value by field kind.
    fn lookup_field(&self, kind: FieldKind, value: &str) -> Option<FieldMatch> {
        let plain = |groups: &[String]| FieldMatch {
            groups: groups.to_vec(),
            via_override: false,
        };

        match kind {
            FieldKind::UserId => self.roster.lookup_by_user_id(value).map(plain),
            FieldKind::Surname => self.roster.lookup_by_surname(value).map(plain),
            FieldKind::GroupName => self
                .override_match(value)
                .or_else(|| self.roster.lookup_by_group_name(value).map(plain)),
            FieldKind::PiFullName => self.override_match(value).or_else(|| {
                // only "<first> <last>"; values like "GT-test" never match
                let mut names = value.split(' ');
                match (names.next(), names.next(), names.next()) {
                    (Some(first), Some(last), None) => {
                        self.roster.lookup_by_full_name(first, last).map(plain)
                    }
                    _ => None,
                }
            }),
        }
    }

    /// Odd group names map straight to a canonical group, expanded to the
    /// owning entry's groups when the roster knows it.
    fn override_match(&self, value: &str) -> Option<FieldMatch> {
        let canonical = self.roster.resolve_exception(value)?;
        let groups = self
            .roster
            .lookup_by_group_name(canonical)
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| vec![canonical.to_string()]);
        Some(FieldMatch {
            groups,
            via_override: true,
        })
    }

    /// A result led by an ignored group is no match. Override hits count
    /// even when the canonical group is on the ignore list.
    fn is_usable(&self, found: &FieldMatch) -> bool {
        found.via_override
            || found
                .groups
                .first()
                .is_some_and(|g| !self.config.exceptions.is_ignored(&normalize_value(g)))
    }

    // ------------------------------------------------------------------
    // Strategy B
    // ------------------------------------------------------------------

    fn match_special_path(&self, archived_path: &str) -> Option<Found> {
        let rule = self
            .config
            .special_paths
            .iter()
            .find(|rule| archived_path.starts_with(&rule.prefix))?;

        Some(Found {
            groups: self.config.special_path_groups(rule),
            source: MatchSource {
                strategy: Strategy::SpecialPath,
                field: None,
                key: Some(rule.prefix.clone()),
                value: None,
                via_override: false,
            },
        })
    }

    // ------------------------------------------------------------------
    // Strategy C
    // ------------------------------------------------------------------

    fn search_archived_path(&self, archived_path: &str) -> Option<Found> {
        for segment in archived_path.split('/') {
            let Some(lab) = self.config.lab_pattern.find(segment) else {
                continue;
            };
            let stem = segment[..lab.start()].trim_matches(is_name_separator);
            if stem.is_empty() {
                continue;
            }

            for (kind, value) in lab_stem_candidates(stem) {
                let value = normalize_value(&value);
                let Some(found) = self.lookup_field(kind, &value) else {
                    continue;
                };
                if !self.is_usable(&found) {
                    continue;
                }
                return Some(Found {
                    groups: found.groups,
                    source: MatchSource {
                        strategy: Strategy::PathSearch,
                        field: Some(kind),
                        key: Some(segment.to_string()),
                        value: Some(value),
                        via_override: found.via_override,
                    },
                });
            }
        }

        None
    }
}

fn is_name_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.' | ' ')
}

/// Lookups to try for the text preceding `lab` in a path segment, in order.
///
/// A stem holding a first and last name is tried as a full name, then as a
/// single surname, then by its last name alone. Any other stem is one
/// surname. The `-lab` group names come last.
fn lab_stem_candidates(stem: &str) -> Vec<(FieldKind, String)> {
    let mut candidates = Vec::with_capacity(5);

    match split_full_name(stem) {
        Some((first, last)) => {
            candidates.push((FieldKind::PiFullName, format!("{first} {last}")));
            candidates.push((FieldKind::Surname, stem.to_string()));
            candidates.push((FieldKind::Surname, last.to_string()));
            candidates.push((FieldKind::GroupName, format!("{last}-lab")));
        }
        None => candidates.push((FieldKind::Surname, stem.to_string())),
    }
    candidates.push((FieldKind::GroupName, format!("{stem}-lab")));
    candidates
}

/// Exactly two capitals mark first and last name (`JohnDoe`, `John_Doe`).
/// Otherwise only leading initials before a capitalized surname (`JSDoe`)
/// are split.
fn split_full_name(stem: &str) -> Option<(&str, &str)> {
    let capitals: Vec<usize> = stem
        .char_indices()
        .filter(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, _)| i)
        .collect();

    match capitals.as_slice() {
        [_, second] => Some((
            stem[..*second].trim_matches(is_name_separator),
            &stem[*second..],
        )),
        _ => split_initials(stem),
    }
}

fn split_initials(stem: &str) -> Option<(&str, &str)> {
    let run = stem.find(|c: char| !c.is_ascii_uppercase())?;
    let tail = &stem[run..];
    if run < 3 || !tail.chars().all(|c| c.is_ascii_lowercase()) {
        return None;
    }
    Some(stem.split_at(run - 1))
}
