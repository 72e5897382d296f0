//! Per-record resolution outcomes
//!
//! Pure data. The CLI decides whether to print, log or serialize them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity-bearing field kinds a metadata key can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    UserId,
    GroupName,
    PiFullName,
    Surname,
}

impl FieldKind {
    /// Classify a normalized key. Unlisted keys carry no identity.
    pub fn classify(normalized_key: &str) -> Option<Self> {
        match normalized_key {
            "investigatorid" | "manageruserid" | "userid" | "username" => Some(Self::UserId),
            "fs_lab" | "group" | "groupname" | "system_group" | "system_groups" => {
                Some(Self::GroupName)
            }
            "investigatorname" | "pi" => Some(Self::PiFullName),
            "surname" | "lastname" => Some(Self::Surname),
            _ => None,
        }
    }
}

/// Fallback tiers, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A: identity fields of the record itself
    DirectFields,
    /// B: fixed groups for known path prefixes
    SpecialPath,
    /// C: lab names embedded in the archived path
    PathSearch,
}

/// What produced a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSource {
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldKind>,
    /// Raw record key (A) or special path prefix (B)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Normalized value that was looked up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Matched through the odd group name table
    #[serde(default)]
    pub via_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved {
        system_groups: Vec<String>,
        source: MatchSource,
    },
    /// Some field was a usable query but nothing matched.
    NoGroupFound,
    /// The record carried nothing to query with.
    NoUsableQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub archived_path: String,
    #[serde(flatten)]
    pub outcome: ResolutionOutcome,
}

impl ResolutionReport {
    pub fn new(archived_path: &str, outcome: ResolutionOutcome) -> Self {
        Self {
            archived_path: archived_path.to_string(),
            outcome,
        }
    }

    pub fn system_groups(&self) -> Option<&[String]> {
        match &self.outcome {
            ResolutionOutcome::Resolved { system_groups, .. } => Some(system_groups),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&MatchSource> {
        match &self.outcome {
            ResolutionOutcome::Resolved { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let path = &self.archived_path;
        match &self.outcome {
            ResolutionOutcome::Resolved {
                system_groups,
                source,
            } => match source.strategy {
                Strategy::DirectFields => write!(
                    f,
                    "For archived path {}, key {} and val {} yielded system_groups {:?}.",
                    path,
                    source.key.as_deref().unwrap_or(""),
                    source.value.as_deref().unwrap_or(""),
                    system_groups
                ),
                Strategy::SpecialPath => write!(
                    f,
                    "For special case archived path {}, found system_groups {:?}.",
                    path, system_groups
                ),
                Strategy::PathSearch => write!(
                    f,
                    "For path search of archived path {}, found system_groups {:?}.",
                    path, system_groups
                ),
            },
            ResolutionOutcome::NoGroupFound => write!(f, "No group found for {}.", path),
            ResolutionOutcome::NoUsableQuery => write!(f, "No query found for {}.", path),
        }
    }
}

/// Outcome tallies over a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub direct_fields: usize,
    pub special_path: usize,
    pub path_search: usize,
    pub no_group_found: usize,
    pub no_usable_query: usize,
    /// Records rejected before resolution (missing archived path)
    pub malformed: usize,
}

impl ReportSummary {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a ResolutionReport>,
    {
        let mut summary = Self::default();
        for report in reports {
            summary.add(report);
        }
        summary
    }

    pub fn add(&mut self, report: &ResolutionReport) {
        self.total += 1;
        match &report.outcome {
            ResolutionOutcome::Resolved { source, .. } => match source.strategy {
                Strategy::DirectFields => self.direct_fields += 1,
                Strategy::SpecialPath => self.special_path += 1,
                Strategy::PathSearch => self.path_search += 1,
            },
            ResolutionOutcome::NoGroupFound => self.no_group_found += 1,
            ResolutionOutcome::NoUsableQuery => self.no_usable_query += 1,
        }
    }

    pub fn add_malformed(&mut self) {
        self.total += 1;
        self.malformed += 1;
    }

    pub fn resolved(&self) -> usize {
        self.direct_fields + self.special_path + self.path_search
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(strategy: Strategy) -> ResolutionReport {
        ResolutionReport::new(
            "/archive/run1",
            ResolutionOutcome::Resolved {
                system_groups: vec!["doe-lab".to_string()],
                source: MatchSource {
                    strategy,
                    field: Some(FieldKind::UserId),
                    key: Some("userId".to_string()),
                    value: Some("jdoe".to_string()),
                    via_override: false,
                },
            },
        )
    }

    #[test]
    fn test_classify_keys() {
        assert_eq!(FieldKind::classify("manageruserid"), Some(FieldKind::UserId));
        assert_eq!(FieldKind::classify("fs_lab"), Some(FieldKind::GroupName));
        assert_eq!(FieldKind::classify("pi"), Some(FieldKind::PiFullName));
        assert_eq!(FieldKind::classify("lastname"), Some(FieldKind::Surname));
        assert_eq!(FieldKind::classify("fs-lab"), None);
        assert_eq!(FieldKind::classify("archivedpath"), None);
    }

    #[test]
    fn test_display_lines() {
        assert_eq!(
            resolved(Strategy::DirectFields).to_string(),
            "For archived path /archive/run1, key userId and val jdoe yielded system_groups [\"doe-lab\"]."
        );
        assert_eq!(
            resolved(Strategy::PathSearch).to_string(),
            "For path search of archived path /archive/run1, found system_groups [\"doe-lab\"]."
        );
        assert_eq!(
            ResolutionReport::new("/x", ResolutionOutcome::NoUsableQuery).to_string(),
            "No query found for /x."
        );
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(ResolutionReport::new(
            "/x",
            ResolutionOutcome::NoGroupFound,
        ))
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"archived_path": "/x", "outcome": "no_group_found"})
        );

        let value = serde_json::to_value(resolved(Strategy::SpecialPath)).unwrap();
        assert_eq!(value["outcome"], "resolved");
        assert_eq!(value["system_groups"][0], "doe-lab");
        assert_eq!(value["source"]["strategy"], "special_path");
    }

    #[test]
    fn test_summary_tallies() {
        let reports = vec![
            resolved(Strategy::DirectFields),
            resolved(Strategy::PathSearch),
            ResolutionReport::new("/a", ResolutionOutcome::NoGroupFound),
            ResolutionReport::new("/b", ResolutionOutcome::NoUsableQuery),
        ];
        let mut summary = ReportSummary::from_reports(&reports);
        summary.add_malformed();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.resolved(), 2);
        assert_eq!(summary.no_group_found, 1);
        assert_eq!(summary.no_usable_query, 1);
        assert_eq!(summary.malformed, 1);
    }
}
