//! # sysgroup_core - System Group Resolution
//!
//! Matches archived metadata records to the cluster system groups used for
//! billing and access, using a roster of PIs/labs from the cost center.
//!
//! ## Pipeline
//! - [`normalize`]: canonical keys/values
//! - [`roster`]: O(1) lookups by user id, surname, full name, group name
//! - [`resolver`]: direct fields → special paths → path search
//! - [`report`]: per-record outcome (resolved / no group / no query)
//! - [`tables`]: curated cost-center overrides and the cluster group listing
//!
//! ```rust
//! use sysgroup_core::{build_roster, GroupResolver, MetadataRecord, ResolverConfig, RosterEntry};
//! use rustc_hash::{FxHashMap, FxHashSet};
//!
//! let config = ResolverConfig::default();
//! let entries = vec![RosterEntry::new("Doe", "jdoe", Some("John"), &["doe-lab"])];
//! let (roster, _stats) = build_roster(
//!     entries,
//!     &FxHashMap::default(),
//!     &FxHashSet::default(),
//!     &config.exceptions,
//! )
//! .unwrap();
//!
//! let resolver = GroupResolver::new(&roster, &config);
//! let record = MetadataRecord::from_pairs("/archive/run1", [("userId", "jdoe")]);
//! let report = resolver.resolve(&record);
//! assert_eq!(report.system_groups(), Some(&["doe-lab".to_string()][..]));
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod record;
pub mod report;
pub mod resolver;
pub mod roster;
pub mod tables;

pub use config::{ExceptionTables, ResolverConfig, ResolverConfigFile, SpecialPath};
pub use error::{ConfigError, RecordError, RosterError, TableError};
pub use normalize::{normalize, normalize_key, normalize_value};
pub use record::MetadataRecord;
pub use report::{
    FieldKind, MatchSource, ReportSummary, ResolutionOutcome, ResolutionReport, Strategy,
};
pub use resolver::GroupResolver;
pub use roster::{
    build_roster, map_cost_center_group, Roster, RosterBuildStats, RosterEntry,
};
pub use tables::{parse_special_cases, parse_valid_groups};
