//! Curated text tables feeding roster construction
//!
//! - special cases: `cost center name<TAB>group[,group...]`, one per line,
//!   `#` comments and blank lines allowed
//! - valid groups: every group name on the cluster, one per line

use std::io::{BufRead, Read};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::TableError;

/// Parse the special-case table. Any line without exactly two fields is fatal.
pub fn parse_special_cases<R: Read>(reader: R) -> Result<FxHashMap<String, String>, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut table = FxHashMap::default();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        let mut fields: Vec<&str> = record.iter().map(str::trim).collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }

        match fields.as_slice() {
            [] => continue,
            [cc_name, groups] => {
                if cc_name.is_empty() || groups.is_empty() {
                    return Err(TableError::EmptyField {
                        line,
                        content: record.iter().collect::<Vec<_>>().join("\t"),
                    });
                }
                table.insert(cc_name.to_string(), groups.to_string());
            }
            _ => {
                return Err(TableError::FieldCount {
                    line,
                    content: record.iter().collect::<Vec<_>>().join("\t"),
                })
            }
        }
    }

    tracing::debug!(entries = table.len(), "parsed special-case table");
    Ok(table)
}

/// Parse the cluster group listing, trimming whitespace and skipping blanks.
pub fn parse_valid_groups<R: BufRead>(reader: R) -> Result<FxHashSet<String>, TableError> {
    let mut groups = FxHashSet::default();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            groups.insert(line.to_string());
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_special_cases() {
        let text = "# cost center\tgroups\n\
                    Genome Technologies\tgt-core,gt-seq\n\
                    \n\
                    Single Cell Biology Lab\tscbio\t\n";
        let table = parse_special_cases(text.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table["Genome Technologies"], "gt-core,gt-seq");
        assert_eq!(table["Single Cell Biology Lab"], "scbio");
    }

    #[test]
    fn test_special_case_wrong_arity_is_fatal() {
        let text = "Smith Lab\tsmith-lab\nDoe Lab\n";
        let err = parse_special_cases(text.as_bytes()).unwrap_err();
        match err {
            TableError::FieldCount { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "Doe Lab");
            }
            other => panic!("unexpected error: {}", other),
        }

        let text = "Smith Lab\tsmith-lab\textra\n";
        assert!(matches!(
            parse_special_cases(text.as_bytes()),
            Err(TableError::FieldCount { .. })
        ));
    }

    #[test]
    fn test_parse_valid_groups() {
        let text = "doe-lab\n  smithlab \n\n gt-core\n";
        let groups = parse_valid_groups(text.as_bytes()).unwrap();

        assert_eq!(groups.len(), 3);
        assert!(groups.contains("smithlab"));
        assert!(groups.contains("gt-core"));
    }
}
