use thiserror::Error;

/// Fatal problems with the resolver configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid lab pattern '{pattern}': {source}")]
    LabPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Problems in the curated text tables that feed roster construction.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line} does not have two fields: '{content}'")]
    FieldCount { line: usize, content: String },

    #[error("Line {line} has an empty cost center or group: '{content}'")]
    EmptyField { line: usize, content: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Malformed record: missing string field '{key}'")]
    MalformedRecord { key: String },

    #[error("Malformed record: expected a JSON object")]
    NotAnObject,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Roster is empty: {skipped} entries had no usable system group")]
    Empty { skipped: usize },
}
