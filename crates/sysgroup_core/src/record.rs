//! Archived metadata records
//!
//! A record is a JSON object of heterogeneous key/value pairs plus the
//! mandatory provenance path. Field order is the order of the source
//! document and decides which identity field wins when several match.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::RecordError;

/// Field added to a record once its groups are known.
pub const SYSTEM_GROUPS_FIELD: &str = "system_groups";

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    archived_path: String,
    fields: Map<String, Value>,
}

impl MetadataRecord {
    /// Wrap a parsed document. `index_key` names the provenance field,
    /// usually `archivedPath`.
    pub fn from_json(value: Value, index_key: &str) -> Result<Self, RecordError> {
        Self::try_from_json(value, index_key).map_err(|(error, _)| error)
    }

    /// Same as [`from_json`](Self::from_json), but hands the document back
    /// when it cannot be a record.
    pub fn try_from_json(value: Value, index_key: &str) -> Result<Self, (RecordError, Value)> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => return Err((RecordError::NotAnObject, other)),
        };

        match fields.get(index_key).and_then(Value::as_str).map(str::to_string) {
            Some(archived_path) => Ok(Self {
                archived_path,
                fields,
            }),
            None => Err((
                RecordError::MalformedRecord {
                    key: index_key.to_string(),
                },
                Value::Object(fields),
            )),
        }
    }

    /// Build a record from string pairs, in the given order.
    pub fn from_pairs<'a, I>(archived_path: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        Self {
            archived_path: archived_path.to_string(),
            fields,
        }
    }

    pub fn archived_path(&self) -> &str {
        &self.archived_path
    }

    /// Fields in document order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The source document as read.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// The source document with `system_groups` set.
    pub fn annotated(&self, system_groups: &[String]) -> Value {
        let mut fields = self.fields.clone();
        fields.insert(
            SYSTEM_GROUPS_FIELD.to_string(),
            Value::Array(system_groups.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(fields)
    }
}

/// Text of a scalar field. Arrays and objects carry no usable identity.
pub fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null => Some(Cow::Borrowed("")),
        Value::Array(_) | Value::Object(_) => None,
    }
}
