// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// The seam between the PhalDB gRPC service and the attribute database
// proper. The database is opaque here: the service only converts path
// queries, hands over attribute maps, and receives snapshots.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use gneiss_hal::channel::ChannelWriter;
use gneiss_proto::api::phaldb::{update_value, PathQuery, PhalDb, UpdateValue};

use crate::errors::PhalDbError;

/// One step of a database path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbPathEntry {
    pub name: String,
    pub index: i32,
    pub indexed: bool,
    pub all: bool,
    pub terminal_group: bool,
}

pub type DbPath = Vec<DbPathEntry>;

/// A typed attribute value, one of the nine scalar kinds the wire accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

pub type AttributeValueMap = HashMap<DbPath, AttributeValue>;

#[async_trait]
pub trait AttributeDatabase: Send + Sync {
    /// Read a snapshot of the attributes matched by `paths`.
    async fn get(&self, paths: &[DbPath]) -> Result<PhalDb, PhalDbError>;

    /// Apply a batch of attribute writes.
    async fn set(&self, values: AttributeValueMap) -> Result<(), PhalDbError>;

    /// Push a snapshot of `paths` to `writer` every `polling_interval`
    /// until the writer's channel closes.
    async fn subscribe(
        &self,
        paths: &[DbPath],
        writer: ChannelWriter<PhalDb>,
        polling_interval: Duration,
    ) -> Result<(), PhalDbError>;
}

/// Convert a wire path query. An empty query is invalid.
pub fn to_db_path(query: &PathQuery) -> Result<DbPath, PhalDbError> {
    if query.entries.is_empty() {
        return Err(PhalDbError::InvalidArgument("no path".to_string()));
    }
    Ok(query
        .entries
        .iter()
        .map(|entry| DbPathEntry {
            name: entry.name.clone(),
            index: entry.index,
            indexed: entry.indexed,
            all: entry.all,
            terminal_group: entry.terminal_group,
        })
        .collect())
}

/// Canonical string form of a database path, used as the attribute key in
/// snapshots: `cards[0]/ports[*]/transceiver`.
pub fn db_path_to_string(path: &DbPath) -> String {
    let mut out = String::new();
    for (i, entry) in path.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&entry.name);
        if entry.all {
            out.push_str("[*]");
        } else if entry.indexed {
            out.push_str(&format!("[{}]", entry.index));
        }
    }
    out
}

/// Coerce a wire update value. An unset oneof is invalid.
pub fn to_attribute_value(value: &UpdateValue) -> Result<AttributeValue, PhalDbError> {
    match value.value.as_ref() {
        Some(update_value::Value::DoubleVal(v)) => Ok(AttributeValue::Double(*v)),
        Some(update_value::Value::FloatVal(v)) => Ok(AttributeValue::Float(*v)),
        Some(update_value::Value::Int32Val(v)) => Ok(AttributeValue::Int32(*v)),
        Some(update_value::Value::Int64Val(v)) => Ok(AttributeValue::Int64(*v)),
        Some(update_value::Value::Uint32Val(v)) => Ok(AttributeValue::UInt32(*v)),
        Some(update_value::Value::Uint64Val(v)) => Ok(AttributeValue::UInt64(*v)),
        Some(update_value::Value::BoolVal(v)) => Ok(AttributeValue::Bool(*v)),
        Some(update_value::Value::StringVal(v)) => {
            Ok(AttributeValue::String(v.clone()))
        }
        Some(update_value::Value::BytesVal(v)) => Ok(AttributeValue::Bytes(v.clone())),
        None => Err(PhalDbError::InvalidArgument("unknown value type".to_string())),
    }
}

pub fn to_update_value(value: &AttributeValue) -> UpdateValue {
    let value = match value {
        AttributeValue::Double(v) => update_value::Value::DoubleVal(*v),
        AttributeValue::Float(v) => update_value::Value::FloatVal(*v),
        AttributeValue::Int32(v) => update_value::Value::Int32Val(*v),
        AttributeValue::Int64(v) => update_value::Value::Int64Val(*v),
        AttributeValue::UInt32(v) => update_value::Value::Uint32Val(*v),
        AttributeValue::UInt64(v) => update_value::Value::Uint64Val(*v),
        AttributeValue::Bool(v) => update_value::Value::BoolVal(*v),
        AttributeValue::String(v) => update_value::Value::StringVal(v.clone()),
        AttributeValue::Bytes(v) => update_value::Value::BytesVal(v.clone()),
    };
    UpdateValue { value: Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gneiss_proto::api::phaldb::PathEntry;

    #[test]
    fn test_empty_path_query_is_invalid() {
        let err = to_db_path(&PathQuery::default()).unwrap_err();
        assert!(matches!(err, PhalDbError::InvalidArgument(_)));
    }

    #[test]
    fn test_path_conversion_and_rendering() {
        let query = PathQuery {
            entries: vec![
                PathEntry {
                    name: "cards".to_string(),
                    index: 0,
                    indexed: true,
                    ..Default::default()
                },
                PathEntry {
                    name: "ports".to_string(),
                    all: true,
                    ..Default::default()
                },
                PathEntry {
                    name: "transceiver".to_string(),
                    ..Default::default()
                },
            ],
        };
        let path = to_db_path(&query).unwrap();
        assert_eq!(db_path_to_string(&path), "cards[0]/ports[*]/transceiver");
    }

    #[test]
    fn test_value_coercion_round_trip() {
        for value in [
            AttributeValue::Double(1.5),
            AttributeValue::Int64(-9),
            AttributeValue::UInt64(9),
            AttributeValue::Bool(true),
            AttributeValue::String("x".to_string()),
            AttributeValue::Bytes(vec![1, 2]),
        ] {
            assert_eq!(to_attribute_value(&to_update_value(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_unset_value_is_invalid() {
        let err = to_attribute_value(&UpdateValue::default()).unwrap_err();
        assert!(matches!(err, PhalDbError::InvalidArgument(_)));
    }
}
