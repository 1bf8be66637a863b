// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// In-memory attribute database backing the local PhalDB service until a
// real platform database is wired in. Attributes are stored flat, keyed by
// their rendered path; subscriptions are served by per-subscriber polling
// tasks that stop when their channel closes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use gneiss_hal::channel::ChannelWriter;
use gneiss_proto::api::phaldb::{Attribute, PhalDb};

use crate::adapter::{
    db_path_to_string, to_update_value, AttributeDatabase, AttributeValue,
    AttributeValueMap, DbPath,
};
use crate::errors::PhalDbError;

#[derive(Default)]
pub struct MemoryAttributeDatabase {
    attributes: Arc<RwLock<BTreeMap<String, AttributeValue>>>,
}

impl MemoryAttributeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(
        attributes: &RwLock<BTreeMap<String, AttributeValue>>,
        prefixes: &[String],
    ) -> PhalDb {
        let attributes = attributes.read();
        let matched = attributes
            .iter()
            .filter(|(path, _)| {
                prefixes.is_empty() || prefixes.iter().any(|p| path.starts_with(p.as_str()))
            })
            .map(|(path, value)| Attribute {
                path: path.clone(),
                value: Some(to_update_value(value)),
            })
            .collect();
        PhalDb { attributes: matched }
    }
}

#[async_trait]
impl AttributeDatabase for MemoryAttributeDatabase {
    async fn get(&self, paths: &[DbPath]) -> Result<PhalDb, PhalDbError> {
        let prefixes: Vec<String> = paths.iter().map(db_path_to_string).collect();
        Ok(Self::snapshot(&self.attributes, &prefixes))
    }

    async fn set(&self, values: AttributeValueMap) -> Result<(), PhalDbError> {
        let mut attributes = self.attributes.write();
        for (path, value) in values {
            attributes.insert(db_path_to_string(&path), value);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        paths: &[DbPath],
        writer: ChannelWriter<PhalDb>,
        polling_interval: Duration,
    ) -> Result<(), PhalDbError> {
        let prefixes: Vec<String> = paths.iter().map(db_path_to_string).collect();
        let attributes = self.attributes.clone();
        let interval = if polling_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            polling_interval
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let snapshot = Self::snapshot(&attributes, &prefixes);
                if writer.write(snapshot).is_err() {
                    debug!("subscriber channel closed, stopping poller");
                    break;
                }
            }
        });
        Ok(())
    }
}
