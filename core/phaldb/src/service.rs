// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// The PhalDB gRPC service. Subscribe bridges a bounded channel between the
// database's writer and the per-client response stream; every outstanding
// channel is tracked so teardown can close them all. Set coerces the nine
// scalar update kinds into an attribute map; per-update problems are packed
// into the gRPC status details.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::{Code, Request, Response, Status};
use tonic_types::{ErrorDetails, StatusExt};
use tracing::{debug, info};

use gneiss_hal::channel::Channel;
use gneiss_proto::api::phaldb::{
    phal_db_server::PhalDb as PhalDbApi, GetRequest, GetResponse, PhalDb, SetRequest,
    SetResponse, SubscribeRequest, SubscribeResponse,
};

use crate::adapter::{to_attribute_value, to_db_path, AttributeDatabase, AttributeValueMap};
use crate::errors::PhalDbError;

/// Depth of the bridge channel between the database writer and one client.
const SUBSCRIBE_CHANNEL_DEPTH: usize = 128;

type SubscriberChannels = Arc<Mutex<HashMap<u64, Channel<PhalDb>>>>;

pub struct PhalDbService {
    db: Arc<dyn AttributeDatabase>,
    subscriber_channels: SubscriberChannels,
    next_subscription_id: AtomicU64,
}

impl PhalDbService {
    pub fn new(db: Arc<dyn AttributeDatabase>) -> Self {
        Self {
            db,
            subscriber_channels: Arc::new(Mutex::new(HashMap::new())),
            next_subscription_id: AtomicU64::new(0),
        }
    }

    /// Close every outstanding subscriber channel. Their bridge tasks wind
    /// down and the client streams terminate.
    pub fn teardown(&self) {
        let mut channels = self.subscriber_channels.lock();
        for (_, channel) in channels.drain() {
            channel.close();
        }
        info!("phaldb service teardown complete");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_channels.lock().len()
    }
}

impl Drop for PhalDbService {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[tonic::async_trait]
impl PhalDbApi for PhalDbService {
    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let query = req.path.ok_or_else(|| Status::invalid_argument("no path"))?;
        let path = to_db_path(&query).map_err(Status::from)?;
        let snapshot = self.db.get(&[path]).await.map_err(Status::from)?;
        debug!(attributes = snapshot.attributes.len(), "phaldb get");
        Ok(Response::new(GetResponse {
            phal_db: Some(snapshot),
        }))
    }

    async fn set(
        &self,
        request: Request<SetRequest>,
    ) -> Result<Response<SetResponse>, Status> {
        let req = request.into_inner();
        // An empty update list is a successful no-op.
        if req.updates.is_empty() {
            return Ok(Response::new(SetResponse::default()));
        }

        let mut values = AttributeValueMap::new();
        let mut details = ErrorDetails::new();
        for (index, update) in req.updates.iter().enumerate() {
            let parsed = update
                .path
                .as_ref()
                .ok_or_else(|| PhalDbError::InvalidArgument("no path".to_string()))
                .and_then(to_db_path)
                .and_then(|path| {
                    let value = update.value.as_ref().ok_or_else(|| {
                        PhalDbError::InvalidArgument("unknown value type".to_string())
                    })?;
                    Ok((path, to_attribute_value(value)?))
                });
            match parsed {
                Ok((path, value)) => {
                    values.insert(path, value);
                }
                Err(err) => {
                    details.add_bad_request_violation(
                        format!("updates[{}]", index),
                        err.to_string(),
                    );
                }
            }
        }

        if details.has_bad_request_violations() {
            return Err(Status::with_error_details(
                Code::InvalidArgument,
                "invalid update list",
                details,
            ));
        }

        self.db.set(values).await.map_err(Status::from)?;
        Ok(Response::new(SetResponse::default()))
    }

    type SubscribeStream =
        Pin<Box<dyn Stream<Item = Result<SubscribeResponse, Status>> + Send + 'static>>;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let req = request.into_inner();
        let query = req.path.ok_or_else(|| Status::invalid_argument("no path"))?;
        let path = to_db_path(&query).map_err(Status::from)?;

        // Bridge channel between the database writer and this client.
        let channel = Channel::new(SUBSCRIBE_CHANNEL_DEPTH);
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.subscriber_channels.lock().insert(id, channel.clone());

        if let Err(err) = self
            .db
            .subscribe(
                &[path],
                channel.writer(),
                Duration::from_secs(req.polling_interval as u64),
            )
            .await
        {
            self.subscriber_channels.lock().remove(&id);
            channel.close();
            return Err(err.into());
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBE_CHANNEL_DEPTH);
        let reader = channel.reader();
        let registry = self.subscriber_channels.clone();
        tokio::spawn(async move {
            loop {
                match reader.read().await {
                    Ok(snapshot) => {
                        // A zero-byte snapshot closes the subscription.
                        if snapshot.encoded_len() == 0 {
                            let _ = tx
                                .send(Err(Status::internal(
                                    "subscribe read returned zero bytes",
                                )))
                                .await;
                            break;
                        }
                        let resp = SubscribeResponse {
                            phal_db: Some(snapshot),
                        };
                        if tx.send(Ok(resp)).await.is_err() {
                            debug!("client stream closed, stopping phaldb bridge");
                            break;
                        }
                    }
                    Err(_) => {
                        let _ = tx
                            .send(Err(Status::internal(
                                "attribute-db subscription closed the channel",
                            )))
                            .await;
                        break;
                    }
                }
            }
            // Scoped cleanup: close the bridge and forget the subscription.
            if let Some(channel) = registry.lock().remove(&id) {
                channel.close();
            }
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::SubscribeStream
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    use gneiss_hal::channel::ChannelWriter;
    use gneiss_proto::api::phaldb::{
        update_value, Attribute, PathEntry, PathQuery, Update, UpdateValue,
    };

    use crate::adapter::{AttributeValue, DbPath};

    /// Captures the subscription writer so tests can drive snapshots.
    #[derive(Default)]
    struct ScriptedDb {
        writer: Mutex<Option<ChannelWriter<PhalDb>>>,
        set_calls: Mutex<Vec<AttributeValueMap>>,
        intervals: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl AttributeDatabase for ScriptedDb {
        async fn get(&self, _paths: &[DbPath]) -> Result<PhalDb, PhalDbError> {
            Ok(PhalDb {
                attributes: vec![Attribute {
                    path: "cards/uptime".to_string(),
                    value: Some(UpdateValue {
                        value: Some(update_value::Value::Uint64Val(42)),
                    }),
                }],
            })
        }

        async fn set(&self, values: AttributeValueMap) -> Result<(), PhalDbError> {
            self.set_calls.lock().push(values);
            Ok(())
        }

        async fn subscribe(
            &self,
            _paths: &[DbPath],
            writer: ChannelWriter<PhalDb>,
            polling_interval: Duration,
        ) -> Result<(), PhalDbError> {
            *self.writer.lock() = Some(writer);
            self.intervals.lock().push(polling_interval);
            Ok(())
        }
    }

    fn query(name: &str) -> PathQuery {
        PathQuery {
            entries: vec![PathEntry {
                name: name.to_string(),
                ..Default::default()
            }],
        }
    }

    fn non_empty_snapshot() -> PhalDb {
        PhalDb {
            attributes: vec![Attribute {
                path: "fans/speed".to_string(),
                value: Some(UpdateValue {
                    value: Some(update_value::Value::Uint32Val(9)),
                }),
            }],
        }
    }

    #[tokio::test]
    async fn test_get_requires_path() {
        let service = PhalDbService::new(Arc::new(ScriptedDb::default()));
        let err = service
            .get(Request::new(GetRequest { path: None }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = service
            .get(Request::new(GetRequest {
                path: Some(PathQuery::default()),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_returns_snapshot() {
        let service = PhalDbService::new(Arc::new(ScriptedDb::default()));
        let resp = service
            .get(Request::new(GetRequest {
                path: Some(query("cards")),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.phal_db.unwrap().attributes.len(), 1);
    }

    #[tokio::test]
    async fn test_set_empty_updates_is_noop() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        service
            .set(Request::new(SetRequest::default()))
            .await
            .unwrap();
        assert!(db.set_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_set_coerces_values() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        service
            .set(Request::new(SetRequest {
                updates: vec![Update {
                    path: Some(query("fans")),
                    value: Some(UpdateValue {
                        value: Some(update_value::Value::BoolVal(true)),
                    }),
                }],
            }))
            .await
            .unwrap();

        let calls = db.set_calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].values().next().unwrap(),
            &AttributeValue::Bool(true)
        );
    }

    #[tokio::test]
    async fn test_set_unknown_value_case_is_invalid() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        let err = service
            .set(Request::new(SetRequest {
                updates: vec![Update {
                    path: Some(query("fans")),
                    value: Some(UpdateValue::default()),
                }],
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(db.set_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_forwards_snapshots() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        let mut stream = service
            .subscribe(Request::new(SubscribeRequest {
                path: Some(query("fans")),
                polling_interval: 5,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(service.subscriber_count(), 1);
        assert_eq!(*db.intervals.lock(), vec![Duration::from_secs(5)]);

        let writer = db.writer.lock().clone().unwrap();
        writer.write(non_empty_snapshot()).unwrap();

        let resp = stream.next().await.unwrap().unwrap();
        assert_eq!(resp.phal_db.unwrap().attributes.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_zero_byte_snapshot_is_internal() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        let mut stream = service
            .subscribe(Request::new(SubscribeRequest {
                path: Some(query("fans")),
                polling_interval: 1,
            }))
            .await
            .unwrap()
            .into_inner();

        let writer = db.writer.lock().clone().unwrap();
        writer.write(PhalDb::default()).unwrap();

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("zero bytes"));

        // Bridge task deregisters itself on exit.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_closes_outstanding_subscriptions() {
        let db = Arc::new(ScriptedDb::default());
        let service = PhalDbService::new(db.clone());
        let mut stream = service
            .subscribe(Request::new(SubscribeRequest {
                path: Some(query("fans")),
                polling_interval: 1,
            }))
            .await
            .unwrap()
            .into_inner();

        service.teardown();
        assert_eq!(service.subscriber_count(), 0);

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("closed the channel"));
    }
}
