// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// The gNMI service surface. Subscribe runs one task per client stream:
// inbound requests are translated into publisher calls, responses flow back
// through the per-client channel. Initial updates for a new subscription
// list are delivered through the poll discipline before the sync marker.

use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, error, info};

use gneiss_proto::api::gnmi::{
    gnmi_server::Gnmi, subscribe_request, subscription_list, CapabilityRequest,
    CapabilityResponse, Encoding, GetRequest, GetResponse, ModelData, SetRequest,
    SetResponse, SubscribeRequest, SubscribeResponse, SubscriptionList,
    SubscriptionMode,
};

use crate::auth::{AllowAllPolicy, AuthPolicyChecker};
use crate::errors::TelemetryError;
use crate::publisher::GnmiPublisher;
use crate::subscription::{Frequency, GnmiSubscribeStream, SubscriptionHandle};

const GNMI_VERSION: &str = "0.7.0";

/// Outbound buffer per client stream.
const CLIENT_STREAM_DEPTH: usize = 128;

pub struct GnmiService {
    publisher: GnmiPublisher,
    auth: Arc<dyn AuthPolicyChecker>,
}

impl GnmiService {
    pub fn new(publisher: GnmiPublisher) -> Self {
        Self {
            publisher,
            auth: Arc::new(AllowAllPolicy),
        }
    }

    pub fn with_auth_policy(mut self, policy: Arc<dyn AuthPolicyChecker>) -> Self {
        self.auth = policy;
        self
    }

    fn authorize<T>(&self, rpc: &str, request: &Request<T>) -> Result<(), Status> {
        let peer = request.remote_addr().map(|addr| addr.to_string());
        self.auth
            .authorize(rpc, peer.as_deref())
            .map_err(Status::from)
    }
}

#[tonic::async_trait]
impl Gnmi for GnmiService {
    type SubscribeStream =
        Pin<Box<dyn Stream<Item = Result<SubscribeResponse, Status>> + Send + 'static>>;

    async fn subscribe(
        &self,
        request: Request<Streaming<SubscribeRequest>>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        self.authorize("Subscribe", &request)?;
        let inbound = request.into_inner();
        let (stream, rx) = GnmiSubscribeStream::channel(CLIENT_STREAM_DEPTH);

        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(err) =
                handle_subscribe_stream(publisher, inbound, stream.clone()).await
            {
                error!(%err, "subscribe stream handler failed");
                let _ = stream.write_error(err.into()).await;
            }
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::SubscribeStream
        ))
    }

    async fn capabilities(
        &self,
        request: Request<CapabilityRequest>,
    ) -> Result<Response<CapabilityResponse>, Status> {
        self.authorize("Capabilities", &request)?;
        Ok(Response::new(CapabilityResponse {
            supported_models: vec![
                model("openconfig-interfaces", "2.0.0"),
                model("openconfig-lacp", "1.0.2"),
                model("openconfig-qos", "0.2.0"),
                model("openconfig-platform", "0.12.2"),
            ],
            supported_encodings: vec![Encoding::Proto as i32],
            gnmi_version: GNMI_VERSION.to_string(),
        }))
    }

    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<GetResponse>, Status> {
        self.authorize("Get", &request)?;
        let req = request.into_inner();
        let mut notifications = Vec::new();

        for path in &req.path {
            let (stream, mut rx) = GnmiSubscribeStream::channel(CLIENT_STREAM_DEPTH);
            let handle = self
                .publisher
                .subscribe_poll(path, stream)
                .await
                .map_err(Status::from)?;
            self.publisher
                .handle_poll(&handle)
                .await
                .map_err(Status::from)?;
            self.publisher.unsubscribe(&handle);
            drop(handle);

            while let Some(msg) = rx.recv().await {
                if let Ok(SubscribeResponse {
                    response:
                        Some(gneiss_proto::api::gnmi::subscribe_response::Response::Update(n)),
                }) = msg
                {
                    notifications.push(n);
                }
            }
        }

        Ok(Response::new(GetResponse {
            notification: notifications,
        }))
    }

    async fn set(
        &self,
        request: Request<SetRequest>,
    ) -> Result<Response<SetResponse>, Status> {
        self.authorize("Set", &request)?;
        // Schema reconfiguration through gNMI is not served; attribute
        // writes go through the PhalDB service.
        Err(Status::unimplemented("Set is not supported"))
    }
}

fn model(name: &str, version: &str) -> ModelData {
    ModelData {
        name: name.to_string(),
        organization: "OpenConfig working group".to_string(),
        version: version.to_string(),
    }
}

/// Drive one client's subscribe stream to completion. Every subscription
/// established here is torn down when the stream ends, whichever side
/// closes first.
pub(crate) async fn handle_subscribe_stream<S>(
    publisher: GnmiPublisher,
    mut inbound: S,
    stream: GnmiSubscribeStream,
) -> Result<(), TelemetryError>
where
    S: Stream<Item = Result<SubscribeRequest, Status>> + Unpin + Send,
{
    let mut stream_subscriptions: Vec<SubscriptionHandle> = Vec::new();
    let mut poll_subscriptions: Vec<SubscriptionHandle> = Vec::new();

    let result = loop {
        match inbound.next().await {
            None => break Ok(()),
            Some(Err(status)) => {
                debug!(%status, "client closed the subscribe stream");
                break Ok(());
            }
            Some(Ok(req)) => match req.request {
                Some(subscribe_request::Request::Subscribe(list)) => {
                    if !stream_subscriptions.is_empty() || !poll_subscriptions.is_empty()
                    {
                        break Err(TelemetryError::InvalidArgument(
                            "subscription list already established on this stream"
                                .to_string(),
                        ));
                    }
                    match handle_subscription_list(
                        &publisher,
                        list,
                        &stream,
                        &mut stream_subscriptions,
                        &mut poll_subscriptions,
                    )
                    .await
                    {
                        Ok(true) => break Ok(()), // ONCE: close after sync
                        Ok(false) => {}
                        Err(err) => break Err(err),
                    }
                }
                Some(subscribe_request::Request::Poll(_)) => {
                    for handle in &poll_subscriptions {
                        publisher.handle_poll(handle).await?;
                    }
                }
                None => {
                    break Err(TelemetryError::InvalidArgument(
                        "empty subscribe request".to_string(),
                    ))
                }
            },
        }
    };

    for handle in stream_subscriptions.iter().chain(poll_subscriptions.iter()) {
        publisher.unsubscribe(handle);
    }
    result
}

/// Returns true when the stream must close after the sync response (ONCE).
async fn handle_subscription_list(
    publisher: &GnmiPublisher,
    list: SubscriptionList,
    stream: &GnmiSubscribeStream,
    stream_subscriptions: &mut Vec<SubscriptionHandle>,
    poll_subscriptions: &mut Vec<SubscriptionHandle>,
) -> Result<bool, TelemetryError> {
    match list.mode() {
        subscription_list::Mode::Once => {
            for sub in &list.subscription {
                let path = required_path(sub)?;
                let handle = publisher.subscribe_poll(path, stream.clone()).await?;
                publisher.handle_poll(&handle).await?;
                publisher.unsubscribe(&handle);
            }
            publisher.send_sync_response(stream).await?;
            Ok(true)
        }
        subscription_list::Mode::Poll => {
            for sub in &list.subscription {
                let path = required_path(sub)?;
                let handle = publisher.subscribe_poll(path, stream.clone()).await?;
                publisher.handle_poll(&handle).await?;
                poll_subscriptions.push(handle);
            }
            publisher.send_sync_response(stream).await?;
            Ok(false)
        }
        subscription_list::Mode::Stream => {
            for sub in &list.subscription {
                let path = required_path(sub)?.clone();
                let mut sub = sub.clone();
                if sub.mode() == SubscriptionMode::TargetDefined {
                    publisher
                        .update_subscription_with_target_specific_mode(&path, &mut sub)
                        .await?;
                }
                let handle = match sub.mode() {
                    SubscriptionMode::Sample => {
                        let interval = sub.sample_interval.max(1);
                        publisher
                            .subscribe_periodic(
                                Frequency {
                                    delay_ms: interval,
                                    period_ms: interval,
                                },
                                &path,
                                stream.clone(),
                            )
                            .await?
                    }
                    // TARGET_DEFINED left untouched resolves to on-change.
                    SubscriptionMode::OnChange | SubscriptionMode::TargetDefined => {
                        publisher.subscribe_on_change(&path, stream.clone()).await?
                    }
                };
                stream_subscriptions.push(handle);

                // Initial snapshot through the poll discipline; subtrees
                // without poll support just skip it.
                match publisher.subscribe_poll(&path, stream.clone()).await {
                    Ok(snapshot) => {
                        publisher.handle_poll(&snapshot).await?;
                        publisher.unsubscribe(&snapshot);
                    }
                    Err(err) => {
                        debug!(%err, "no initial snapshot for subscription");
                    }
                }
            }
            publisher.send_sync_response(stream).await?;
            info!(
                subscriptions = stream_subscriptions.len(),
                "stream subscriptions established"
            );
            Ok(false)
        }
    }
}

fn required_path(
    sub: &gneiss_proto::api::gnmi::Subscription,
) -> Result<&gneiss_proto::api::gnmi::Path, TelemetryError> {
    sub.path
        .as_ref()
        .ok_or_else(|| TelemetryError::InvalidArgument("subscription without path".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use gneiss_hal::data::{DataResponse, PortState, SingletonPort};
    use gneiss_hal::event::GnmiEvent;
    use gneiss_hal::mock::MockSwitch;
    use gneiss_proto::api::gnmi::{
        subscribe_response, Path, Subscription,
    };

    use crate::auth::StaticDenyPolicy;
    use crate::paths::PathBuilder;
    use crate::timer::TimerDaemon;

    fn oper_status_path() -> Path {
        PathBuilder::new()
            .elem("interfaces")
            .keyed_elem("interface", "name", "interface-1")
            .elem("state")
            .elem("oper-status")
            .build()
    }

    fn setup() -> (GnmiPublisher, Arc<MockSwitch>) {
        let switch = Arc::new(MockSwitch::new());
        let publisher = GnmiPublisher::new(switch.clone(), Arc::new(TimerDaemon::new()));
        publisher.parse_tree().add_subtree_interface_from_singleton(
            &SingletonPort {
                name: "interface-1".to_string(),
                node_id: 3,
                port_id: 3,
                speed_bps: 25_000_000_000,
            },
            &Default::default(),
        );
        (publisher, switch)
    }

    fn stream_subscribe_request(mode: SubscriptionMode) -> SubscribeRequest {
        SubscribeRequest {
            request: Some(subscribe_request::Request::Subscribe(SubscriptionList {
                subscription: vec![Subscription {
                    path: Some(oper_status_path()),
                    mode: mode as i32,
                    ..Default::default()
                }],
                mode: subscription_list::Mode::Stream as i32,
                ..Default::default()
            })),
        }
    }

    fn expect_update_string(resp: &SubscribeResponse, want: &str) {
        match resp.response.as_ref().unwrap() {
            subscribe_response::Response::Update(n) => {
                assert_eq!(n.update.len(), 1);
                let val = n.update[0].val.as_ref().unwrap();
                match val.value.as_ref().unwrap() {
                    gneiss_proto::api::gnmi::typed_value::Value::StringVal(s) => {
                        assert_eq!(s, want)
                    }
                    other => panic!("unexpected value: {:?}", other),
                }
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    fn expect_sync(resp: &SubscribeResponse) {
        assert!(matches!(
            resp.response.as_ref().unwrap(),
            subscribe_response::Response::SyncResponse(true)
        ));
    }

    #[tokio::test]
    async fn test_stream_subscribe_sends_initial_update_then_sync() {
        let (publisher, switch) = setup();
        publisher.register_event_writer().await.unwrap();
        switch.push_response(DataResponse::OperStatus(PortState::Up));

        let (req_tx, req_rx) = mpsc::channel(4);
        let (stream, mut resp_rx) = GnmiSubscribeStream::channel(16);
        let task = tokio::spawn(handle_subscribe_stream(
            publisher.clone(),
            ReceiverStream::new(req_rx),
            stream,
        ));

        req_tx
            .send(Ok(stream_subscribe_request(SubscriptionMode::OnChange)))
            .await
            .unwrap();

        // One initial update, then the sync marker. Never sync first.
        let first = resp_rx.recv().await.unwrap().unwrap();
        expect_update_string(&first, "UP");
        let second = resp_rx.recv().await.unwrap().unwrap();
        expect_sync(&second);

        // A backend event now reaches the established subscription.
        switch
            .send_event(GnmiEvent::PortOperStateChanged {
                node_id: 3,
                port_id: 3,
                state: PortState::Down,
            })
            .unwrap();
        let third = resp_rx.recv().await.unwrap().unwrap();
        expect_update_string(&third, "DOWN");

        drop(req_tx);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_once_subscribe_closes_after_sync() {
        let (publisher, switch) = setup();
        switch.push_response(DataResponse::OperStatus(PortState::Up));

        let (req_tx, req_rx) = mpsc::channel(4);
        let (stream, mut resp_rx) = GnmiSubscribeStream::channel(16);
        let task = tokio::spawn(handle_subscribe_stream(
            publisher.clone(),
            ReceiverStream::new(req_rx),
            stream,
        ));

        let mut req = stream_subscribe_request(SubscriptionMode::OnChange);
        if let Some(subscribe_request::Request::Subscribe(list)) = &mut req.request {
            list.mode = subscription_list::Mode::Once as i32;
        }
        req_tx.send(Ok(req)).await.unwrap();

        let first = resp_rx.recv().await.unwrap().unwrap();
        expect_update_string(&first, "UP");
        let second = resp_rx.recv().await.unwrap().unwrap();
        expect_sync(&second);

        // Task completes on its own and the response stream closes.
        task.await.unwrap().unwrap();
        assert!(resp_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_mode_polls_established_subscriptions() {
        let (publisher, switch) = setup();
        switch.push_response(DataResponse::OperStatus(PortState::Up));
        switch.push_response(DataResponse::OperStatus(PortState::Down));

        let (req_tx, req_rx) = mpsc::channel(4);
        let (stream, mut resp_rx) = GnmiSubscribeStream::channel(16);
        let task = tokio::spawn(handle_subscribe_stream(
            publisher.clone(),
            ReceiverStream::new(req_rx),
            stream,
        ));

        let mut req = stream_subscribe_request(SubscriptionMode::OnChange);
        if let Some(subscribe_request::Request::Subscribe(list)) = &mut req.request {
            list.mode = subscription_list::Mode::Poll as i32;
        }
        req_tx.send(Ok(req)).await.unwrap();

        expect_update_string(&resp_rx.recv().await.unwrap().unwrap(), "UP");
        expect_sync(&resp_rx.recv().await.unwrap().unwrap());

        // A mid-stream poll trigger re-fetches from the backend.
        req_tx
            .send(Ok(SubscribeRequest {
                request: Some(subscribe_request::Request::Poll(Default::default())),
            }))
            .await
            .unwrap();
        expect_update_string(&resp_rx.recv().await.unwrap().unwrap(), "DOWN");

        drop(req_tx);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_target_defined_on_counters_resolves_to_sample() {
        let (publisher, _switch) = setup();

        let counters_path = PathBuilder::new()
            .elem("interfaces")
            .keyed_elem("interface", "name", "interface-1")
            .elem("state")
            .elem("counters")
            .build();
        let mut sub = Subscription {
            path: Some(counters_path.clone()),
            mode: SubscriptionMode::TargetDefined as i32,
            ..Default::default()
        };
        publisher
            .update_subscription_with_target_specific_mode(&counters_path, &mut sub)
            .await
            .unwrap();
        assert_eq!(sub.mode(), SubscriptionMode::Sample);
        assert_eq!(sub.sample_interval, 10_000);
    }

    #[tokio::test]
    async fn test_denied_rpc_maps_to_permission_denied() {
        let (publisher, _switch) = setup();
        let service = GnmiService::new(publisher)
            .with_auth_policy(Arc::new(StaticDenyPolicy::new(["Capabilities".to_string()])));

        let err = service
            .capabilities(Request::new(CapabilityRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_set_is_unimplemented() {
        let (publisher, _switch) = setup();
        let service = GnmiService::new(publisher);
        let err = service
            .set(Request::new(SetRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_get_returns_polled_notifications() {
        let (publisher, switch) = setup();
        switch.push_response(DataResponse::OperStatus(PortState::Up));
        let service = GnmiService::new(publisher);

        let resp = service
            .get(Request::new(GetRequest {
                path: vec![oper_status_path()],
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(resp.notification.len(), 1);
        assert_eq!(resp.notification[0].update.len(), 1);
    }
}
