// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// The publisher binds client subscriptions to parse-tree handlers,
// multiplexes backend events onto per-client streams, and drives sampled
// subscriptions through the timer daemon. It owns the only strong reference
// to each live subscription; registries hold weak ones.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error};

use gneiss_hal::channel::{Channel, ChannelReader};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::SwitchInterface;
use gneiss_proto::api::gnmi::{Path, Subscription};

use crate::errors::TelemetryError;
use crate::node::TreeNode;
use crate::paths::path_to_string;
use crate::registry::EventHandlerRegistries;
use crate::subscription::{
    EventHandlerRecord, Frequency, GnmiHandler, GnmiSubscribeStream, SubscriptionHandle,
};
use crate::timer::{TimerCallback, TimerDaemon};
use crate::tree::ParseTree;
use crate::values::sync_response;

/// Depth of the backend event channel.
pub const MAX_GNMI_EVENT_DEPTH: usize = 256;

struct PublisherInner {
    switch: Arc<dyn SwitchInterface>,
    parse_tree: Arc<ParseTree>,
    registries: Arc<EventHandlerRegistries>,
    timer_daemon: Arc<TimerDaemon>,
    /// Strong references keeping subscriptions alive.
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    event_channel: Mutex<Option<Channel<GnmiEvent>>>,
    /// Write mode for mutations, read mode across event dispatch.
    access_lock: tokio::sync::RwLock<()>,
}

#[derive(Clone)]
pub struct GnmiPublisher {
    inner: Arc<PublisherInner>,
}

impl GnmiPublisher {
    pub fn new(switch: Arc<dyn SwitchInterface>, timer_daemon: Arc<TimerDaemon>) -> Self {
        let parse_tree = Arc::new(ParseTree::new(switch.clone()));
        let publisher = Self {
            inner: Arc::new(PublisherInner {
                switch,
                parse_tree: parse_tree.clone(),
                registries: Arc::new(EventHandlerRegistries::new()),
                timer_daemon,
                subscriptions: Mutex::new(Vec::new()),
                event_channel: Mutex::new(None),
                access_lock: tokio::sync::RwLock::new(()),
            }),
        };

        // Process-owned subscription: pushed configuration rebuilds the
        // dynamic subtrees.
        let record = Arc::new(EventHandlerRecord::new(
            config_pushed_handler(parse_tree),
            GnmiSubscribeStream::sink(),
        ));
        publisher
            .inner
            .registries
            .register(EventKind::ConfigPushed, &record);
        publisher.inner.subscriptions.lock().push(record);

        publisher
    }

    pub fn parse_tree(&self) -> &Arc<ParseTree> {
        &self.inner.parse_tree
    }

    pub fn registries(&self) -> &Arc<EventHandlerRegistries> {
        &self.inner.registries
    }

    /// Create the backend event channel, hand its writer to the switch, and
    /// spawn the reader. Idempotent.
    pub async fn register_event_writer(&self) -> Result<(), TelemetryError> {
        let _guard = self.inner.access_lock.write().await;
        if self.inner.event_channel.lock().is_some() {
            return Ok(());
        }
        let channel = Channel::new(MAX_GNMI_EVENT_DEPTH);
        self.inner
            .switch
            .register_event_notify_writer(channel.writer())
            .await?;
        let reader = channel.reader();
        *self.inner.event_channel.lock() = Some(channel);

        let publisher = self.clone();
        tokio::spawn(async move {
            publisher.read_gnmi_events(reader).await;
        });
        Ok(())
    }

    /// Detach the backend writer and close the channel; the reader exits on
    /// the resulting Cancelled. Safe to call repeatedly.
    pub async fn unregister_event_writer(&self) -> Result<(), TelemetryError> {
        let _guard = self.inner.access_lock.write().await;
        let channel = self.inner.event_channel.lock().take();
        if let Some(channel) = channel {
            let result = self.inner.switch.unregister_event_notify_writer().await;
            channel.close();
            result?;
        }
        Ok(())
    }

    async fn read_gnmi_events(&self, reader: ChannelReader<GnmiEvent>) {
        loop {
            match reader.read().await {
                Ok(event) => {
                    let _guard = self.inner.access_lock.read().await;
                    self.inner.registries.dispatch(&event).await;
                }
                Err(_) => {
                    debug!("event channel closed, reader exiting");
                    break;
                }
            }
        }
    }

    fn resolve(&self, path: &Path) -> Result<Arc<TreeNode>, TelemetryError> {
        if path.elem.is_empty() {
            return Err(TelemetryError::InvalidArgument("path is empty".to_string()));
        }
        self.inner.parse_tree.find_node(path).ok_or_else(|| {
            TelemetryError::InvalidArgument(format!(
                "unsupported path: {}",
                path_to_string(path)
            ))
        })
    }

    async fn subscribe_inner(
        &self,
        path: &Path,
        stream: GnmiSubscribeStream,
        supports: fn(&TreeNode) -> bool,
        get_handler: fn(&TreeNode) -> Result<GnmiHandler, TelemetryError>,
        mode: &str,
    ) -> Result<(SubscriptionHandle, Arc<TreeNode>), TelemetryError> {
        let _guard = self.inner.access_lock.write().await;
        let node = self.resolve(path)?;
        if !supports(&node) {
            return Err(TelemetryError::InvalidArgument(format!(
                "not all leaves on path {} support {}",
                path_to_string(path),
                mode
            )));
        }
        let handler = get_handler(&node)?;
        let handle = Arc::new(EventHandlerRecord::new(handler, stream));
        self.inner.subscriptions.lock().push(handle.clone());
        Ok((handle, node))
    }

    /// Bind `path`'s on-change handler to `stream` and register the handle
    /// with every event variant the subtree declares interest in.
    pub async fn subscribe_on_change(
        &self,
        path: &Path,
        stream: GnmiSubscribeStream,
    ) -> Result<SubscriptionHandle, TelemetryError> {
        let (handle, node) = self
            .subscribe_inner(
                path,
                stream,
                TreeNode::all_subtree_leaves_support_on_change,
                TreeNode::get_on_change_handler,
                "on-change",
            )
            .await?;
        node.do_on_change_registration(&self.inner.registries, &handle);
        Ok(handle)
    }

    /// Bind `path`'s on-poll handler to `stream`; polls are driven
    /// explicitly through `handle_poll`.
    pub async fn subscribe_poll(
        &self,
        path: &Path,
        stream: GnmiSubscribeStream,
    ) -> Result<SubscriptionHandle, TelemetryError> {
        let (handle, _node) = self
            .subscribe_inner(
                path,
                stream,
                TreeNode::all_subtree_leaves_support_on_poll,
                TreeNode::get_on_poll_handler,
                "on-poll",
            )
            .await?;
        Ok(handle)
    }

    /// Bind `path`'s on-timer handler to `stream` and schedule periodic
    /// delivery. The timer token lives on the handle and dies with it.
    pub async fn subscribe_periodic(
        &self,
        freq: Frequency,
        path: &Path,
        stream: GnmiSubscribeStream,
    ) -> Result<SubscriptionHandle, TelemetryError> {
        let (handle, _node) = self
            .subscribe_inner(
                path,
                stream,
                TreeNode::all_subtree_leaves_support_on_timer,
                TreeNode::get_on_timer_handler,
                "on-timer",
            )
            .await?;

        let weak = Arc::downgrade(&handle);
        let callback: TimerCallback = Arc::new(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(record) => record.handle(&GnmiEvent::Timer).await,
                    None => Ok(()),
                }
            }
            .boxed()
        });
        let token = self.inner.timer_daemon.request_periodic_timer(
            freq.delay_ms,
            freq.period_ms,
            callback,
        );
        handle.set_timer(token);
        self.inner.registries.register(EventKind::Timer, &handle);
        Ok(handle)
    }

    /// Drive one poll delivery. A failing handler is logged; polls are
    /// advisory fetches, not RPC failures.
    pub async fn handle_poll(&self, handle: &SubscriptionHandle) -> Result<(), TelemetryError> {
        let _guard = self.inner.access_lock.read().await;
        if let Err(err) = handle.handle(&GnmiEvent::Poll).await {
            error!(%err, "poll handler returned non-OK status");
        }
        Ok(())
    }

    /// Resolve `path` and let the node rewrite the subscription's mode.
    pub async fn update_subscription_with_target_specific_mode(
        &self,
        path: &Path,
        subscription: &mut Subscription,
    ) -> Result<(), TelemetryError> {
        let _guard = self.inner.access_lock.write().await;
        let node = self.resolve(path)?;
        node.apply_target_defined_mode_to_subscription(subscription)
    }

    /// Tell the client the initial snapshot is complete.
    pub async fn send_sync_response(
        &self,
        stream: &GnmiSubscribeStream,
    ) -> Result<(), TelemetryError> {
        stream.write(sync_response()).await.map_err(|_| {
            TelemetryError::Internal("writing sync-response to stream failed".to_string())
        })
    }

    /// Cancel the handle's timer and drop the strong reference; registries
    /// scrub the weak entries on their next dispatch.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        handle.cancel_timer();
        self.inner
            .subscriptions
            .lock()
            .retain(|h| !Arc::ptr_eq(h, handle));
    }
}

fn config_pushed_handler(parse_tree: Arc<ParseTree>) -> GnmiHandler {
    Arc::new(move |event, _stream| {
        let parse_tree = parse_tree.clone();
        async move {
            if let GnmiEvent::ConfigHasBeenPushed { config } = event {
                debug!(
                    ports = config.ports.len(),
                    chassis = %config.chassis.name,
                    "processing pushed config"
                );
                parse_tree.process_pushed_config(&config);
            }
            Ok(())
        }
        .boxed()
    })
}
