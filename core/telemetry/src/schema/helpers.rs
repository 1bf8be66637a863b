// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Handler constructors shared by every subtree builder. A leaf handler is a
// closure over the leaf's backend identity, its fully-qualified concrete
// path, and the projection from backend data (or event payload) to the wire
// value.

use std::sync::Arc;

use futures::FutureExt;

use gneiss_hal::data::{DataRequest, DataResponse};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::{CaptureWriter, SwitchInterface};
use gneiss_proto::api::gnmi::{Path, TypedValue};

use crate::errors::TelemetryError;
use crate::node::NodeCapabilities;
use crate::subscription::GnmiHandler;
use crate::values::update_response;

/// Maps the backend response for a leaf to its wire value.
pub(crate) type Projector =
    Arc<dyn Fn(DataResponse) -> Option<TypedValue> + Send + Sync>;

/// Maps an event to the leaf's wire value; None means the event is not for
/// this leaf and nothing is written.
pub(crate) type EventProjector =
    Arc<dyn Fn(&GnmiEvent) -> Option<TypedValue> + Send + Sync>;

/// Handler that accepts every event and writes nothing. Installed on
/// wildcard template leaves and on leaves with no change source.
pub(crate) fn silent_handler() -> GnmiHandler {
    Arc::new(|_event, _stream| async move { Ok(()) }.boxed())
}

/// Handler writing a fixed value captured at schema-construction time.
pub(crate) fn constant_handler(path: Path, value: TypedValue) -> GnmiHandler {
    Arc::new(move |_event, stream| {
        let path = path.clone();
        let value = value.clone();
        async move { stream.write(update_response(path, value)).await }.boxed()
    })
}

/// Handler that fetches the current value from the backend through a
/// one-shot writer and encodes it for the wire.
pub(crate) fn poll_handler(
    switch: Arc<dyn SwitchInterface>,
    node_id: u64,
    request: DataRequest,
    path: Path,
    project: Projector,
) -> GnmiHandler {
    Arc::new(move |_event, stream| {
        let switch = switch.clone();
        let request = request.clone();
        let path = path.clone();
        let project = project.clone();
        async move {
            let mut writer = CaptureWriter::default();
            switch.retrieve_value(node_id, request, &mut writer).await?;
            let resp = writer.into_inner().ok_or_else(|| {
                TelemetryError::Internal("backend returned no value".to_string())
            })?;
            let value = project(resp).ok_or_else(|| {
                TelemetryError::Internal("unexpected backend response".to_string())
            })?;
            stream.write(update_response(path, value)).await
        }
        .boxed()
    })
}

/// Handler projecting the changed value straight out of the event payload.
pub(crate) fn change_handler(path: Path, project: EventProjector) -> GnmiHandler {
    Arc::new(move |event, stream| {
        let path = path.clone();
        let value = project(&event);
        async move {
            match value {
                Some(value) => stream.write(update_response(path, value)).await,
                None => Ok(()),
            }
        }
        .boxed()
    })
}

/// Capabilities for a concrete leaf: support flags follow handler presence.
pub(crate) fn leaf_caps(
    on_poll: Option<GnmiHandler>,
    on_timer: Option<GnmiHandler>,
    on_change: Option<GnmiHandler>,
    registrations: Vec<EventKind>,
) -> NodeCapabilities {
    NodeCapabilities {
        supports_on_poll: on_poll.is_some(),
        supports_on_timer: on_timer.is_some(),
        supports_on_change: on_change.is_some(),
        on_poll,
        on_timer,
        on_change,
        target_defined_mode: None,
        registrations,
    }
}

/// Existing keyed child by name, or a fresh one attached in place.
pub(crate) fn keyed_child(
    parent: &Arc<crate::node::TreeNode>,
    name: &str,
    key_name: &str,
) -> Arc<crate::node::TreeNode> {
    if let Some(existing) = parent.child(name) {
        return existing;
    }
    parent.attach(crate::node::TreeNode::keyed(name, key_name))
}

/// Template-leaf capabilities: same support profile and registrations as a
/// concrete leaf, but silent handlers.
pub(crate) fn template_caps(
    supports_on_poll: bool,
    supports_on_timer: bool,
    supports_on_change: bool,
    registrations: Vec<EventKind>,
) -> NodeCapabilities {
    NodeCapabilities {
        on_poll: supports_on_poll.then(silent_handler),
        on_timer: supports_on_timer.then(silent_handler),
        on_change: supports_on_change.then(silent_handler),
        supports_on_poll,
        supports_on_timer,
        supports_on_change,
        target_defined_mode: None,
        registrations,
    }
}
