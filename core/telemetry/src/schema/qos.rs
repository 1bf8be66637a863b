// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// /qos/interfaces/interface[name=K]/output/queues/queue[name=Q]/state
// subtree. Concrete interfaces mirror the wildcard queue template next to
// their configured queues.

use std::sync::Arc;

use gneiss_hal::data::{DataRequest, DataResponse, QueueCounters};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::SwitchInterface;
use gneiss_proto::api::gnmi::Path;

use crate::node::TreeNode;
use crate::paths::{PathBuilder, WILDCARD};
use crate::values::{string_value, uint_value};

use super::helpers::{
    change_handler, constant_handler, keyed_child, leaf_caps, poll_handler,
    silent_handler, template_caps, Projector,
};
use super::{PortBinding, QueueBinding};

fn queue_leaf_path(interface_key: &str, queue_key: &str, leaf: &str) -> Path {
    PathBuilder::new()
        .elem("qos")
        .elem("interfaces")
        .keyed_elem("interface", "name", interface_key)
        .elem("output")
        .elem("queues")
        .keyed_elem("queue", "name", queue_key)
        .elem("state")
        .elem(leaf)
        .build()
}

pub(crate) fn add_qos_instance(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    queues: &[QueueBinding],
) {
    let key = binding.map(|b| b.name.clone()).unwrap_or_else(|| WILDCARD.to_string());
    let qos = root.interior_child("qos");
    let interfaces = qos.interior_child("interfaces");
    let interface = keyed_child(&interfaces, "interface", "name");
    let instance = interface.attach(TreeNode::key_instance(&key));
    let output = instance.interior_child("output");
    let queues_node = output.interior_child("queues");
    let queue = keyed_child(&queues_node, "queue", "name");

    // The wildcard queue template is mirrored into every instance.
    add_queue_instance(&queue, switch, None, None, &key);
    for q in queues {
        add_queue_instance(&queue, switch, binding, Some(q), &key);
    }
}

fn add_queue_instance(
    queue: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    queue_binding: Option<&QueueBinding>,
    interface_key: &str,
) {
    let queue_key = queue_binding
        .map(|q| q.name.clone())
        .unwrap_or_else(|| WILDCARD.to_string());
    let instance = queue.attach(TreeNode::key_instance(&queue_key));
    let state = instance.interior_child("state");

    let bound = match (binding, queue_binding) {
        (Some(b), Some(q)) => Some((b, q)),
        _ => None,
    };

    setup_queue_name(&state, bound, interface_key, &queue_key);
    setup_queue_id(&state, switch, bound, interface_key, &queue_key);
    for (leaf, field) in QUEUE_COUNTER_LEAVES {
        setup_queue_counter(
            &state,
            switch,
            bound,
            interface_key,
            &queue_key,
            leaf,
            *field,
        );
    }
}

fn setup_queue_name(
    state: &Arc<TreeNode>,
    bound: Option<(&PortBinding, &QueueBinding)>,
    interface_key: &str,
    queue_key: &str,
) {
    let caps = match bound {
        Some((_, q)) => {
            let poll = constant_handler(
                queue_leaf_path(interface_key, queue_key, "name"),
                string_value(q.name.clone()),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(silent_handler()), vec![])
        }
        None => template_caps(true, true, true, vec![]),
    };
    state.attach(TreeNode::leaf("name", caps));
}

fn setup_queue_id(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    bound: Option<(&PortBinding, &QueueBinding)>,
    interface_key: &str,
    queue_key: &str,
) {
    let regs = vec![EventKind::PortQosCounters];
    let caps = match bound {
        Some((b, q)) => {
            let path = queue_leaf_path(interface_key, queue_key, "id");
            let project: Projector = Arc::new(|resp| match resp {
                DataResponse::QueueCounters(c) => Some(uint_value(c.queue_id as u64)),
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::QueueCounters {
                    node_id: b.node_id,
                    port_id: b.port_id,
                    queue_id: q.queue_id,
                },
                path.clone(),
                project,
            );
            let (node_id, port_id, queue_id) = (b.node_id, b.port_id, q.queue_id);
            let change = change_handler(
                path,
                Arc::new(move |event| match event {
                    GnmiEvent::PortQosCountersChanged {
                        node_id: n,
                        port_id: p,
                        counters,
                    } if *n == node_id && *p == port_id && counters.queue_id == queue_id => {
                        Some(uint_value(queue_id as u64))
                    }
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf("id", caps));
}

type QueueCounterField = fn(&QueueCounters) -> u64;

const QUEUE_COUNTER_LEAVES: &[(&str, QueueCounterField)] = &[
    ("transmit-pkts", |c| c.transmit_pkts),
    ("transmit-octets", |c| c.transmit_octets),
    ("dropped-pkts", |c| c.dropped_pkts),
];

#[allow(clippy::too_many_arguments)]
fn setup_queue_counter(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    bound: Option<(&PortBinding, &QueueBinding)>,
    interface_key: &str,
    queue_key: &str,
    leaf: &str,
    field: QueueCounterField,
) {
    let regs = vec![EventKind::PortQosCounters];
    let caps = match bound {
        Some((b, q)) => {
            let path = queue_leaf_path(interface_key, queue_key, leaf);
            let project: Projector = Arc::new(move |resp| match resp {
                DataResponse::QueueCounters(c) => Some(uint_value(field(&c))),
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::QueueCounters {
                    node_id: b.node_id,
                    port_id: b.port_id,
                    queue_id: q.queue_id,
                },
                path.clone(),
                project,
            );
            let (node_id, port_id, queue_id) = (b.node_id, b.port_id, q.queue_id);
            let change = change_handler(
                path,
                Arc::new(move |event| match event {
                    GnmiEvent::PortQosCountersChanged {
                        node_id: n,
                        port_id: p,
                        counters,
                    } if *n == node_id && *p == port_id && counters.queue_id == queue_id => {
                        Some(uint_value(field(counters)))
                    }
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf(leaf, caps));
}
