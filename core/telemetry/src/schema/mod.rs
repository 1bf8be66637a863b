// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Schema construction. Each submodule owns one top-level subtree of the
// management tree and exposes a single instantiation function used both for
// the wildcard template (no binding) and for concrete per-port or
// per-chassis instances (bound to backend identities). Template and
// concrete leaves share the same capability profile; template handlers are
// silent.

mod components;
mod helpers;
mod interfaces;
mod lacp;
mod qos;

use std::sync::Arc;

use gneiss_hal::data::{Chassis, NodeConfig, SingletonPort};
use gneiss_hal::switch::SwitchInterface;

use crate::node::TreeNode;

/// Sample interval assigned by target-defined mode on counter subtrees.
pub const COUNTERS_SAMPLE_INTERVAL_MS: u64 = 10_000;

/// Placeholder configured MAC until the port configuration carries one.
pub(crate) const DEFAULT_CONFIG_MAC_ADDRESS: u64 = 0x112233445566;

/// Backend identity a concrete leaf closes over.
#[derive(Debug, Clone)]
pub(crate) struct PortBinding {
    pub name: String,
    pub node_id: u64,
    pub port_id: u32,
    pub speed_bps: u64,
}

impl PortBinding {
    pub(crate) fn from_port(port: &SingletonPort) -> Self {
        Self {
            name: port.name.clone(),
            node_id: port.node_id,
            port_id: port.port_id,
            speed_bps: port.speed_bps,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QueueBinding {
    pub name: String,
    pub queue_id: u32,
}

/// Build the wildcard templates present before any configuration arrives.
pub(crate) fn build_static_schema(root: &Arc<TreeNode>, switch: &Arc<dyn SwitchInterface>) {
    interfaces::add_interface_instance(root, switch, None);
    lacp::add_lacp_instance(root, switch, None);
    qos::add_qos_instance(root, switch, None, &[]);
    components::add_chassis_instance(root, switch, None);
}

/// Instantiate every per-port subtree for `port`.
pub(crate) fn add_interface_subtrees(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    port: &SingletonPort,
    node_config: &NodeConfig,
) {
    let binding = PortBinding::from_port(port);
    let queues: Vec<QueueBinding> = node_config
        .qos_configs
        .iter()
        .map(|q| QueueBinding {
            name: q.purpose.clone(),
            queue_id: q.queue_id,
        })
        .collect();

    interfaces::add_interface_instance(root, switch, Some(&binding));
    lacp::add_lacp_instance(root, switch, Some(&binding));
    qos::add_qos_instance(root, switch, Some(&binding), &queues);
}

/// Instantiate the chassis component subtree.
pub(crate) fn add_chassis_subtree(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    chassis: &Chassis,
) {
    components::add_chassis_instance(root, switch, Some(&chassis.name));
}
