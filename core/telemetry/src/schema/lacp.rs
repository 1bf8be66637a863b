// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// /lacp/interfaces/interface[name=K]/state subtree.

use std::sync::Arc;

use gneiss_hal::data::{DataRequest, DataResponse};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::SwitchInterface;
use gneiss_proto::api::gnmi::Path;

use crate::node::TreeNode;
use crate::paths::{PathBuilder, WILDCARD};
use crate::values::{mac_address_to_string, string_value, uint_value};

use super::helpers::{
    change_handler, keyed_child, leaf_caps, poll_handler, template_caps, Projector,
};
use super::PortBinding;

fn lacp_leaf_path(key: &str, leaf: &str) -> Path {
    PathBuilder::new()
        .elem("lacp")
        .elem("interfaces")
        .keyed_elem("interface", "name", key)
        .elem("state")
        .elem(leaf)
        .build()
}

pub(crate) fn add_lacp_instance(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
) {
    let key = binding.map(|b| b.name.clone()).unwrap_or_else(|| WILDCARD.to_string());
    let lacp = root.interior_child("lacp");
    let interfaces = lacp.interior_child("interfaces");
    let interface = keyed_child(&interfaces, "interface", "name");
    let instance = interface.attach(TreeNode::key_instance(&key));
    let state = instance.interior_child("state");

    setup_system_priority(&state, switch, binding, &key);
    setup_system_id_mac(&state, switch, binding, &key);
}

fn setup_system_priority(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let regs = vec![EventKind::PortLacpSystemPriority];
    let caps = match binding {
        Some(b) => {
            let path = lacp_leaf_path(key, "system-priority");
            let project: Projector = Arc::new(|resp| match resp {
                DataResponse::LacpSystemPriority(priority) => Some(uint_value(priority)),
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::LacpSystemPriority {
                    node_id: b.node_id,
                    port_id: b.port_id,
                },
                path.clone(),
                project,
            );
            let (node_id, port_id) = (b.node_id, b.port_id);
            let change = change_handler(
                path,
                Arc::new(move |event| match event {
                    GnmiEvent::PortLacpSystemPriorityChanged {
                        node_id: n,
                        port_id: p,
                        priority,
                    } if *n == node_id && *p == port_id => Some(uint_value(*priority)),
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf("system-priority", caps));
}

fn setup_system_id_mac(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let regs = vec![EventKind::PortLacpSystemIdMac];
    let caps = match binding {
        Some(b) => {
            let path = lacp_leaf_path(key, "system-id-mac");
            let project: Projector = Arc::new(|resp| match resp {
                DataResponse::LacpSystemIdMac(mac) => {
                    Some(string_value(mac_address_to_string(mac)))
                }
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::LacpSystemIdMac {
                    node_id: b.node_id,
                    port_id: b.port_id,
                },
                path.clone(),
                project,
            );
            let (node_id, port_id) = (b.node_id, b.port_id);
            let change = change_handler(
                path,
                Arc::new(move |event| match event {
                    GnmiEvent::PortLacpSystemIdMacChanged {
                        node_id: n,
                        port_id: p,
                        mac_address,
                    } if *n == node_id && *p == port_id => {
                        Some(string_value(mac_address_to_string(*mac_address)))
                    }
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf("system-id-mac", caps));
}
