// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// /interfaces/interface[name=K]/{state,ethernet} subtree. One setup
// function per leaf, invoked for the wildcard template and for every
// concrete port instance.

use std::sync::Arc;

use gneiss_hal::data::{DataRequest, DataResponse, PortCounters};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::SwitchInterface;
use gneiss_proto::api::gnmi::{Path, SubscriptionMode};

use crate::node::{NodeCapabilities, TreeNode};
use crate::paths::{PathBuilder, WILDCARD};
use crate::values::{
    admin_state_to_string, mac_address_to_string, port_state_to_string,
    speed_bps_to_string, string_value, uint_value,
};

use super::helpers::{
    change_handler, constant_handler, keyed_child, leaf_caps, poll_handler,
    silent_handler, template_caps, Projector,
};
use super::{PortBinding, COUNTERS_SAMPLE_INTERVAL_MS, DEFAULT_CONFIG_MAC_ADDRESS};

fn interface_path(key: &str) -> PathBuilder {
    PathBuilder::new()
        .elem("interfaces")
        .keyed_elem("interface", "name", key)
}

fn state_leaf_path(key: &str, leaf: &str) -> Path {
    interface_path(key).elem("state").elem(leaf).build()
}

fn counters_leaf_path(key: &str, leaf: &str) -> Path {
    interface_path(key)
        .elem("state")
        .elem("counters")
        .elem(leaf)
        .build()
}

fn ethernet_leaf_path(key: &str, group: &str, leaf: &str) -> Path {
    interface_path(key).elem("ethernet").elem(group).elem(leaf).build()
}

pub(crate) fn add_interface_instance(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
) {
    let key = binding.map(|b| b.name.clone()).unwrap_or_else(|| WILDCARD.to_string());
    let interfaces = root.interior_child("interfaces");
    let interface = keyed_child(&interfaces, "interface", "name");
    let instance = interface.attach(TreeNode::key_instance(&key));

    let state = instance.interior_child("state");
    setup_ifindex(&state, binding, &key);
    setup_name(&state, binding, &key);
    setup_oper_status(&state, switch, binding, &key);
    setup_admin_status(&state, switch, binding, &key);
    setup_state_mac_address(&state, switch, binding, &key);
    setup_counters(&state, switch, binding, &key);

    let ethernet = instance.interior_child("ethernet");
    let eth_state = ethernet.interior_child("state");
    setup_ethernet_mac_address(&eth_state, switch, binding, &key);
    setup_ethernet_port_speed(&eth_state, switch, binding, &key);
    setup_ethernet_negotiated_port_speed(&eth_state, switch, binding, &key);

    let eth_config = ethernet.interior_child("config");
    setup_config_mac_address(&eth_config, binding, &key);
    setup_config_port_speed(&eth_config, binding, &key);
}

fn setup_ifindex(state: &Arc<TreeNode>, binding: Option<&PortBinding>, key: &str) {
    let caps = match binding {
        Some(b) => {
            let poll = constant_handler(
                state_leaf_path(key, "ifindex"),
                uint_value(b.port_id as u64),
            );
            leaf_caps(Some(poll), None, Some(silent_handler()), vec![])
        }
        None => template_caps(true, false, true, vec![]),
    };
    state.attach(TreeNode::leaf("ifindex", caps));
}

fn setup_name(state: &Arc<TreeNode>, binding: Option<&PortBinding>, key: &str) {
    let caps = match binding {
        Some(b) => {
            let poll = constant_handler(
                state_leaf_path(key, "name"),
                string_value(b.name.clone()),
            );
            leaf_caps(Some(poll), None, Some(silent_handler()), vec![])
        }
        None => template_caps(true, false, true, vec![]),
    };
    state.attach(TreeNode::leaf("name", caps));
}

fn setup_oper_status(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let regs = vec![EventKind::PortOperState];
    let caps = match binding {
        Some(b) => {
            let path = state_leaf_path(key, "oper-status");
            let project: Projector = Arc::new(|resp| match resp {
                DataResponse::OperStatus(s) => {
                    Some(string_value(port_state_to_string(s)))
                }
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::OperStatus {
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
                    GnmiEvent::PortOperStateChanged {
                        node_id: n,
                        port_id: p,
                        state,
                    } if *n == node_id && *p == port_id => {
                        Some(string_value(port_state_to_string(*state)))
                    }
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf("oper-status", caps));
}

fn setup_admin_status(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let regs = vec![EventKind::PortAdminState];
    let caps = match binding {
        Some(b) => {
            let path = state_leaf_path(key, "admin-status");
            let project: Projector = Arc::new(|resp| match resp {
                DataResponse::AdminStatus(s) => {
                    Some(string_value(admin_state_to_string(s)))
                }
                _ => None,
            });
            let poll = poll_handler(
                switch.clone(),
                b.node_id,
                DataRequest::AdminStatus {
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
                    GnmiEvent::PortAdminStateChanged {
                        node_id: n,
                        port_id: p,
                        state,
                    } if *n == node_id && *p == port_id => {
                        Some(string_value(admin_state_to_string(*state)))
                    }
                    _ => None,
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs)
        }
        None => template_caps(true, true, true, regs),
    };
    state.attach(TreeNode::leaf("admin-status", caps));
}

fn mac_address_leaf(
    switch: &Arc<dyn SwitchInterface>,
    binding: &PortBinding,
    path: Path,
) -> NodeCapabilities {
    let project: Projector = Arc::new(|resp| match resp {
        DataResponse::MacAddress(mac) => Some(string_value(mac_address_to_string(mac))),
        _ => None,
    });
    let poll = poll_handler(
        switch.clone(),
        binding.node_id,
        DataRequest::MacAddress {
            node_id: binding.node_id,
            port_id: binding.port_id,
        },
        path.clone(),
        project,
    );
    let (node_id, port_id) = (binding.node_id, binding.port_id);
    let change = change_handler(
        path,
        Arc::new(move |event| match event {
            GnmiEvent::PortMacAddressChanged {
                node_id: n,
                port_id: p,
                mac_address,
            } if *n == node_id && *p == port_id => {
                Some(string_value(mac_address_to_string(*mac_address)))
            }
            _ => None,
        }),
    );
    leaf_caps(
        Some(poll.clone()),
        Some(poll),
        Some(change),
        vec![EventKind::PortMacAddress],
    )
}

fn setup_state_mac_address(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(b) => mac_address_leaf(switch, b, state_leaf_path(key, "mac-address")),
        None => template_caps(true, true, true, vec![EventKind::PortMacAddress]),
    };
    state.attach(TreeNode::leaf("mac-address", caps));
}

type CounterField = fn(&PortCounters) -> u64;

const COUNTER_LEAVES: &[(&str, CounterField)] = &[
    ("in-octets", |c| c.in_octets),
    ("out-octets", |c| c.out_octets),
    ("in-unicast-pkts", |c| c.in_unicast_pkts),
    ("out-unicast-pkts", |c| c.out_unicast_pkts),
    ("in-broadcast-pkts", |c| c.in_broadcast_pkts),
    ("out-broadcast-pkts", |c| c.out_broadcast_pkts),
    ("in-multicast-pkts", |c| c.in_multicast_pkts),
    ("out-multicast-pkts", |c| c.out_multicast_pkts),
    ("in-discards", |c| c.in_discards),
    ("out-discards", |c| c.out_discards),
    ("in-unknown-protos", |c| c.in_unknown_protos),
    ("in-errors", |c| c.in_errors),
    ("out-errors", |c| c.out_errors),
    ("in-fcs-errors", |c| c.in_fcs_errors),
];

fn setup_counters(
    state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let counters = state.interior_child("counters");
    counters.set_target_defined_mode(Arc::new(|sub| {
        sub.mode = SubscriptionMode::Sample as i32;
        sub.sample_interval = COUNTERS_SAMPLE_INTERVAL_MS;
        Ok(())
    }));

    for (leaf, field) in COUNTER_LEAVES {
        let caps = match binding {
            Some(b) => {
                let path = counters_leaf_path(key, leaf);
                let field = *field;
                let project: Projector = Arc::new(move |resp| match resp {
                    DataResponse::PortCounters(c) => Some(uint_value(field(&c))),
                    _ => None,
                });
                let poll = poll_handler(
                    switch.clone(),
                    b.node_id,
                    DataRequest::PortCounters {
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
                        GnmiEvent::PortCountersChanged {
                            node_id: n,
                            port_id: p,
                            counters,
                        } if *n == node_id && *p == port_id => {
                            Some(uint_value(field(counters)))
                        }
                        _ => None,
                    }),
                );
                leaf_caps(
                    Some(poll.clone()),
                    Some(poll),
                    Some(change),
                    vec![EventKind::PortCounters],
                )
            }
            None => template_caps(true, true, true, vec![EventKind::PortCounters]),
        };
        counters.attach(TreeNode::leaf(leaf, caps));
    }
}

fn speed_leaf(
    switch: &Arc<dyn SwitchInterface>,
    binding: &PortBinding,
    path: Path,
    negotiated: bool,
) -> NodeCapabilities {
    let request = if negotiated {
        DataRequest::NegotiatedPortSpeed {
            node_id: binding.node_id,
            port_id: binding.port_id,
        }
    } else {
        DataRequest::PortSpeed {
            node_id: binding.node_id,
            port_id: binding.port_id,
        }
    };
    let project: Projector = Arc::new(move |resp| match (negotiated, resp) {
        (false, DataResponse::PortSpeed(bps))
        | (true, DataResponse::NegotiatedPortSpeed(bps)) => {
            Some(string_value(speed_bps_to_string(bps)))
        }
        _ => None,
    });
    let poll = poll_handler(
        switch.clone(),
        binding.node_id,
        request,
        path.clone(),
        project,
    );
    let (node_id, port_id) = (binding.node_id, binding.port_id);
    let change = change_handler(
        path,
        Arc::new(move |event| match event {
            GnmiEvent::PortSpeedBpsChanged {
                node_id: n,
                port_id: p,
                speed_bps,
            } if !negotiated && *n == node_id && *p == port_id => {
                Some(string_value(speed_bps_to_string(*speed_bps)))
            }
            GnmiEvent::PortNegotiatedSpeedBpsChanged {
                node_id: n,
                port_id: p,
                speed_bps,
            } if negotiated && *n == node_id && *p == port_id => {
                Some(string_value(speed_bps_to_string(*speed_bps)))
            }
            _ => None,
        }),
    );
    let registration = if negotiated {
        EventKind::PortNegotiatedSpeedBps
    } else {
        EventKind::PortSpeedBps
    };
    leaf_caps(Some(poll.clone()), Some(poll), Some(change), vec![registration])
}

fn setup_ethernet_mac_address(
    eth_state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(b) => mac_address_leaf(switch, b, ethernet_leaf_path(key, "state", "mac-address")),
        None => template_caps(true, true, true, vec![EventKind::PortMacAddress]),
    };
    eth_state.attach(TreeNode::leaf("mac-address", caps));
}

fn setup_ethernet_port_speed(
    eth_state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(b) => speed_leaf(
            switch,
            b,
            ethernet_leaf_path(key, "state", "port-speed"),
            false,
        ),
        None => template_caps(true, true, true, vec![EventKind::PortSpeedBps]),
    };
    eth_state.attach(TreeNode::leaf("port-speed", caps));
}

fn setup_ethernet_negotiated_port_speed(
    eth_state: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(b) => speed_leaf(
            switch,
            b,
            ethernet_leaf_path(key, "state", "negotiated-port-speed"),
            true,
        ),
        None => template_caps(true, true, true, vec![EventKind::PortNegotiatedSpeedBps]),
    };
    eth_state.attach(TreeNode::leaf("negotiated-port-speed", caps));
}

fn setup_config_mac_address(
    eth_config: &Arc<TreeNode>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(_) => {
            let poll = constant_handler(
                ethernet_leaf_path(key, "config", "mac-address"),
                string_value(mac_address_to_string(DEFAULT_CONFIG_MAC_ADDRESS)),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(silent_handler()), vec![])
        }
        None => template_caps(true, true, true, vec![]),
    };
    eth_config.attach(TreeNode::leaf("mac-address", caps));
}

fn setup_config_port_speed(
    eth_config: &Arc<TreeNode>,
    binding: Option<&PortBinding>,
    key: &str,
) {
    let caps = match binding {
        Some(b) => {
            let poll = constant_handler(
                ethernet_leaf_path(key, "config", "port-speed"),
                string_value(speed_bps_to_string(b.speed_bps)),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(silent_handler()), vec![])
        }
        None => template_caps(true, true, true, vec![]),
    };
    eth_config.attach(TreeNode::leaf("port-speed", caps));
}
