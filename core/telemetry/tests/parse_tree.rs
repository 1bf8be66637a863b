// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Leaf-level behavior of the management tree: handler wiring, value
// encoding, alarm fan-out, and change registrations, driven through a
// scripted backend.

use std::sync::Arc;

use gneiss_hal::data::{
    AdminState, Alarm, AlarmSeverity, DataRequest, DataResponse, NodeConfig,
    PortCounters, PortState, QosQueueConfig, QueueCounters, SingletonPort,
};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::mock::MockSwitch;
use gneiss_proto::api::gnmi::{subscribe_response, typed_value, Path, SubscribeResponse};
use gneiss_telemetry::node::TreeNode;
use gneiss_telemetry::paths::PathBuilder;
use gneiss_telemetry::registry::EventHandlerRegistries;
use gneiss_telemetry::subscription::{EventHandlerRecord, GnmiSubscribeStream};
use gneiss_telemetry::tree::ParseTree;

const NODE_ID: u64 = 3;
const PORT_ID: u32 = 3;
const QUEUE_ID: u32 = 0;
const QUEUE_NAME: &str = "BE1";
const ALARM_DESCRIPTION: &str = "alarm";
const ALARM_TIME_CREATED: u64 = 12345;

struct Fixture {
    tree: ParseTree,
    switch: Arc<MockSwitch>,
}

fn fixture() -> Fixture {
    let switch = Arc::new(MockSwitch::new());
    let tree = ParseTree::new(switch.clone());
    tree.add_subtree_interface_from_singleton(
        &SingletonPort {
            name: "interface-1".to_string(),
            node_id: NODE_ID,
            port_id: PORT_ID,
            speed_bps: 25_000_000_000,
        },
        &NodeConfig {
            qos_configs: vec![QosQueueConfig {
                queue_id: QUEUE_ID,
                purpose: QUEUE_NAME.to_string(),
            }],
        },
    );
    tree.add_subtree_chassis(&gneiss_hal::data::Chassis {
        name: "chassis-1".to_string(),
    });
    Fixture { tree, switch }
}

fn interface_leaf(leaf: &str) -> Path {
    PathBuilder::new()
        .elem("interfaces")
        .keyed_elem("interface", "name", "interface-1")
        .elem("state")
        .elem(leaf)
        .build()
}

fn ethernet_leaf(group: &str, leaf: &str) -> Path {
    PathBuilder::new()
        .elem("interfaces")
        .keyed_elem("interface", "name", "interface-1")
        .elem("ethernet")
        .elem(group)
        .elem(leaf)
        .build()
}

fn queue_leaf(leaf: &str) -> Path {
    PathBuilder::new()
        .elem("qos")
        .elem("interfaces")
        .keyed_elem("interface", "name", "interface-1")
        .elem("output")
        .elem("queues")
        .keyed_elem("queue", "name", QUEUE_NAME)
        .elem("state")
        .elem(leaf)
        .build()
}

fn alarm_path(alarm: &str) -> Path {
    PathBuilder::new()
        .elem("components")
        .keyed_elem("component", "name", "chassis-1")
        .elem("chassis")
        .elem("alarms")
        .elem(alarm)
        .build()
}

#[derive(Clone, Copy)]
enum Discipline {
    Poll,
    Timer,
    Change,
}

/// Resolve `path`, run the requested handler with `event`, and collect
/// everything written to the stream.
async fn execute(
    fixture: &Fixture,
    path: &Path,
    discipline: Discipline,
    event: GnmiEvent,
) -> Vec<SubscribeResponse> {
    let node = fixture
        .tree
        .find_node(path)
        .unwrap_or_else(|| panic!("cannot find path {:?}", path));
    let handler = match discipline {
        Discipline::Poll => node.get_on_poll_handler(),
        Discipline::Timer => node.get_on_timer_handler(),
        Discipline::Change => node.get_on_change_handler(),
    }
    .unwrap();

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    handler(event, stream).await.unwrap();

    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg.unwrap());
    }
    out
}

fn single_update(resp: &SubscribeResponse) -> &typed_value::Value {
    match resp.response.as_ref().unwrap() {
        subscribe_response::Response::Update(n) => {
            assert_eq!(n.update.len(), 1, "every write carries exactly one update");
            n.update[0].val.as_ref().unwrap().value.as_ref().unwrap()
        }
        other => panic!("expected update, got {:?}", other),
    }
}

fn assert_string(resp: &SubscribeResponse, want: &str) {
    match single_update(resp) {
        typed_value::Value::StringVal(s) => assert_eq!(s, want),
        other => panic!("expected string {:?}, got {:?}", want, other),
    }
}

fn assert_uint(resp: &SubscribeResponse, want: u64) {
    match single_update(resp) {
        typed_value::Value::UintVal(v) => assert_eq!(*v, want),
        other => panic!("expected uint {}, got {:?}", want, other),
    }
}

fn assert_bool(resp: &SubscribeResponse, want: bool) {
    match single_update(resp) {
        typed_value::Value::BoolVal(v) => assert_eq!(*v, want),
        other => panic!("expected bool {}, got {:?}", want, other),
    }
}

#[tokio::test]
async fn oper_status_on_poll() {
    let f = fixture();
    f.switch.push_response(DataResponse::OperStatus(PortState::Up));

    let out = execute(
        &f,
        &interface_leaf("oper-status"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_string(&out[0], "UP");
    assert_eq!(
        f.switch.requests(),
        vec![(
            NODE_ID,
            DataRequest::OperStatus {
                node_id: NODE_ID,
                port_id: PORT_ID
            }
        )]
    );
}

#[tokio::test]
async fn oper_status_on_timer_uses_backend() {
    let f = fixture();
    f.switch.push_response(DataResponse::OperStatus(PortState::Up));

    let out = execute(
        &f,
        &interface_leaf("oper-status"),
        Discipline::Timer,
        GnmiEvent::Timer,
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_string(&out[0], "UP");
}

#[tokio::test]
async fn oper_status_on_change() {
    let f = fixture();
    let out = execute(
        &f,
        &interface_leaf("oper-status"),
        Discipline::Change,
        GnmiEvent::PortOperStateChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            state: PortState::Up,
        },
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_string(&out[0], "UP");
}

#[tokio::test]
async fn oper_status_on_change_ignores_other_ports() {
    let f = fixture();
    let out = execute(
        &f,
        &interface_leaf("oper-status"),
        Discipline::Change,
        GnmiEvent::PortOperStateChanged {
            node_id: NODE_ID,
            port_id: PORT_ID + 1,
            state: PortState::Up,
        },
    )
    .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn admin_status_enabled_renders_as_up() {
    let f = fixture();
    f.switch
        .push_response(DataResponse::AdminStatus(AdminState::Enabled));

    let out = execute(
        &f,
        &interface_leaf("admin-status"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "UP");

    let out = execute(
        &f,
        &interface_leaf("admin-status"),
        Discipline::Change,
        GnmiEvent::PortAdminStateChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            state: AdminState::Enabled,
        },
    )
    .await;
    assert_string(&out[0], "UP");
}

#[tokio::test]
async fn name_and_ifindex_answer_without_backend() {
    let f = fixture();
    let out = execute(&f, &interface_leaf("name"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_string(&out[0], "interface-1");

    let out = execute(
        &f,
        &interface_leaf("ifindex"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_uint(&out[0], PORT_ID as u64);

    assert!(f.switch.requests().is_empty());
}

#[tokio::test]
async fn mac_address_formatting() {
    let f = fixture();
    f.switch
        .push_response(DataResponse::MacAddress(0x112233445566));

    let out = execute(
        &f,
        &ethernet_leaf("state", "mac-address"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "11:22:33:44:55:66");

    let out = execute(
        &f,
        &ethernet_leaf("state", "mac-address"),
        Discipline::Change,
        GnmiEvent::PortMacAddressChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            mac_address: 0x112233445566,
        },
    )
    .await;
    assert_string(&out[0], "11:22:33:44:55:66");
}

#[tokio::test]
async fn config_mac_address_is_constant() {
    let f = fixture();
    let out = execute(
        &f,
        &ethernet_leaf("config", "mac-address"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "11:22:33:44:55:66");
    assert!(f.switch.requests().is_empty());
}

#[tokio::test]
async fn port_speed_renders_as_speed_enum() {
    let f = fixture();
    f.switch
        .push_response(DataResponse::PortSpeed(25_000_000_000));

    let out = execute(
        &f,
        &ethernet_leaf("state", "port-speed"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "SPEED_25GB");

    let out = execute(
        &f,
        &ethernet_leaf("state", "port-speed"),
        Discipline::Change,
        GnmiEvent::PortSpeedBpsChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            speed_bps: 25_000_000_000,
        },
    )
    .await;
    assert_string(&out[0], "SPEED_25GB");

    // Configured speed comes from the port config, not the backend.
    let out = execute(
        &f,
        &ethernet_leaf("config", "port-speed"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "SPEED_25GB");
}

#[tokio::test]
async fn negotiated_port_speed() {
    let f = fixture();
    f.switch
        .push_response(DataResponse::NegotiatedPortSpeed(25_000_000_000));

    let out = execute(
        &f,
        &ethernet_leaf("state", "negotiated-port-speed"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;
    assert_string(&out[0], "SPEED_25GB");
}

#[tokio::test]
async fn counters_pass_through() {
    let f = fixture();
    f.switch.push_response(DataResponse::PortCounters(PortCounters {
        in_octets: 5,
        ..Default::default()
    }));

    let path = PathBuilder::new()
        .elem("interfaces")
        .keyed_elem("interface", "name", "interface-1")
        .elem("state")
        .elem("counters")
        .elem("in-octets")
        .build();

    let out = execute(&f, &path, Discipline::Poll, GnmiEvent::Poll).await;
    assert_eq!(out.len(), 1);
    assert_uint(&out[0], 5);

    // OnChange projects straight out of the event payload, no backend call.
    let calls_before = f.switch.requests().len();
    let out = execute(
        &f,
        &path,
        Discipline::Change,
        GnmiEvent::PortCountersChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            counters: PortCounters {
                in_octets: 5,
                ..Default::default()
            },
        },
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_uint(&out[0], 5);
    assert_eq!(f.switch.requests().len(), calls_before);
}

#[tokio::test]
async fn lacp_leaves() {
    let f = fixture();
    let base = |leaf: &str| {
        PathBuilder::new()
            .elem("lacp")
            .elem("interfaces")
            .keyed_elem("interface", "name", "interface-1")
            .elem("state")
            .elem(leaf)
            .build()
    };

    f.switch.push_response(DataResponse::LacpSystemPriority(5));
    let out = execute(&f, &base("system-priority"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_uint(&out[0], 5);

    let out = execute(
        &f,
        &base("system-priority"),
        Discipline::Change,
        GnmiEvent::PortLacpSystemPriorityChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            priority: 5,
        },
    )
    .await;
    assert_uint(&out[0], 5);

    f.switch
        .push_response(DataResponse::LacpSystemIdMac(0x112233445566));
    let out = execute(&f, &base("system-id-mac"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_string(&out[0], "11:22:33:44:55:66");
}

#[tokio::test]
async fn qos_queue_leaves() {
    let f = fixture();

    let out = execute(&f, &queue_leaf("name"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_string(&out[0], QUEUE_NAME);

    f.switch.push_response(DataResponse::QueueCounters(QueueCounters {
        queue_id: QUEUE_ID,
        ..Default::default()
    }));
    let out = execute(&f, &queue_leaf("id"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_uint(&out[0], QUEUE_ID as u64);

    f.switch.push_response(DataResponse::QueueCounters(QueueCounters {
        queue_id: QUEUE_ID,
        transmit_pkts: 20,
        transmit_octets: 30,
        dropped_pkts: 40,
    }));
    let out = execute(&f, &queue_leaf("transmit-pkts"), Discipline::Poll, GnmiEvent::Poll).await;
    assert_uint(&out[0], 20);

    let counters_event = GnmiEvent::PortQosCountersChanged {
        node_id: NODE_ID,
        port_id: PORT_ID,
        counters: QueueCounters {
            queue_id: QUEUE_ID,
            transmit_pkts: 20,
            transmit_octets: 30,
            dropped_pkts: 40,
        },
    };
    let out = execute(&f, &queue_leaf("transmit-octets"), Discipline::Change, counters_event.clone()).await;
    assert_uint(&out[0], 30);
    let out = execute(&f, &queue_leaf("dropped-pkts"), Discipline::Change, counters_event.clone()).await;
    assert_uint(&out[0], 40);

    // Events for another queue are not this queue's business.
    let out = execute(
        &f,
        &queue_leaf("transmit-octets"),
        Discipline::Change,
        GnmiEvent::PortQosCountersChanged {
            node_id: NODE_ID,
            port_id: PORT_ID,
            counters: QueueCounters {
                queue_id: QUEUE_ID + 1,
                transmit_octets: 30,
                ..Default::default()
            },
        },
    )
    .await;
    assert!(out.is_empty());
}

fn alarm_response(field: usize) -> DataResponse {
    let alarm = match field {
        0 => Alarm {
            description: ALARM_DESCRIPTION.to_string(),
            ..Default::default()
        },
        1 => Alarm {
            severity: AlarmSeverity::Critical,
            ..Default::default()
        },
        2 => Alarm {
            status: true,
            ..Default::default()
        },
        _ => Alarm {
            time_created: ALARM_TIME_CREATED,
            ..Default::default()
        },
    };
    DataResponse::MemoryErrorAlarm(alarm)
}

#[tokio::test]
async fn memory_error_alarm_on_poll_fans_out() {
    let f = fixture();
    for field in 0..4 {
        f.switch.push_response(alarm_response(field));
    }

    let out = execute(
        &f,
        &alarm_path("memory-error"),
        Discipline::Poll,
        GnmiEvent::Poll,
    )
    .await;

    // Four backend retrievals, four writes, in report order.
    assert_eq!(f.switch.requests().len(), 4);
    assert_eq!(out.len(), 4);
    assert_string(&out[0], ALARM_DESCRIPTION);
    assert_string(&out[1], "CRITICAL");
    assert_bool(&out[2], true);
    assert_uint(&out[3], ALARM_TIME_CREATED);
}

#[tokio::test]
async fn flow_programming_exception_alarm_on_change_fans_out() {
    let f = fixture();
    let out = execute(
        &f,
        &alarm_path("flow-programming-exception"),
        Discipline::Change,
        GnmiEvent::FlowProgrammingExceptionAlarm {
            time_created: ALARM_TIME_CREATED,
            description: ALARM_DESCRIPTION.to_string(),
        },
    )
    .await;

    assert_eq!(out.len(), 4);
    assert_string(&out[0], ALARM_DESCRIPTION);
    assert_string(&out[1], "CRITICAL");
    assert_bool(&out[2], true);
    assert_uint(&out[3], ALARM_TIME_CREATED);
}

#[tokio::test]
async fn alarm_subleaves_answer_individually() {
    let f = fixture();

    let status_path = PathBuilder::new()
        .elem("components")
        .keyed_elem("component", "name", "chassis-1")
        .elem("chassis")
        .elem("alarms")
        .elem("memory-error")
        .elem("status")
        .build();
    f.switch.push_response(DataResponse::MemoryErrorAlarm(Alarm {
        status: true,
        ..Default::default()
    }));
    let out = execute(&f, &status_path, Discipline::Poll, GnmiEvent::Poll).await;
    assert_eq!(out.len(), 1);
    assert_bool(&out[0], true);

    let out = execute(
        &f,
        &status_path,
        Discipline::Change,
        GnmiEvent::MemoryErrorAlarm {
            time_created: ALARM_TIME_CREATED,
            description: ALARM_DESCRIPTION.to_string(),
        },
    )
    .await;
    assert_bool(&out[0], true);
}

fn registration_handle() -> (EventHandlerRegistries, Arc<EventHandlerRecord>) {
    use futures::FutureExt;
    let registries = EventHandlerRegistries::new();
    let handle = Arc::new(EventHandlerRecord::new(
        Arc::new(|_event, _stream| async move { Ok(()) }.boxed()),
        GnmiSubscribeStream::sink(),
    ));
    (registries, handle)
}

#[tokio::test]
async fn interface_subtree_registrations() {
    let f = fixture();
    let node = f
        .tree
        .find_node(
            &PathBuilder::new()
                .elem("interfaces")
                .elem("interface")
                .elem("...")
                .build(),
        )
        .unwrap();

    let (registries, handle) = registration_handle();
    node.do_on_change_registration(&registries, &handle);

    let count = |kind: EventKind| registries.registry(kind).number_of_registered_handlers();
    assert_eq!(count(EventKind::PortOperState), 1);
    assert_eq!(count(EventKind::PortAdminState), 1);
    assert_eq!(count(EventKind::PortSpeedBps), 1);
    assert_eq!(count(EventKind::PortNegotiatedSpeedBps), 1);
    assert_eq!(count(EventKind::PortMacAddress), 1);
    assert_eq!(count(EventKind::PortCounters), 1);
    assert_eq!(count(EventKind::PortLacpSystemPriority), 0);
    assert_eq!(count(EventKind::PortLacpSystemIdMac), 0);
    assert_eq!(count(EventKind::ConfigPushed), 0);
    assert_eq!(count(EventKind::MemoryErrorAlarm), 0);
    assert_eq!(count(EventKind::FlowProgrammingExceptionAlarm), 0);
}

#[tokio::test]
async fn alarm_subtree_registrations() {
    let f = fixture();
    let subtree = f
        .tree
        .find_node(
            &PathBuilder::new()
                .elem("components")
                .elem("component")
                .elem("chassis")
                .elem("alarms")
                .build(),
        )
        .unwrap();

    let (registries, handle) = registration_handle();
    subtree.do_on_change_registration(&registries, &handle);

    let count = |kind: EventKind| registries.registry(kind).number_of_registered_handlers();
    assert_eq!(count(EventKind::MemoryErrorAlarm), 1);
    assert_eq!(count(EventKind::FlowProgrammingExceptionAlarm), 1);
    assert_eq!(count(EventKind::PortOperState), 0);
    assert_eq!(count(EventKind::PortCounters), 0);
}

#[tokio::test]
async fn tree_path_round_trip() {
    let f = fixture();
    fn walk(root: &Arc<TreeNode>, node: &Arc<TreeNode>) {
        let path = node.get_path();
        let resolved = root.find_node(&path).unwrap();
        assert!(Arc::ptr_eq(&resolved, node));
        for child in node.children_sorted() {
            walk(root, &child);
        }
    }
    let root = f.tree.root();
    for child in root.children_sorted() {
        walk(root, &child);
    }
}
