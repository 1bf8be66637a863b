// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Value model exchanged with the switch backend. The backend is opaque to
// the rest of gneiss: the telemetry engine only builds `DataRequest`s,
// receives `DataResponse`s through a one-shot writer, and consumes the
// event stream.

/// Operational state of a port as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Unknown,
    Up,
    Down,
    Failed,
}

/// Administrative state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminState {
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmSeverity {
    #[default]
    Unknown,
    Minor,
    Warning,
    Critical,
}

/// Per-port packet and octet counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub in_octets: u64,
    pub out_octets: u64,
    pub in_unicast_pkts: u64,
    pub out_unicast_pkts: u64,
    pub in_broadcast_pkts: u64,
    pub out_broadcast_pkts: u64,
    pub in_multicast_pkts: u64,
    pub out_multicast_pkts: u64,
    pub in_discards: u64,
    pub out_discards: u64,
    pub in_unknown_protos: u64,
    pub in_errors: u64,
    pub out_errors: u64,
    pub in_fcs_errors: u64,
}

/// Per-queue egress counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCounters {
    pub queue_id: u32,
    pub transmit_pkts: u64,
    pub transmit_octets: u64,
    pub dropped_pkts: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alarm {
    pub description: String,
    pub severity: AlarmSeverity,
    pub status: bool,
    pub time_created: u64,
}

/// A single-port configuration entry, as pushed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingletonPort {
    pub name: String,
    pub node_id: u64,
    pub port_id: u32,
    pub speed_bps: u64,
}

/// Per-queue QoS configuration for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QosQueueConfig {
    pub queue_id: u32,
    pub purpose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub qos_configs: Vec<QosQueueConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chassis {
    pub name: String,
}

/// The device-level configuration carried by a config push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub chassis: Chassis,
    pub ports: Vec<SingletonPort>,
    pub node_configs: Vec<(u64, NodeConfig)>,
}

impl DeviceConfig {
    pub fn node_config(&self, node_id: u64) -> NodeConfig {
        self.node_configs
            .iter()
            .find(|(id, _)| *id == node_id)
            .map(|(_, cfg)| cfg.clone())
            .unwrap_or_default()
    }
}

/// One field selector sent to the backend. Port-scoped selectors carry the
/// backend identity of the port; queue selectors additionally carry the
/// queue id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRequest {
    OperStatus { node_id: u64, port_id: u32 },
    AdminStatus { node_id: u64, port_id: u32 },
    PortSpeed { node_id: u64, port_id: u32 },
    NegotiatedPortSpeed { node_id: u64, port_id: u32 },
    MacAddress { node_id: u64, port_id: u32 },
    LacpSystemPriority { node_id: u64, port_id: u32 },
    LacpSystemIdMac { node_id: u64, port_id: u32 },
    PortCounters { node_id: u64, port_id: u32 },
    QueueCounters { node_id: u64, port_id: u32, queue_id: u32 },
    MemoryErrorAlarm,
    FlowProgrammingExceptionAlarm,
}

/// The typed value produced by the backend for one `DataRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataResponse {
    OperStatus(PortState),
    AdminStatus(AdminState),
    PortSpeed(u64),
    NegotiatedPortSpeed(u64),
    MacAddress(u64),
    LacpSystemPriority(u64),
    LacpSystemIdMac(u64),
    PortCounters(PortCounters),
    QueueCounters(QueueCounters),
    MemoryErrorAlarm(Alarm),
    FlowProgrammingExceptionAlarm(Alarm),
}
