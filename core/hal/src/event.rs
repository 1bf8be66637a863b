// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use crate::data::{
    AdminState, DeviceConfig, PortCounters, PortState, QueueCounters,
};

/// An event emitted by the switch backend (or synthesized by the telemetry
/// engine for timer and poll deliveries). Each variant has its own handler
/// registry on the publisher side.
#[derive(Debug, Clone)]
pub enum GnmiEvent {
    PortOperStateChanged {
        node_id: u64,
        port_id: u32,
        state: PortState,
    },
    PortAdminStateChanged {
        node_id: u64,
        port_id: u32,
        state: AdminState,
    },
    PortSpeedBpsChanged {
        node_id: u64,
        port_id: u32,
        speed_bps: u64,
    },
    PortNegotiatedSpeedBpsChanged {
        node_id: u64,
        port_id: u32,
        speed_bps: u64,
    },
    PortLacpSystemPriorityChanged {
        node_id: u64,
        port_id: u32,
        priority: u64,
    },
    PortLacpSystemIdMacChanged {
        node_id: u64,
        port_id: u32,
        mac_address: u64,
    },
    PortMacAddressChanged {
        node_id: u64,
        port_id: u32,
        mac_address: u64,
    },
    PortCountersChanged {
        node_id: u64,
        port_id: u32,
        counters: PortCounters,
    },
    PortQosCountersChanged {
        node_id: u64,
        port_id: u32,
        counters: QueueCounters,
    },
    MemoryErrorAlarm {
        time_created: u64,
        description: String,
    },
    FlowProgrammingExceptionAlarm {
        time_created: u64,
        description: String,
    },
    ConfigHasBeenPushed {
        config: DeviceConfig,
    },
    Timer,
    Poll,
}

/// The statically-known variant tag of a `GnmiEvent`, used to key handler
/// registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PortOperState,
    PortAdminState,
    PortSpeedBps,
    PortNegotiatedSpeedBps,
    PortLacpSystemPriority,
    PortLacpSystemIdMac,
    PortMacAddress,
    PortCounters,
    PortQosCounters,
    MemoryErrorAlarm,
    FlowProgrammingExceptionAlarm,
    ConfigPushed,
    Timer,
    Poll,
}

impl EventKind {
    pub const ALL: [EventKind; 14] = [
        EventKind::PortOperState,
        EventKind::PortAdminState,
        EventKind::PortSpeedBps,
        EventKind::PortNegotiatedSpeedBps,
        EventKind::PortLacpSystemPriority,
        EventKind::PortLacpSystemIdMac,
        EventKind::PortMacAddress,
        EventKind::PortCounters,
        EventKind::PortQosCounters,
        EventKind::MemoryErrorAlarm,
        EventKind::FlowProgrammingExceptionAlarm,
        EventKind::ConfigPushed,
        EventKind::Timer,
        EventKind::Poll,
    ];
}

impl GnmiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GnmiEvent::PortOperStateChanged { .. } => EventKind::PortOperState,
            GnmiEvent::PortAdminStateChanged { .. } => EventKind::PortAdminState,
            GnmiEvent::PortSpeedBpsChanged { .. } => EventKind::PortSpeedBps,
            GnmiEvent::PortNegotiatedSpeedBpsChanged { .. } => {
                EventKind::PortNegotiatedSpeedBps
            }
            GnmiEvent::PortLacpSystemPriorityChanged { .. } => {
                EventKind::PortLacpSystemPriority
            }
            GnmiEvent::PortLacpSystemIdMacChanged { .. } => {
                EventKind::PortLacpSystemIdMac
            }
            GnmiEvent::PortMacAddressChanged { .. } => EventKind::PortMacAddress,
            GnmiEvent::PortCountersChanged { .. } => EventKind::PortCounters,
            GnmiEvent::PortQosCountersChanged { .. } => EventKind::PortQosCounters,
            GnmiEvent::MemoryErrorAlarm { .. } => EventKind::MemoryErrorAlarm,
            GnmiEvent::FlowProgrammingExceptionAlarm { .. } => {
                EventKind::FlowProgrammingExceptionAlarm
            }
            GnmiEvent::ConfigHasBeenPushed { .. } => EventKind::ConfigPushed,
            GnmiEvent::Timer => EventKind::Timer,
            GnmiEvent::Poll => EventKind::Poll,
        }
    }
}
