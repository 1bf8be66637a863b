// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Value-to-wire translation: canonical string forms for enums and bitfields,
// TypedValue constructors, and SubscribeResponse assembly. Every update
// written to a client stream carries exactly one {path, val} pair.

use std::time::{SystemTime, UNIX_EPOCH};

use gneiss_hal::data::{AdminState, AlarmSeverity, PortState};
use gneiss_proto::api::gnmi::{
    typed_value, Notification, Path, SubscribeResponse, TypedValue, Update,
    subscribe_response,
};

pub fn port_state_to_string(state: PortState) -> &'static str {
    match state {
        PortState::Up => "UP",
        PortState::Down => "DOWN",
        PortState::Failed => "FAILED",
        PortState::Unknown => "UNKNOWN",
    }
}

pub fn admin_state_to_string(state: AdminState) -> &'static str {
    match state {
        AdminState::Enabled => "UP",
        AdminState::Disabled => "DOWN",
        AdminState::Unknown => "UNKNOWN",
    }
}

pub fn severity_to_string(severity: AlarmSeverity) -> &'static str {
    match severity {
        AlarmSeverity::Minor => "MINOR",
        AlarmSeverity::Warning => "WARNING",
        AlarmSeverity::Critical => "CRITICAL",
        AlarmSeverity::Unknown => "UNKNOWN",
    }
}

/// Canonical form of a port speed in bits per second. Unknown speeds render
/// as an empty string.
pub fn speed_bps_to_string(speed_bps: u64) -> &'static str {
    match speed_bps {
        10_000_000 => "SPEED_10MB",
        100_000_000 => "SPEED_100MB",
        1_000_000_000 => "SPEED_1GB",
        10_000_000_000 => "SPEED_10GB",
        20_000_000_000 => "SPEED_20GB",
        25_000_000_000 => "SPEED_25GB",
        40_000_000_000 => "SPEED_40GB",
        50_000_000_000 => "SPEED_50GB",
        100_000_000_000 => "SPEED_100GB",
        _ => "",
    }
}

/// `0x112233445566` renders as `"11:22:33:44:55:66"`.
pub fn mac_address_to_string(mac: u64) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        (mac >> 40) & 0xff,
        (mac >> 32) & 0xff,
        (mac >> 24) & 0xff,
        (mac >> 16) & 0xff,
        (mac >> 8) & 0xff,
        mac & 0xff,
    )
}

pub fn string_value(val: impl Into<String>) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::StringVal(val.into())),
    }
}

pub fn uint_value(val: u64) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::UintVal(val)),
    }
}

pub fn int_value(val: i64) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::IntVal(val)),
    }
}

pub fn bool_value(val: bool) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::BoolVal(val)),
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Build the one-update notification written for a single leaf value.
pub fn update_response(path: Path, val: TypedValue) -> SubscribeResponse {
    SubscribeResponse {
        response: Some(subscribe_response::Response::Update(Notification {
            timestamp: now_nanos(),
            update: vec![Update {
                path: Some(path),
                val: Some(val),
                ..Default::default()
            }],
            ..Default::default()
        })),
    }
}

/// The marker telling the client the initial snapshot is complete.
pub fn sync_response() -> SubscribeResponse {
    SubscribeResponse {
        response: Some(subscribe_response::Response::SyncResponse(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_formatting() {
        assert_eq!(mac_address_to_string(0x112233445566), "11:22:33:44:55:66");
        assert_eq!(mac_address_to_string(0x0000000000ff), "00:00:00:00:00:ff");
    }

    #[test]
    fn test_speed_strings() {
        assert_eq!(speed_bps_to_string(25_000_000_000), "SPEED_25GB");
        assert_eq!(speed_bps_to_string(100_000_000_000), "SPEED_100GB");
        assert_eq!(speed_bps_to_string(1234), "");
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(port_state_to_string(PortState::Up), "UP");
        assert_eq!(port_state_to_string(PortState::Down), "DOWN");
        assert_eq!(admin_state_to_string(AdminState::Enabled), "UP");
        assert_eq!(admin_state_to_string(AdminState::Disabled), "DOWN");
        assert_eq!(severity_to_string(AlarmSeverity::Critical), "CRITICAL");
    }

    #[test]
    fn test_update_response_has_exactly_one_update() {
        let resp = update_response(Default::default(), uint_value(5));
        match resp.response.unwrap() {
            subscribe_response::Response::Update(n) => {
                assert_eq!(n.update.len(), 1);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
