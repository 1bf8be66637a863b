// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// /components/component[name=K]/chassis/alarms subtree. Each alarm node
// answers as a group (one write per subleaf, ordered description, severity,
// status, time-created) and also exposes the four subleaves individually.

use std::sync::Arc;

use futures::FutureExt;

use gneiss_hal::data::{Alarm, AlarmSeverity, DataRequest, DataResponse};
use gneiss_hal::event::{EventKind, GnmiEvent};
use gneiss_hal::switch::{CaptureWriter, SwitchInterface};
use gneiss_proto::api::gnmi::{Path, TypedValue};

use crate::errors::TelemetryError;
use crate::node::TreeNode;
use crate::paths::{PathBuilder, WILDCARD};
use crate::subscription::GnmiHandler;
use crate::values::{
    bool_value, severity_to_string, string_value, uint_value, update_response,
};

use super::helpers::{change_handler, keyed_child, leaf_caps, template_caps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmKind {
    MemoryError,
    FlowProgrammingException,
}

impl AlarmKind {
    fn node_name(self) -> &'static str {
        match self {
            AlarmKind::MemoryError => "memory-error",
            AlarmKind::FlowProgrammingException => "flow-programming-exception",
        }
    }

    fn request(self) -> DataRequest {
        match self {
            AlarmKind::MemoryError => DataRequest::MemoryErrorAlarm,
            AlarmKind::FlowProgrammingException => {
                DataRequest::FlowProgrammingExceptionAlarm
            }
        }
    }

    fn event_kind(self) -> EventKind {
        match self {
            AlarmKind::MemoryError => EventKind::MemoryErrorAlarm,
            AlarmKind::FlowProgrammingException => {
                EventKind::FlowProgrammingExceptionAlarm
            }
        }
    }

    fn alarm_from_response(self, resp: DataResponse) -> Option<Alarm> {
        match (self, resp) {
            (AlarmKind::MemoryError, DataResponse::MemoryErrorAlarm(alarm))
            | (
                AlarmKind::FlowProgrammingException,
                DataResponse::FlowProgrammingExceptionAlarm(alarm),
            ) => Some(alarm),
            _ => None,
        }
    }

    /// (time_created, description) when the event is this alarm.
    fn alarm_from_event(self, event: &GnmiEvent) -> Option<(u64, String)> {
        match (self, event) {
            (
                AlarmKind::MemoryError,
                GnmiEvent::MemoryErrorAlarm {
                    time_created,
                    description,
                },
            )
            | (
                AlarmKind::FlowProgrammingException,
                GnmiEvent::FlowProgrammingExceptionAlarm {
                    time_created,
                    description,
                },
            ) => Some((*time_created, description.clone())),
            _ => None,
        }
    }
}

/// The four facets of an alarm, in the order the group handler reports them.
#[derive(Debug, Clone, Copy)]
enum AlarmField {
    Description,
    Severity,
    Status,
    TimeCreated,
}

impl AlarmField {
    const REPORT_ORDER: [AlarmField; 4] = [
        AlarmField::Description,
        AlarmField::Severity,
        AlarmField::Status,
        AlarmField::TimeCreated,
    ];

    fn leaf_name(self) -> &'static str {
        match self {
            AlarmField::Description => "info",
            AlarmField::Severity => "severity",
            AlarmField::Status => "status",
            AlarmField::TimeCreated => "time-created",
        }
    }

    fn value(self, alarm: &Alarm) -> TypedValue {
        match self {
            AlarmField::Description => string_value(alarm.description.clone()),
            AlarmField::Severity => string_value(severity_to_string(alarm.severity)),
            AlarmField::Status => bool_value(alarm.status),
            AlarmField::TimeCreated => uint_value(alarm.time_created),
        }
    }

    /// Alarm events carry the creation time and description; an event always
    /// reports a raised, critical alarm.
    fn value_from_event(self, time_created: u64, description: &str) -> TypedValue {
        match self {
            AlarmField::Description => string_value(description.to_string()),
            AlarmField::Severity => {
                string_value(severity_to_string(AlarmSeverity::Critical))
            }
            AlarmField::Status => bool_value(true),
            AlarmField::TimeCreated => uint_value(time_created),
        }
    }
}

fn alarm_leaf_path(chassis_key: &str, alarm: AlarmKind, field: Option<AlarmField>) -> Path {
    let builder = PathBuilder::new()
        .elem("components")
        .keyed_elem("component", "name", chassis_key)
        .elem("chassis")
        .elem("alarms")
        .elem(alarm.node_name());
    match field {
        Some(field) => builder.elem(field.leaf_name()).build(),
        None => builder.build(),
    }
}

pub(crate) fn add_chassis_instance(
    root: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    chassis: Option<&str>,
) {
    let key = chassis.unwrap_or(WILDCARD).to_string();
    let components = root.interior_child("components");
    let component = keyed_child(&components, "component", "name");
    let instance = component.attach(TreeNode::key_instance(&key));
    let chassis_node = instance.interior_child("chassis");
    let alarms = chassis_node.interior_child("alarms");

    for kind in [AlarmKind::MemoryError, AlarmKind::FlowProgrammingException] {
        add_alarm(&alarms, switch, chassis.is_some(), &key, kind);
    }
}

fn add_alarm(
    alarms: &Arc<TreeNode>,
    switch: &Arc<dyn SwitchInterface>,
    concrete: bool,
    chassis_key: &str,
    kind: AlarmKind,
) {
    let regs = vec![kind.event_kind()];
    let group_caps = if concrete {
        let poll = alarm_group_poll_handler(switch.clone(), chassis_key, kind);
        let change = alarm_group_change_handler(chassis_key, kind);
        leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs.clone())
    } else {
        template_caps(true, true, true, regs.clone())
    };
    let alarm_node = alarms.attach(TreeNode::group(kind.node_name(), group_caps));

    for field in AlarmField::REPORT_ORDER {
        let caps = if concrete {
            let path = alarm_leaf_path(chassis_key, kind, Some(field));
            let poll = alarm_field_poll_handler(switch.clone(), kind, field, path.clone());
            let change = change_handler(
                path,
                Arc::new(move |event| {
                    kind.alarm_from_event(event)
                        .map(|(time, desc)| field.value_from_event(time, &desc))
                }),
            );
            leaf_caps(Some(poll.clone()), Some(poll), Some(change), regs.clone())
        } else {
            template_caps(true, true, true, regs.clone())
        };
        alarm_node.attach(TreeNode::leaf(field.leaf_name(), caps));
    }
}

async fn retrieve_alarm(
    switch: &Arc<dyn SwitchInterface>,
    kind: AlarmKind,
) -> Result<Alarm, TelemetryError> {
    let mut writer = CaptureWriter::default();
    switch.retrieve_value(0, kind.request(), &mut writer).await?;
    writer
        .into_inner()
        .and_then(|resp| kind.alarm_from_response(resp))
        .ok_or_else(|| TelemetryError::Internal("unexpected backend response".to_string()))
}

/// Group poll: one backend retrieval and one stream write per facet,
/// reported in `REPORT_ORDER`.
fn alarm_group_poll_handler(
    switch: Arc<dyn SwitchInterface>,
    chassis_key: &str,
    kind: AlarmKind,
) -> GnmiHandler {
    let paths: Vec<Path> = AlarmField::REPORT_ORDER
        .iter()
        .map(|field| alarm_leaf_path(chassis_key, kind, Some(*field)))
        .collect();
    Arc::new(move |_event, stream| {
        let switch = switch.clone();
        let paths = paths.clone();
        async move {
            for (field, path) in AlarmField::REPORT_ORDER.into_iter().zip(paths) {
                let alarm = retrieve_alarm(&switch, kind).await?;
                stream.write(update_response(path, field.value(&alarm))).await?;
            }
            Ok(())
        }
        .boxed()
    })
}

/// Group change: project all four facets out of the alarm event.
fn alarm_group_change_handler(chassis_key: &str, kind: AlarmKind) -> GnmiHandler {
    let paths: Vec<Path> = AlarmField::REPORT_ORDER
        .iter()
        .map(|field| alarm_leaf_path(chassis_key, kind, Some(*field)))
        .collect();
    Arc::new(move |event, stream| {
        let alarm = kind.alarm_from_event(&event);
        let paths = paths.clone();
        async move {
            let Some((time_created, description)) = alarm else {
                return Ok(());
            };
            for (field, path) in AlarmField::REPORT_ORDER.into_iter().zip(paths) {
                let value = field.value_from_event(time_created, &description);
                stream.write(update_response(path, value)).await?;
            }
            Ok(())
        }
        .boxed()
    })
}

fn alarm_field_poll_handler(
    switch: Arc<dyn SwitchInterface>,
    kind: AlarmKind,
    field: AlarmField,
    path: Path,
) -> GnmiHandler {
    Arc::new(move |_event, stream| {
        let switch = switch.clone();
        let path = path.clone();
        async move {
            let alarm = retrieve_alarm(&switch, kind).await?;
            stream.write(update_response(path, field.value(&alarm))).await
        }
        .boxed()
    })
}
