// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// End-to-end event pipeline: backend events flow through the bounded
// channel, the reader, and the per-variant registries onto client streams.

use std::sync::Arc;
use std::time::Duration;

use gneiss_hal::data::{DataResponse, NodeConfig, PortCounters, SingletonPort};
use gneiss_hal::event::GnmiEvent;
use gneiss_hal::mock::MockSwitch;
use gneiss_proto::api::gnmi::{subscribe_response, typed_value, Path, SubscribeResponse};
use gneiss_telemetry::paths::PathBuilder;
use gneiss_telemetry::publisher::GnmiPublisher;
use gneiss_telemetry::subscription::{Frequency, GnmiSubscribeStream};
use gneiss_telemetry::timer::TimerDaemon;

fn setup() -> (GnmiPublisher, Arc<MockSwitch>) {
    let switch = Arc::new(MockSwitch::new());
    let publisher = GnmiPublisher::new(switch.clone(), Arc::new(TimerDaemon::new()));
    publisher.parse_tree().add_subtree_interface_from_singleton(
        &SingletonPort {
            name: "interface-1".to_string(),
            node_id: 3,
            port_id: 3,
            speed_bps: 25_000_000_000,
        },
        &NodeConfig::default(),
    );
    (publisher, switch)
}

fn in_octets_path() -> Path {
    PathBuilder::new()
        .elem("interfaces")
        .keyed_elem("interface", "name", "interface-1")
        .elem("state")
        .elem("counters")
        .elem("in-octets")
        .build()
}

fn counters_event(in_octets: u64) -> GnmiEvent {
    GnmiEvent::PortCountersChanged {
        node_id: 3,
        port_id: 3,
        counters: PortCounters {
            in_octets,
            ..Default::default()
        },
    }
}

fn uint_of(resp: &SubscribeResponse) -> u64 {
    match resp.response.as_ref().unwrap() {
        subscribe_response::Response::Update(n) => {
            match n.update[0].val.as_ref().unwrap().value.as_ref().unwrap() {
                typed_value::Value::UintVal(v) => *v,
                other => panic!("unexpected value: {:?}", other),
            }
        }
        other => panic!("expected update, got {:?}", other),
    }
}

#[tokio::test]
async fn event_reaches_matching_subscription_exactly_once() {
    let (publisher, switch) = setup();
    publisher.register_event_writer().await.unwrap();

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let handle = publisher
        .subscribe_on_change(&in_octets_path(), stream)
        .await
        .unwrap();

    switch.send_event(counters_event(5)).unwrap();

    let resp = rx.recv().await.unwrap().unwrap();
    assert_eq!(uint_of(&resp), 5);

    // At-most-once per event: nothing else arrives for that injection.
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err());

    publisher.unsubscribe(&handle);
}

#[tokio::test]
async fn events_fan_out_to_all_matching_streams() {
    let (publisher, switch) = setup();
    publisher.register_event_writer().await.unwrap();

    let (stream_a, mut rx_a) = GnmiSubscribeStream::channel(16);
    let (stream_b, mut rx_b) = GnmiSubscribeStream::channel(16);
    let _a = publisher
        .subscribe_on_change(&in_octets_path(), stream_a)
        .await
        .unwrap();
    let _b = publisher
        .subscribe_on_change(&in_octets_path(), stream_b)
        .await
        .unwrap();

    switch.send_event(counters_event(9)).unwrap();

    assert_eq!(uint_of(&rx_a.recv().await.unwrap().unwrap()), 9);
    assert_eq!(uint_of(&rx_b.recv().await.unwrap().unwrap()), 9);
}

#[tokio::test]
async fn events_preserve_backend_order() {
    let (publisher, switch) = setup();
    publisher.register_event_writer().await.unwrap();

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let _handle = publisher
        .subscribe_on_change(&in_octets_path(), stream)
        .await
        .unwrap();

    for value in [1, 2, 3] {
        switch.send_event(counters_event(value)).unwrap();
    }
    for want in [1, 2, 3] {
        assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), want);
    }
}

#[tokio::test]
async fn channel_teardown_and_reregistration() {
    let (publisher, switch) = setup();
    publisher.register_event_writer().await.unwrap();

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let _handle = publisher
        .subscribe_on_change(&in_octets_path(), stream)
        .await
        .unwrap();

    switch.send_event(counters_event(1)).unwrap();
    assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), 1);

    // Closing tears the writer away from the backend; the reader exits.
    publisher.unregister_event_writer().await.unwrap();
    assert!(switch.send_event(counters_event(2)).is_err());

    // A fresh registration re-creates channel and reader cleanly.
    publisher.register_event_writer().await.unwrap();
    switch.send_event(counters_event(3)).unwrap();
    assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), 3);
}

#[tokio::test]
async fn dropped_subscription_stops_receiving() {
    let (publisher, switch) = setup();
    publisher.register_event_writer().await.unwrap();

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let handle = publisher
        .subscribe_on_change(&in_octets_path(), stream)
        .await
        .unwrap();

    switch.send_event(counters_event(1)).unwrap();
    assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), 1);

    publisher.unsubscribe(&handle);
    drop(handle);

    switch.send_event(counters_event(2)).unwrap();
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn periodic_subscription_samples_from_backend() {
    let (publisher, switch) = setup();

    // Each timer fire retrieves the current counters.
    switch.push_response(DataResponse::PortCounters(PortCounters {
        in_octets: 10,
        ..Default::default()
    }));
    switch.push_response(DataResponse::PortCounters(PortCounters {
        in_octets: 20,
        ..Default::default()
    }));

    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let handle = publisher
        .subscribe_periodic(
            Frequency {
                delay_ms: 100,
                period_ms: 100,
            },
            &in_octets_path(),
            stream,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), 10);
    assert_eq!(uint_of(&rx.recv().await.unwrap().unwrap()), 20);

    // Cancelling through unsubscribe stops the samples.
    publisher.unsubscribe(&handle);
    drop(handle);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn poll_failure_is_swallowed() {
    let (publisher, _switch) = setup();

    // No scripted backend response: the poll handler fails internally, the
    // poll call itself still reports OK.
    let (stream, mut rx) = GnmiSubscribeStream::channel(16);
    let handle = publisher
        .subscribe_poll(&in_octets_path(), stream)
        .await
        .unwrap();
    publisher.handle_poll(&handle).await.unwrap();
    assert!(rx.try_recv().is_err());
}
