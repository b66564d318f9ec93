//! End-to-end poll sequence tests against a scripted fake ST24.
//!
//! All tests run on paused Tokio time, so response deadlines and settle
//! delays elapse instantly while keeping their relative order.

mod common;

use common::{
    connected, controller, script_silent_on, standard_script, wait_until_busy, FakeSt24,
    MockCatalog,
};
use serde_json::json;
use st24_control::protocol::PollResult;
use st24_control::St24Error;
use std::time::Duration;
use tokio::time::Instant;

const POLL_COMMANDS: [&str; 7] = ["$", "R", "P", "H", "G", "^S", "%"];

#[tokio::test(start_paused = true)]
async fn test_full_poll_decodes_every_domain() {
    let (controller, fake) = connected(standard_script()).await;

    let result = controller.run_poll().await;

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "connected": true,
            "busy": false,
            "signal": {"level": 2234, "threshold": 2033, "nid": "055", "count": 35},
            "position": {"el": 37.2, "az": 199.3, "pol": 1.5, "rel": 0},
            "inclin": {"xt": 0.0, "yt": -1.1, "rp1": 14.7, "rp2": 14.8},
            "attitude": {"roll": 0.1, "pitch": -1.1, "yaw": 199.5},
            "status": {"raw": "0007", "NIDOK": true, "TRACKF": true, "THRSF": true, "SRCHF": false}
        })
    );
    assert_eq!(fake.commands(), POLL_COMMANDS);
    assert!(!controller.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_poll_reports_busy_without_writing() {
    let (controller, fake) = connected(standard_script()).await;

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run_poll().await }
    });
    wait_until_busy(&controller).await;

    let second = controller.run_poll().await;
    assert_eq!(second, PollResult::busy());

    let first = first.await.unwrap();
    assert!(first.connected);
    assert!(!first.busy);
    assert_eq!(fake.commands(), POLL_COMMANDS);
}

#[tokio::test(start_paused = true)]
async fn test_poll_on_closed_link_is_disconnected_without_io() {
    let (controller, fake) = connected(standard_script()).await;
    assert!(controller.close_connection().await);

    let result = controller.run_poll().await;

    assert_eq!(result, PollResult::disconnected());
    assert!(!controller.is_busy());
    assert!(fake.hung_up().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_before_any_open_is_disconnected() {
    let controller = controller(MockCatalog::new());
    assert_eq!(
        serde_json::to_string(&controller.run_poll().await).unwrap(),
        r#"{"connected":false,"busy":false}"#
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_steps_leave_only_their_domains_empty() {
    let (controller, fake) = connected(script_silent_on(&["R", "H"])).await;

    let started = Instant::now();
    let result = controller.run_poll().await;
    let elapsed = started.elapsed();

    assert!(result.connected);
    assert!(!result.busy);
    let snapshot = result.telemetry.clone().unwrap();
    assert_eq!(snapshot.signal, None);
    assert_eq!(snapshot.inclinometer, None);
    assert!(snapshot.position.is_some());
    assert!(snapshot.attitude.is_some());
    assert_eq!(snapshot.status.as_ref().map(|s| s.raw.as_str()), Some("0007"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["signal"], json!({}));
    assert_eq!(json["inclin"], json!({}));

    // Two response deadlines plus six settle pauses.
    let expected = Duration::from_millis(2 * 1000 + 6 * 150);
    assert!(elapsed >= expected, "{elapsed:?}");
    assert!(elapsed < expected + Duration::from_millis(100), "{elapsed:?}");

    assert!(!controller.is_busy());
    assert_eq!(fake.commands(), POLL_COMMANDS);
}

#[tokio::test(start_paused = true)]
async fn test_device_hangup_reads_as_disconnected() {
    let mut catalog = MockCatalog::new();
    let device = catalog.add("/dev/ttyUSB0");
    let controller = controller(catalog);
    controller.open_connection("/dev/ttyUSB0", None).await.unwrap();

    drop(device);
    while controller.is_connected().await {
        tokio::task::yield_now().await;
    }

    assert_eq!(controller.run_poll().await, PollResult::disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_manual_send_waits_for_running_poll() {
    let (controller, fake) = connected(script_silent_on(&["P"])).await;

    let poll = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run_poll().await }
    });
    wait_until_busy(&controller).await;

    let ack = controller.send_raw("^S").await.unwrap();
    assert_eq!(ack.sent, "^S");
    assert!(poll.is_finished());

    let mut expected: Vec<_> = POLL_COMMANDS.to_vec();
    expected.push("^S");
    assert_eq!(fake.wait_for_commands(8).await, expected);
}

#[tokio::test(start_paused = true)]
async fn test_manual_send_gives_up_after_gate_timeout() {
    let mut catalog = MockCatalog::new();
    let device = catalog.add("/dev/ttyUSB0");
    let fake = FakeSt24::spawn(device, script_silent_on(&POLL_COMMANDS));

    let mut config = st24_control::config::St24Config::default();
    config.protocol.gate_timeout_ms = 500;
    let controller = std::sync::Arc::new(st24_control::St24Controller::new(
        Box::new(catalog),
        config,
    ));
    controller.open_connection("/dev/ttyUSB0", None).await.unwrap();

    let poll = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run_poll().await }
    });
    wait_until_busy(&controller).await;

    let result = controller.send_raw("R").await;
    assert!(matches!(result, Err(St24Error::Busy(d)) if d == Duration::from_millis(500)));

    poll.await.unwrap();
    assert_eq!(fake.commands(), POLL_COMMANDS);
}

#[tokio::test(start_paused = true)]
async fn test_reopen_closes_previous_link() {
    let mut catalog = MockCatalog::new();
    let first = FakeSt24::spawn(catalog.add("/dev/ttyUSB0"), standard_script());
    let second = FakeSt24::spawn(catalog.add("/dev/ttyUSB1"), standard_script());
    let controller = controller(catalog);

    controller.open_connection("/dev/ttyUSB0", None).await.unwrap();
    controller.open_connection("/dev/ttyUSB1", Some(19200)).await.unwrap();

    let result = controller.run_poll().await;
    assert!(result.connected);

    assert!(first.hung_up().await.is_empty());
    assert_eq!(second.commands(), POLL_COMMANDS);
}

#[tokio::test(start_paused = true)]
async fn test_open_unknown_device_leaves_link_closed() {
    let controller = controller(MockCatalog::new());

    let result = controller.open_connection("/dev/ttyUSB9", None).await;

    assert!(matches!(result, Err(St24Error::Open { ref identifier, .. }) if identifier == "/dev/ttyUSB9"));
    assert!(!controller.is_connected().await);
}

#[tokio::test]
async fn test_candidate_devices_follow_naming_pattern() {
    let mut catalog = MockCatalog::new();
    catalog.add("/dev/ttyUSB0");
    catalog.add("/dev/cu.Bluetooth-Incoming-Port");
    catalog.add("COM4");
    let controller = controller(catalog);

    assert_eq!(
        controller.list_candidate_devices().unwrap(),
        vec!["/dev/ttyUSB0", "COM4"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_manual_send_waiting_on_gate_goes_to_reopened_link() {
    let mut catalog = MockCatalog::new();
    let first = FakeSt24::spawn(catalog.add("/dev/ttyUSB0"), script_silent_on(&["R"]));
    let second = FakeSt24::spawn(catalog.add("/dev/ttyUSB1"), standard_script());
    let controller = controller(catalog);
    controller.open_connection("/dev/ttyUSB0", None).await.unwrap();

    let poll = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run_poll().await }
    });
    wait_until_busy(&controller).await;

    let send = tokio::spawn({
        let controller = controller.clone();
        async move { controller.send_raw("^S").await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!send.is_finished());

    controller.open_connection("/dev/ttyUSB1", None).await.unwrap();

    let ack = send.await.unwrap().unwrap();
    assert_eq!(ack.sent, "^S");
    assert!(poll.await.unwrap().connected);
    assert!(controller.is_connected().await);

    assert_eq!(second.wait_for_commands(1).await, ["^S"]);
    assert!(!first.hung_up().await.contains(&"^S".to_string()));
}
