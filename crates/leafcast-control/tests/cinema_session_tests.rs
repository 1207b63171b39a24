use leafcast_control::cinema::{
    CinemaController, SessionId, SessionState, StreamError, TopologyError,
};
use leafcast_control::fixture::FixtureError;
use leafcast_control::test_utils::{MockFixture, StreamMode};
use leafcast_control::{CinemaError, PanelId, Rgb};
use leafcast_core::CinemaConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

const WAIT: Duration = Duration::from_secs(3);

fn test_config(zone_count: usize) -> CinemaConfig {
    CinemaConfig::default()
        .with_listen("127.0.0.1", 0)
        .with_zone_count(zone_count)
        .with_settle_delay(Duration::ZERO)
        .with_receive_timeout(Duration::from_millis(50))
        .with_stop_timeout(Duration::from_secs(2))
}

fn setup(panels: &[u16]) -> (Arc<MockFixture>, CinemaController) {
    let fixture = Arc::new(MockFixture::new(panels));
    let controller = CinemaController::new(fixture.clone());
    (fixture, controller)
}

async fn send_datagram(target: SocketAddr, bytes: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(bytes, target).await.unwrap();
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_start_then_stop_powers_off() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);

    let id = controller.start(&test_config(3)).await.unwrap();
    assert_eq!(controller.state(), SessionState::Streaming);
    assert_eq!(fixture.power_log(), vec![true]);
    assert_eq!(fixture.brightness_log(), vec![50]);
    assert_eq!(fixture.streams_opened(), 1);

    let status = controller.status();
    assert_eq!(status.session_id, Some(id));
    let listen_addr = status.listen_addr.unwrap();

    // Several receive timeouts pass without a datagram
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.state(), SessionState::Streaming);

    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(fixture.power_log(), vec![true, false]);
    assert!(fixture.stream_log().unwrap().is_closed());

    // Listener released
    UdpSocket::bind(listen_addr).await.unwrap();
}

#[tokio::test]
async fn test_frame_reaches_panels() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    controller.start(&test_config(3)).await.unwrap();
    let target = controller.status().listen_addr.unwrap();

    send_datagram(target, &[10, 20, 30, 40, 50, 60, 70, 80, 90]).await;

    let log = fixture.stream_log().unwrap();
    assert!(eventually(|| log.updates().len() == 5).await);
    assert_eq!(
        log.updates(),
        vec![
            (PanelId(1), Rgb::new(10, 20, 30)),
            (PanelId(2), Rgb::new(10, 20, 30)),
            (PanelId(3), Rgb::new(40, 50, 60)),
            (PanelId(5), Rgb::new(70, 80, 90)),
            (PanelId(4), Rgb::new(70, 80, 90)),
        ]
    );

    let status = controller.status();
    assert_eq!(status.frames_received, 1);
    assert_eq!(status.frames_dispatched, 1);
    assert_eq!(status.panel_writes, 5);

    controller.stop().await;
}

#[tokio::test]
async fn test_malformed_datagram_is_dropped() {
    // Ring of 7 between the two anchors
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    controller.start(&test_config(7)).await.unwrap();
    let target = controller.status().listen_addr.unwrap();

    send_datagram(target, &[0xFF; 20]).await;
    send_datagram(target, &[7; 21]).await;

    assert!(eventually(|| controller.status().frames_dispatched == 1).await);
    let status = controller.status();
    assert_eq!(status.frames_dropped, 1);
    assert_eq!(status.state, SessionState::Streaming);
    assert!(status.last_error.is_none());

    // Only the well-formed frame produced writes, one per ring panel plus both anchors
    let updates = fixture.stream_log().unwrap().updates();
    assert_eq!(updates.len(), 9);
    assert!(updates.iter().all(|(_, color)| *color == Rgb::new(7, 7, 7)));

    controller.stop().await;
}

#[tokio::test]
async fn test_zone_count_must_match_ring() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);

    let err = controller.start(&test_config(7)).await.unwrap_err();
    assert!(matches!(
        err,
        CinemaError::ZoneMismatch {
            configured: 7,
            ring: 3
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(fixture.power_log().is_empty());
    assert_eq!(fixture.streams_opened(), 0);
    assert!(controller.status().listen_addr.is_none());

    // The same fixture starts once the counts agree
    controller.start(&test_config(3)).await.unwrap();
    controller.stop().await;
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    let id = controller.start(&test_config(3)).await.unwrap();

    let err = controller.start(&test_config(3)).await.unwrap_err();
    assert!(matches!(err, CinemaError::SessionActive(active) if active == id));
    assert_eq!(fixture.power_log(), vec![true]);
    assert_eq!(fixture.streams_opened(), 1);

    controller.stop().await;
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);

    controller.stop().await;
    controller.stop().await;

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(fixture.power_log().is_empty());
}

#[tokio::test]
async fn test_layout_failure_leaves_fixture_untouched() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    fixture.fail_layout(true);

    let err = controller.start(&test_config(3)).await.unwrap_err();
    assert!(matches!(
        err,
        CinemaError::Topology(TopologyError::Query(FixtureError::Unauthorized))
    ));
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(fixture.power_log().is_empty());
    assert!(controller.status().last_error.is_some());
}

#[tokio::test]
async fn test_too_few_panels() {
    let (fixture, controller) = setup(&[1, 2]);

    let err = controller.start(&test_config(3)).await.unwrap_err();
    assert!(matches!(
        err,
        CinemaError::Topology(TopologyError::TooFewPanels { found: 2 })
    ));
    assert!(fixture.power_log().is_empty());
}

#[tokio::test]
async fn test_power_on_failure_still_powers_off() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    fixture.fail_power_on(true);

    let err = controller.start(&test_config(3)).await.unwrap_err();
    assert!(matches!(
        err,
        CinemaError::Fixture(FixtureError::Api { status: 500, .. })
    ));
    assert_eq!(fixture.power_log(), vec![false]);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stream_failure_powers_off() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    fixture.fail_stream(true);

    let err = controller.start(&test_config(3)).await.unwrap_err();
    assert!(matches!(err, CinemaError::Stream(StreamError::Enable(_))));
    assert_eq!(fixture.power_log(), vec![true, false]);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_bind_failure_closes_stream() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    let occupied = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = test_config(3).with_listen("127.0.0.1", port);
    let err = controller.start(&config).await.unwrap_err();

    assert!(matches!(err, CinemaError::Bind { .. }));
    assert_eq!(fixture.power_log(), vec![true, false]);
    assert!(fixture.stream_log().unwrap().is_closed());
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_dispatch_failure_ends_session() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    fixture.set_stream_mode(StreamMode::FailAfter(0));

    let first = controller.start(&test_config(3)).await.unwrap();
    let target = controller.status().listen_addr.unwrap();
    let mut state = controller.subscribe();

    send_datagram(target, &[1; 9]).await;

    tokio::time::timeout(WAIT, state.wait_for(|s| *s == SessionState::Idle))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fixture.power_log(), vec![true, false]);
    assert!(fixture.stream_log().unwrap().is_closed());
    let last_error = controller.status().last_error.unwrap();
    assert!(last_error.contains("panel 1"), "{}", last_error);

    // Listener released
    UdpSocket::bind(target).await.unwrap();

    // A session that ended on its own does not block the next start
    fixture.set_stream_mode(StreamMode::Record);
    let second = controller.start(&test_config(3)).await.unwrap();
    assert!(second > first);
    assert!(controller.status().last_error.is_none());

    controller.stop().await;
}

#[tokio::test]
async fn test_stop_forces_shutdown_of_hung_loop() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    fixture.set_stream_mode(StreamMode::Hang);

    let config = test_config(3).with_stop_timeout(Duration::from_millis(200));
    controller.start(&config).await.unwrap();
    let target = controller.status().listen_addr.unwrap();

    send_datagram(target, &[1; 9]).await;
    assert!(eventually(|| controller.status().frames_received == 1).await);

    let started = Instant::now();
    controller.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(fixture.power_log(), vec![true, false]);
    let last_error = controller.status().last_error.unwrap();
    assert!(last_error.contains("did not finish"), "{}", last_error);
}

#[tokio::test]
async fn test_stale_session_id_is_ignored() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    let id = controller.start(&test_config(3)).await.unwrap();

    controller.stop_session(SessionId(id.0 + 100)).await;
    assert_eq!(controller.state(), SessionState::Streaming);
    assert_eq!(fixture.power_log(), vec![true]);

    controller.stop_session(id).await;
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(fixture.power_log(), vec![true, false]);

    // An old id cannot stop a newer session
    let newer = controller.start(&test_config(3)).await.unwrap();
    controller.stop_session(id).await;
    assert_eq!(controller.state(), SessionState::Streaming);

    controller.stop_session(newer).await;
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_restart_gets_new_session() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);

    let first = controller.start(&test_config(3)).await.unwrap();
    controller.stop().await;
    let second = controller.start(&test_config(3)).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(fixture.streams_opened(), 2);
    assert_eq!(controller.status().session_id, Some(second));

    controller.stop().await;
    assert_eq!(fixture.power_log(), vec![true, false, true, false]);
}

#[tokio::test]
async fn test_stop_during_settle_cancels_start() {
    let (fixture, controller) = setup(&[1, 2, 3, 4, 5]);
    let controller = Arc::new(controller);

    let config = test_config(3).with_settle_delay(Duration::from_secs(30));
    let starting = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(&config).await })
    };

    assert!(eventually(|| !fixture.brightness_log().is_empty()).await);
    assert_eq!(controller.state(), SessionState::Starting);

    let started = Instant::now();
    controller.stop().await;
    let result = tokio::time::timeout(WAIT, starting).await.unwrap().unwrap();

    assert!(matches!(result, Err(CinemaError::Cancelled)));
    assert!(started.elapsed() < WAIT);
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(fixture.streams_opened(), 0);
    assert_eq!(fixture.power_log(), vec![true, false]);
}
