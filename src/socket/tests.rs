//! State machine tests driven through the memory transport.
//!
//! Time is paused, so timers only fire when a test sleeps past them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

use crate::error::{Error, Result};
use crate::protocol::{Envelope, Frame, decode_envelope};
use crate::transport::{
    CLOSE_GOING_AWAY, ConnectRequest, EventSink, MemoryTransport, MemoryTransportFactory,
    Transport, TransportFactory,
};

use super::*;

// ============================================================================
// Fixtures
// ============================================================================

const TIMEOUT: Duration = Duration::from_millis(100);
const INTERVAL: Duration = Duration::from_millis(50);
const CEILING: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Connecting {
        attempt: u32,
        retry_in: Option<Duration>,
    },
    Open {
        is_reconnect: bool,
    },
    Close(CloseCause),
    Error(String),
    Message(Value),
    MessageError(&'static str),
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    handles_messages: bool,
}

impl Recorder {
    fn with_logic() -> Self {
        Self {
            handles_messages: true,
            ..Self::default()
        }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn count(&self, predicate: impl Fn(&Seen) -> bool) -> usize {
        self.seen.lock().iter().filter(|seen| predicate(*seen)).count()
    }

    fn opens(&self) -> usize {
        self.count(|seen| matches!(seen, Seen::Open { .. }))
    }

    fn closes(&self) -> usize {
        self.count(|seen| matches!(seen, Seen::Close(_)))
    }

    fn connectings(&self) -> usize {
        self.count(|seen| matches!(seen, Seen::Connecting { .. }))
    }

    fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl SocketHandler for Recorder {
    fn on_connecting(&self, event: &ConnectingEvent) {
        self.seen.lock().push(Seen::Connecting {
            attempt: event.attempt,
            retry_in: event.retry_in,
        });
    }

    fn on_open(&self, event: &OpenEvent) {
        self.seen.lock().push(Seen::Open {
            is_reconnect: event.is_reconnect,
        });
    }

    fn on_close(&self, event: &CloseEvent) {
        self.seen.lock().push(Seen::Close(event.cause));
    }

    fn on_error(&self, event: &ErrorEvent) {
        self.seen.lock().push(Seen::Error(event.message.clone()));
    }

    fn message_logic(&self, message: Value) -> Result<()> {
        if !self.handles_messages {
            return Err(Error::unimplemented_handler("message_logic"));
        }
        self.seen.lock().push(Seen::Message(message));
        Ok(())
    }

    fn on_message_error(&self, error: Error) {
        let kind = match error {
            Error::MalformedPayload { .. } => "malformed",
            Error::UnsupportedPayloadType { .. } => "unsupported",
            Error::UnimplementedHandler { .. } => "unimplemented",
            _ => "other",
        };
        self.seen.lock().push(Seen::MessageError(kind));
    }
}

fn builder(factory: &MemoryTransportFactory, recorder: &Recorder) -> SocketBuilder {
    ReconnectingSocket::builder("ws://feed.test/v1")
        .automatic_open(false)
        .timeout_interval(TIMEOUT)
        .reconnect_interval(INTERVAL)
        .max_reconnect_interval(CEILING)
        .reconnect_decay(2.0)
        .transport_factory(factory.clone())
        .handler(recorder.clone())
}

fn socket(factory: &MemoryTransportFactory, recorder: &Recorder) -> ReconnectingSocket {
    builder(factory, recorder).build().expect("valid socket")
}

/// Lets the driver task drain its queue without advancing time.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

fn transport(factory: &MemoryTransportFactory, index: usize) -> MemoryTransport {
    factory.get(index).expect("attempt was started")
}

/// Connects and completes the handshake of the first attempt.
async fn open_socket(factory: &MemoryTransportFactory, recorder: &Recorder) -> ReconnectingSocket {
    let socket = socket(factory, recorder);
    socket.connect(false);
    transport(factory, 0).open();
    settle().await;
    assert_eq!(socket.status(), ConnectionStatus::Open);
    socket
}

type CreateHook = dyn Fn(&ReconnectingSocket, &MemoryTransport) + Send + Sync;

/// Memory factory that runs a hook against the socket inside `create`.
#[derive(Clone)]
struct HookFactory {
    inner: MemoryTransportFactory,
    socket: Arc<Mutex<Option<ReconnectingSocket>>>,
    hook: Arc<CreateHook>,
}

impl HookFactory {
    fn new(hook: impl Fn(&ReconnectingSocket, &MemoryTransport) + Send + Sync + 'static) -> Self {
        Self {
            inner: MemoryTransportFactory::new(),
            socket: Arc::new(Mutex::new(None)),
            hook: Arc::new(hook),
        }
    }

    fn build(&self, builder: SocketBuilder) -> ReconnectingSocket {
        let socket = builder
            .transport_factory(self.clone())
            .build()
            .expect("valid socket");
        *self.socket.lock() = Some(socket.clone());
        socket
    }

    /// Breaks the socket/factory reference cycle.
    fn detach(&self) {
        self.socket.lock().take();
    }
}

impl TransportFactory for HookFactory {
    fn create(&self, request: ConnectRequest, events: EventSink) -> Box<dyn Transport> {
        let transport = self.inner.create(request, events);
        let socket = self.socket.lock().clone();
        if let (Some(socket), Some(created)) = (socket, self.inner.last()) {
            (self.hook)(&socket, &created);
        }
        transport
    }
}

// ============================================================================
// Connect and Open
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_connect_then_open_fires_open_once() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert_eq!(factory.attempts(), 0);

    socket.connect(false);
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert!(socket.has_transport());

    transport(&factory, 0).open();
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Open);
    assert_eq!(socket.reconnect_attempts(), 0);
    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Connecting {
                attempt: 0,
                retry_in: None
            },
            Seen::Open {
                is_reconnect: false
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_automatic_open_connects_on_build() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = builder(&factory, &recorder)
        .automatic_open(true)
        .build()
        .expect("valid socket");

    assert_eq!(factory.attempts(), 1);
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert_eq!(recorder.connectings(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_ignored_while_attempt_is_live() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    socket.connect(false);
    socket.connect(true);

    assert_eq!(factory.attempts(), 1);
    assert_eq!(recorder.connectings(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_carries_protocols_and_negotiated_protocol_is_kept() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = builder(&factory, &recorder)
        .protocols(["feed.v2", "feed.v1"])
        .build()
        .expect("valid socket");

    socket.connect(false);
    let first = transport(&factory, 0);
    assert_eq!(first.request().protocols, vec!["feed.v2", "feed.v1"]);
    assert_eq!(first.request().url.as_str(), "ws://feed.test/v1");

    first.open_with_protocol(Some("feed.v1"));
    settle().await;

    assert_eq!(socket.protocol().as_deref(), Some("feed.v1"));
}

#[tokio::test(start_paused = true)]
async fn test_status_subscription_observes_transitions() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);
    let mut status = socket.subscribe_status();

    socket.connect(false);
    transport(&factory, 0).open();

    assert_ok!(status.wait_for(|s| *s == ConnectionStatus::Open).await);
}

// ============================================================================
// Send
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_is_rejected() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    assert!(matches!(socket.send("x"), Err(Error::NotConnected)));

    socket.connect(false);
    assert!(matches!(socket.send("x"), Err(Error::NotConnected)));
    assert!(transport(&factory, 0).sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_rejects_invalid_payload_kind() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    let err = assert_err!(socket.send(json!(42)));
    assert!(matches!(err, Error::InvalidPayloadKind { .. }));

    let err = assert_err!(socket.send(json!(true)));
    assert!(matches!(err, Error::InvalidPayloadKind { .. }));

    assert!(transport(&factory, 0).sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_envelope_round_trips_through_transport() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    let envelope = Envelope::new("x").with_data(json!({"ids": [1, 2, 3], "name": "feed"}));
    assert_ok!(socket.send(envelope.clone()));
    assert_ok!(socket.send("plain text"));
    assert_ok!(socket.send_binary(vec![7u8, 8]));

    let sent = transport(&factory, 0).sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(decode_envelope(&sent[0]).expect("envelope"), envelope);
    assert_eq!(sent[1], Frame::from("plain text"));
    assert_eq!(sent[2], Frame::Binary(vec![7, 8]));
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_with_active_transport_stops_reconnecting() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;
    recorder.clear();

    assert!(socket.close());
    assert!(socket.is_forced_closed());
    assert_eq!(socket.status(), ConnectionStatus::Closing);

    settle().await;
    sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert!(!socket.has_transport());
    assert_eq!(recorder.seen(), vec![Seen::Close(CloseCause::Forced)]);
    assert_eq!(factory.attempts(), 1);
    assert_eq!(
        transport(&factory, 0).close_requested(),
        Some((1000, String::new()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_without_transport_is_a_no_op() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    assert!(!socket.close());
    assert!(!socket.is_forced_closed());
    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert!(recorder.seen().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_while_connecting_suppresses_open() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    let first = transport(&factory, 0);
    first.open();
    assert!(socket.close_with(4000, "going"));
    settle().await;

    // The open was queued before the close was requested.
    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert_eq!(first.close_requested(), Some((4000, "going".to_string())));
    assert_eq!(recorder.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_close_starts_new_episode() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    assert!(socket.close());
    settle().await;

    socket.connect(false);
    assert!(!socket.is_forced_closed());
    assert_eq!(factory.attempts(), 2);

    transport(&factory, 1).open();
    settle().await;
    assert_eq!(socket.status(), ConnectionStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    transport(&factory, 0).drop_connection();
    settle().await;
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert!(!socket.has_transport());

    // Nothing to close between attempts.
    assert!(!socket.close());

    socket.shutdown();
    sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert_eq!(factory.attempts(), 1);
}

// ============================================================================
// Reconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_report_close_once() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    transport(&factory, 0).drop_connection();
    settle().await;

    sleep(INTERVAL).await;
    settle().await;
    assert_eq!(factory.attempts(), 2);

    transport(&factory, 1).drop_connection();
    settle().await;

    sleep(INTERVAL * 2).await;
    settle().await;
    assert_eq!(factory.attempts(), 3);

    assert_eq!(recorder.closes(), 1);
    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Connecting {
                attempt: 0,
                retry_in: None
            },
            Seen::Connecting {
                attempt: 1,
                retry_in: Some(INTERVAL)
            },
            Seen::Close(CloseCause::Remote),
            Seen::Connecting {
                attempt: 1,
                retry_in: None
            },
            Seen::Connecting {
                attempt: 2,
                retry_in: Some(INTERVAL * 2)
            },
            Seen::Connecting {
                attempt: 2,
                retry_in: None
            },
        ]
    );
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_forces_close_without_close_notification() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    sleep(TIMEOUT + Duration::from_millis(1)).await;
    settle().await;

    let first = transport(&factory, 0);
    assert!(first.is_closed());
    assert_eq!(
        first.close_requested(),
        Some((1000, "connect timeout".to_string()))
    );
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert_eq!(recorder.closes(), 0);

    sleep(INTERVAL).await;
    settle().await;
    assert_eq!(factory.attempts(), 2);

    // The retry times out as well; still nothing reaches on_close.
    sleep(TIMEOUT + Duration::from_millis(1)).await;
    settle().await;
    assert!(transport(&factory, 1).is_closed());
    assert_eq!(recorder.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_open_cancels_connect_timeout() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    sleep(TIMEOUT * 3).await;
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Open);
    assert!(transport(&factory, 0).close_requested().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_attempt_count_resets_on_every_open() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    for index in 0..3 {
        transport(&factory, index).drop_connection();
        settle().await;
        assert_eq!(socket.reconnect_attempts(), 1);

        sleep(INTERVAL).await;
        settle().await;

        transport(&factory, index + 1).open();
        settle().await;
        assert_eq!(socket.status(), ConnectionStatus::Open);
        assert_eq!(socket.reconnect_attempts(), 0);
    }

    // Each loss after an open is the first failure of a new episode.
    assert_eq!(recorder.closes(), 3);
    assert_eq!(
        recorder.count(|seen| *seen == Seen::Open { is_reconnect: true }),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_delay_grows_to_ceiling() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = builder(&factory, &recorder)
        .timeout_interval(Duration::from_secs(60))
        .build()
        .expect("valid socket");

    socket.connect(false);
    for index in 0..6 {
        transport(&factory, index).drop_connection();
        settle().await;
        sleep(CEILING).await;
        settle().await;
    }

    let delays: Vec<_> = recorder
        .seen()
        .into_iter()
        .filter_map(|seen| match seen {
            Seen::Connecting {
                retry_in: Some(delay),
                ..
            } => Some(delay.as_millis()),
            _ => None,
        })
        .collect();

    assert_eq!(delays, vec![50, 100, 200, 400, 400, 400]);
    drop(socket);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_limit_ends_in_terminal_close() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = builder(&factory, &recorder)
        .timeout_interval(Duration::from_secs(60))
        .max_reconnect_attempts(2)
        .build()
        .expect("valid socket");

    socket.connect(false);
    for index in 0..3 {
        transport(&factory, index).drop_connection();
        settle().await;
        sleep(CEILING).await;
        settle().await;
    }

    assert_eq!(factory.attempts(), 3);
    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert_eq!(
        recorder.count(|seen| *seen == Seen::Close(CloseCause::AttemptsExhausted)),
        1
    );

    sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(factory.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_reconnects_without_close_notification() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    assert!(socket.refresh());
    settle().await;
    assert_eq!(socket.status(), ConnectionStatus::Connecting);

    sleep(INTERVAL).await;
    settle().await;
    transport(&factory, 1).open();
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Open);
    assert_eq!(recorder.closes(), 0);
    assert_eq!(recorder.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_send_after_refresh_is_rejected() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;

    assert!(socket.refresh());
    assert_eq!(socket.status(), ConnectionStatus::Connecting);

    let err = assert_err!(socket.send("hello"));
    assert!(matches!(err, Error::NotConnected));
    assert!(transport(&factory, 0).sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_from_discarded_transport_are_ignored() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::with_logic();
    let socket = socket(&factory, &recorder);

    socket.connect(false);
    let stale = transport(&factory, 0);
    stale.drop_connection();
    settle().await;
    sleep(INTERVAL).await;
    settle().await;
    recorder.clear();

    stale.open();
    stale.receive(r#"{"status":"late"}"#);
    stale.fail("late error");
    settle().await;

    assert!(recorder.seen().is_empty());
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert_eq!(socket.current_attempt(), Some(transport(&factory, 1).request().attempt));
}

// ============================================================================
// Messages and Errors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_messages_reach_business_logic() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::with_logic();
    let _socket = open_socket(&factory, &recorder).await;
    recorder.clear();

    transport(&factory, 0).receive(r#"{"status":"tick","data":{"n":1}}"#);
    settle().await;

    assert_eq!(
        recorder.seen(),
        vec![Seen::Message(json!({"status": "tick", "data": {"n": 1}}))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_message_errors_are_surfaced() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let _socket = open_socket(&factory, &recorder).await;
    recorder.clear();

    let remote = transport(&factory, 0);
    remote.receive(r#"{"status":"tick"}"#);
    remote.receive(r#"{"missing": "curly bracket to parse"#);
    remote.receive(vec![1u8, 2, 3]);
    settle().await;

    assert_eq!(
        recorder.seen(),
        vec![
            Seen::MessageError("unimplemented"),
            Seen::MessageError("malformed"),
            Seen::MessageError("unsupported"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_message_returns_pipeline_errors() {
    let factory = MemoryTransportFactory::new();
    let socket = socket(&factory, &Recorder::default());

    let err = assert_err!(socket.dispatch_message(&Frame::from(r#"{"missing": "curly bracket to parse"#)));
    assert!(matches!(err, Error::MalformedPayload { .. }));

    let err = assert_err!(socket.dispatch_message(&Frame::Binary(vec![42])));
    assert!(matches!(err, Error::UnsupportedPayloadType { .. }));

    let err = assert_err!(socket.dispatch_message(&Frame::from("{}")));
    assert!(matches!(err, Error::UnimplementedHandler { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_leaves_state_alone() {
    let factory = MemoryTransportFactory::new();
    let recorder = Recorder::default();
    let socket = open_socket(&factory, &recorder).await;
    recorder.clear();

    transport(&factory, 0).fail("checksum mismatch");
    settle().await;

    assert_eq!(recorder.seen(), vec![Seen::Error("checksum mismatch".into())]);
    assert_eq!(socket.status(), ConnectionStatus::Open);
    assert_eq!(factory.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handlers_may_call_back_into_socket() {
    let factory = MemoryTransportFactory::new();
    let socket = socket(&factory, &Recorder::default());

    let greeter = socket.clone();
    socket.set_handler(Callbacks::new().with_open(move |_| {
        let _ = greeter.send(Envelope::new("hello"));
    }));

    socket.connect(false);
    transport(&factory, 0).open();
    settle().await;

    assert_eq!(
        transport(&factory, 0).sent(),
        vec![Frame::from(r#"{"status":"hello"}"#)]
    );
}

// ============================================================================
// Transport Creation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_factory_may_query_socket_during_create() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&observed);
    let factory = HookFactory::new(move |socket, _| {
        log.lock().push((socket.status(), socket.has_transport()));
    });
    let recorder = Recorder::default();
    let socket = factory.build(builder(&factory.inner, &recorder));

    socket.connect(false);
    assert_eq!(socket.status(), ConnectionStatus::Connecting);
    assert!(socket.has_transport());

    // The retry is created by the driver task.
    transport(&factory.inner, 0).drop_connection();
    settle().await;
    sleep(INTERVAL).await;
    settle().await;

    transport(&factory.inner, 1).open();
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Open);
    assert_eq!(
        *observed.lock(),
        vec![
            (ConnectionStatus::Closed, false),
            (ConnectionStatus::Connecting, false),
        ]
    );
    factory.detach();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_create_discards_transport() {
    let factory = HookFactory::new(|socket, _| socket.shutdown());
    let recorder = Recorder::default();
    let socket = factory.build(builder(&factory.inner, &recorder));

    socket.connect(false);
    settle().await;

    assert_eq!(socket.status(), ConnectionStatus::Closed);
    assert!(!socket.has_transport());
    assert!(socket.is_forced_closed());
    assert_eq!(
        transport(&factory.inner, 0).close_requested(),
        Some((CLOSE_GOING_AWAY, "shutdown".to_owned()))
    );
    assert!(recorder.seen().is_empty());

    // A stray open from the discarded transport changes nothing.
    transport(&factory.inner, 0).open();
    settle().await;
    assert_eq!(socket.status(), ConnectionStatus::Closed);
    factory.detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_reported_during_create_is_not_lost() {
    let factory = HookFactory::new(|_, created| {
        created.open();
        // Give the driver time to see the event before the transport is installed.
        std::thread::sleep(Duration::from_millis(50));
    });
    let recorder = Recorder::default();
    let socket = factory.build(
        builder(&factory.inner, &recorder).timeout_interval(Duration::from_secs(5)),
    );

    let mut status = socket.subscribe_status();
    socket.connect(false);

    let opened = timeout(
        Duration::from_secs(5),
        status.wait_for(|current| *current == ConnectionStatus::Open),
    )
    .await;

    assert!(opened.is_ok());
    assert_eq!(socket.current_attempt(), Some(transport(&factory.inner, 0).request().attempt));
    factory.detach();
}
