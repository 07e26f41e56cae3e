//! Integration tests for the session using a scripted fake studio.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sceneguard_client::{ClientError, Notification, RemoteClient};
use sceneguard_protocol::Request;
use sceneguard_session::{
    spawn_session, ConnectionState, Observers, SceneOriginals, SessionConfig,
    SessionError, SessionHandle,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;

// =========================================================================
// Fake studio: connect outcomes are scripted, requests are recorded.
// =========================================================================

#[derive(Clone, Copy, Debug)]
enum Outcome {
    Accept,
    Refuse,
    RejectCredentials,
}

struct FakeState {
    script: VecDeque<Outcome>,
    fallback: Outcome,
    connected: bool,
    connects: usize,
    requests: Vec<Request>,
    scene: String,
    transition_ms: u64,
}

struct FakeStudio {
    state: Mutex<FakeState>,
    notify: broadcast::Sender<Notification>,
}

impl FakeStudio {
    fn new(fallback: Outcome) -> Arc<Self> {
        let (notify, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(FakeState {
                script: VecDeque::new(),
                fallback,
                connected: false,
                connects: 0,
                requests: Vec::new(),
                scene: "Live".to_string(),
                transition_ms: 300,
            }),
            notify,
        })
    }

    fn script(&self, outcomes: &[Outcome]) {
        self.state.lock().unwrap().script.extend(outcomes);
    }

    fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Recorded requests, minus the informational version query.
    fn scene_requests(&self) -> Vec<Request> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| **r != Request::GetVersion)
            .cloned()
            .collect()
    }

    fn scene(&self) -> String {
        self.state.lock().unwrap().scene.clone()
    }

    fn transition_ms(&self) -> u64 {
        self.state.lock().unwrap().transition_ms
    }

    /// Emits a notification without touching the connection.
    fn emit(&self, notification: Notification) {
        let _ = self.notify.send(notification);
    }

    /// Simulates the studio going away.
    fn drop_connection(&self) {
        self.state.lock().unwrap().connected = false;
        let _ = self.notify.send(Notification::ConnectionClosed);
    }
}

impl RemoteClient for FakeStudio {
    async fn connect(
        &self,
        _address: &str,
        _password: Option<&str>,
    ) -> Result<(), ClientError> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            let outcome = state.script.pop_front().unwrap_or(state.fallback);
            if let Outcome::Accept = outcome {
                state.connected = true;
            }
            outcome
        };
        match outcome {
            Outcome::Accept => {
                let _ = self.notify.send(Notification::ConnectionOpened);
                Ok(())
            }
            Outcome::Refuse => {
                let _ = self.notify.send(Notification::ConnectionClosed);
                Err(ClientError::ConnectFailed("connection refused".into()))
            }
            Outcome::RejectCredentials => {
                let _ = self.notify.send(Notification::AuthenticationFailure);
                let _ = self.notify.send(Notification::ConnectionClosed);
                Err(ClientError::AuthenticationFailed)
            }
        }
    }

    async fn disconnect(&self) {
        let was_connected =
            std::mem::replace(&mut self.state.lock().unwrap().connected, false);
        if was_connected {
            let _ = self.notify.send(Notification::ConnectionClosed);
        }
    }

    async fn send(&self, request: Request) -> Result<Value, ClientError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ClientError::NotConnected);
        }
        state.requests.push(request.clone());
        let reply = match request {
            Request::GetVersion => json!({
                "status": "ok",
                "obs-studio-version": "26.1.0",
                "obs-websocket-version": "4.9.0",
            }),
            Request::GetTransitionDuration => {
                json!({ "status": "ok", "transition-duration": state.transition_ms })
            }
            Request::SetTransitionDuration { duration } => {
                state.transition_ms = duration;
                json!({ "status": "ok" })
            }
            Request::GetCurrentScene => {
                json!({ "status": "ok", "name": state.scene, "sources": [] })
            }
            Request::SetCurrentScene { scene_name } => {
                state.scene = scene_name;
                json!({ "status": "ok" })
            }
        };
        Ok(reply)
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }
}

// =========================================================================
// Helpers
// =========================================================================

#[derive(Default)]
struct HookCounts {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    exhausted: AtomicUsize,
}

impl HookCounts {
    fn observers(self: &Arc<Self>) -> Observers {
        let (c, d, e) = (Arc::clone(self), Arc::clone(self), Arc::clone(self));
        Observers::new()
            .on_connected(move || {
                c.connected.fetch_add(1, Ordering::SeqCst);
            })
            .on_disconnected(move || {
                d.disconnected.fetch_add(1, Ordering::SeqCst);
            })
            .on_exhausted_retries(move || {
                e.exhausted.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn exhausted(&self) -> usize {
        self.exhausted.load(Ordering::SeqCst)
    }
}

/// Matches when the file name ends with the pattern minus a leading `*`.
fn suffix_matcher(path: &Path, pattern: &str) -> bool {
    path.to_string_lossy()
        .ends_with(pattern.trim_start_matches('*'))
}

fn config() -> SessionConfig {
    SessionConfig {
        service_address: "localhost:4455".to_string(),
        secret_scene: "Hidden".to_string(),
        patterns: vec!["*.secret.env".to_string()],
        ..SessionConfig::default()
    }
}

fn start(studio: &Arc<FakeStudio>) -> (SessionHandle, Arc<HookCounts>) {
    let hooks = Arc::new(HookCounts::default());
    let handle = spawn_session(
        config(),
        Arc::clone(studio),
        suffix_matcher,
        hooks.observers(),
    );
    (handle, hooks)
}

/// Lets every spawned task run until idle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_success_reports_connected() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.connection, ConnectionState::Connected);
    assert_eq!(status.retry_count, 0);
    assert!(handle.is_connected());
    assert_eq!(hooks.connected(), 1);
    assert_eq!(studio.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_when_connected_is_noop() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    handle.connect(true).await.unwrap();
    settle().await;

    assert_eq!(studio.connects(), 1);
    assert_eq!(hooks.connected(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connects_exhaust_retries_once() {
    let studio = FakeStudio::new(Outcome::Refuse);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    assert!(handle.is_connecting());

    // Five attempts, five seconds apart.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(studio.connects(), 5);
    assert_eq!(hooks.exhausted(), 1);
    assert!(!handle.is_connecting());
    assert!(!handle.is_connected());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(studio.connects(), 5);
    assert_eq!(hooks.exhausted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_reset_recovers_from_exhaustion() {
    let studio = FakeStudio::new(Outcome::Refuse);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(hooks.exhausted(), 1);

    // Without a reset the ceiling still holds.
    handle.connect(false).await.unwrap();
    settle().await;
    assert_eq!(studio.connects(), 5);

    studio.script(&[Outcome::Accept]);
    handle.connect(true).await.unwrap();
    settle().await;

    assert!(handle.is_connected());
    assert_eq!(studio.connects(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_after_refusals() {
    let studio = FakeStudio::new(Outcome::Accept);
    studio.script(&[Outcome::Refuse, Outcome::Refuse]);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(handle.is_connected());
    assert_eq!(studio.connects(), 3);
    assert_eq!(handle.snapshot().retry_count, 0);
    assert_eq!(hooks.exhausted(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_stops_retrying() {
    let studio = FakeStudio::new(Outcome::RejectCredentials);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let status = handle.status().await.unwrap();
    assert!(status.auth_failed);
    assert_eq!(status.connection, ConnectionState::Disconnected);
    assert_eq!(studio.connects(), 1);
    assert_eq!(hooks.exhausted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_then_repeated_closes_never_reconnects() {
    let studio = FakeStudio::new(Outcome::RejectCredentials);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    for _ in 0..10 {
        studio.emit(Notification::ConnectionClosed);
        settle().await;
    }
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(studio.connects(), 1);
    assert_eq!(handle.snapshot().connection, ConnectionState::Disconnected);
    assert_eq!(hooks.exhausted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_while_connected_blocks_reconnect() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    assert!(handle.is_connected());

    studio.emit(Notification::AuthenticationFailure);
    settle().await;
    assert!(handle.is_connected());
    assert!(handle.snapshot().auth_failed);

    studio.drop_connection();
    for _ in 0..5 {
        studio.emit(Notification::ConnectionClosed);
        settle().await;
    }
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(studio.connects(), 1);
    assert!(!handle.is_connected());
    assert!(!handle.is_connecting());
    assert_eq!(hooks.disconnected(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_authentication_failure_needs_reset() {
    let studio = FakeStudio::new(Outcome::Accept);
    studio.script(&[Outcome::RejectCredentials]);
    let (handle, _hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    handle.connect(false).await.unwrap();
    settle().await;
    assert_eq!(studio.connects(), 1);

    handle.connect(true).await.unwrap();
    settle().await;

    assert!(handle.is_connected());
    assert!(!handle.snapshot().auth_failed);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_drop_reconnects() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    studio.drop_connection();
    settle().await;

    assert!(handle.is_connected());
    assert_eq!(studio.connects(), 2);
    assert_eq!(hooks.disconnected(), 1);
    assert_eq!(hooks.connected(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_intentional_disconnect_does_not_reconnect() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    handle.disconnect().await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(!handle.is_connected());
    assert_eq!(studio.connects(), 1);
    assert_eq!(hooks.disconnected(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_cancels_retry() {
    let studio = FakeStudio::new(Outcome::Refuse);
    let (handle, hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    assert!(handle.is_connecting());

    handle.disconnect().await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(handle.snapshot().connection, ConnectionState::Disconnected);
    assert_eq!(studio.connects(), 1);
    assert_eq!(hooks.disconnected(), 1);
    assert_eq!(hooks.exhausted(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_connection_flips_state() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);

    handle.toggle_connection().await.unwrap();
    settle().await;
    assert!(handle.is_connected());

    handle.toggle_connection().await.unwrap();
    settle().await;
    assert!(!handle.is_connected());
    assert_eq!(studio.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let studio = FakeStudio::new(Outcome::Refuse);
    let (handle, _hooks) = start(&studio);

    handle.connect(false).await.unwrap();
    settle().await;
    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(studio.connects(), 1);
    assert!(matches!(
        handle.connect(true).await,
        Err(SessionError::Unavailable)
    ));
}

// =========================================================================
// Scene switching
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sensitive_file_switches_and_plain_file_reverts() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.auto_switch_scene("config.secret.env").await.unwrap();
    settle().await;

    assert_eq!(
        studio.scene_requests(),
        vec![
            Request::GetTransitionDuration,
            Request::SetTransitionDuration { duration: 0 },
            Request::GetCurrentScene,
            Request::SetCurrentScene {
                scene_name: "Hidden".into()
            },
        ]
    );
    let status = handle.status().await.unwrap();
    assert!(status.scene_switched);
    assert_eq!(status.original_scene.as_deref(), Some("Live"));
    assert_eq!(status.original_transition_ms, Some(300));

    handle.auto_switch_scene("main.ts").await.unwrap();
    settle().await;

    assert!(!handle.scene_is_switched());
    assert_eq!(studio.scene(), "Live");
    assert_eq!(studio.transition_ms(), 300);
    assert_eq!(
        studio.scene_requests()[4..],
        [
            Request::SetTransitionDuration { duration: 300 },
            Request::SetCurrentScene {
                scene_name: "Live".into()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_sensitive_file_does_not_recapture() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.auto_switch_scene("a.secret.env").await.unwrap();
    settle().await;
    handle.auto_switch_scene("b.secret.env").await.unwrap();
    settle().await;

    assert_eq!(studio.scene_requests().len(), 4);
    assert_eq!(
        handle.snapshot().original_scene.as_deref(),
        Some("Live")
    );
}

#[tokio::test(start_paused = true)]
async fn test_plain_file_when_not_switched_sends_nothing() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.auto_switch_scene("main.ts").await.unwrap();
    settle().await;

    assert!(studio.scene_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_switch_then_immediate_revert_restores_originals() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.switch_scene("Hidden", 0, true).await.unwrap();
    handle.revert_switch_scene().await.unwrap();
    settle().await;

    assert_eq!(studio.scene(), "Live");
    assert_eq!(studio.transition_ms(), 300);
    assert!(!handle.scene_is_switched());
}

#[tokio::test(start_paused = true)]
async fn test_switch_without_capture_is_not_revertible() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.switch_scene("Intermission", 500, false).await.unwrap();
    handle.revert_switch_scene().await.unwrap();
    settle().await;

    assert_eq!(studio.scene(), "Intermission");
    assert_eq!(studio.transition_ms(), 500);
    assert!(!handle.scene_is_switched());
}

#[tokio::test(start_paused = true)]
async fn test_auto_switch_while_disconnected_applies_on_connect() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);

    handle.auto_switch_scene("prod.secret.env").await.unwrap();
    settle().await;
    assert!(studio.scene_requests().is_empty());

    handle.connect(false).await.unwrap();
    settle().await;

    assert!(handle.scene_is_switched());
    assert_eq!(studio.scene(), "Hidden");
}

#[tokio::test(start_paused = true)]
async fn test_no_auto_switch_back_keeps_secret_scene() {
    let studio = FakeStudio::new(Outcome::Accept);
    let handle = spawn_session(
        SessionConfig {
            auto_switch_back: false,
            ..config()
        },
        Arc::clone(&studio),
        suffix_matcher,
        Observers::new(),
    );
    handle.connect(false).await.unwrap();
    settle().await;

    handle.auto_switch_scene("config.secret.env").await.unwrap();
    settle().await;
    handle.auto_switch_scene("main.ts").await.unwrap();
    settle().await;

    assert!(handle.scene_is_switched());
    assert_eq!(studio.scene(), "Hidden");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_finishes_queued_scene_jobs() {
    let studio = FakeStudio::new(Outcome::Accept);
    let (handle, _hooks) = start(&studio);
    handle.connect(false).await.unwrap();
    settle().await;

    handle.auto_switch_scene("config.secret.env").await.unwrap();
    handle.auto_switch_scene("main.ts").await.unwrap();
    handle.shutdown().await.unwrap();

    assert_eq!(studio.scene(), "Live");
    assert_eq!(studio.transition_ms(), 300);
    assert_eq!(studio.scene_requests().len(), 6);
    assert!(!studio.state.lock().unwrap().connected);
}

#[tokio::test(start_paused = true)]
async fn test_resumed_session_reverts_to_given_originals() {
    let studio = FakeStudio::new(Outcome::Accept);
    let handle = spawn_session(
        SessionConfig {
            resume: Some(SceneOriginals {
                scene: "Live".into(),
                transition_ms: 250,
            }),
            ..config()
        },
        Arc::clone(&studio),
        suffix_matcher,
        Observers::new(),
    );
    assert!(handle.scene_is_switched());

    handle.connect(false).await.unwrap();
    settle().await;
    handle.auto_switch_scene("still.secret.env").await.unwrap();
    settle().await;
    assert!(studio.scene_requests().is_empty());

    handle.auto_switch_scene("main.ts").await.unwrap();
    settle().await;

    assert_eq!(studio.scene(), "Live");
    assert_eq!(studio.transition_ms(), 250);
    assert!(!handle.scene_is_switched());
}

#[tokio::test(start_paused = true)]
async fn test_resumed_session_moves_to_renamed_secret_scene() {
    let studio = FakeStudio::new(Outcome::Accept);
    let handle = spawn_session(
        SessionConfig {
            secret_scene: "BRB".into(),
            resume: Some(SceneOriginals {
                scene: "Live".into(),
                transition_ms: 250,
            }),
            resumed_scene: Some("Hidden".into()),
            ..config()
        },
        Arc::clone(&studio),
        suffix_matcher,
        Observers::new(),
    );
    assert_eq!(handle.snapshot().switched_scene.as_deref(), Some("Hidden"));

    handle.connect(false).await.unwrap();
    settle().await;
    handle.auto_switch_scene("still.secret.env").await.unwrap();
    settle().await;

    assert_eq!(
        studio.scene_requests(),
        vec![
            Request::SetTransitionDuration { duration: 0 },
            Request::SetCurrentScene {
                scene_name: "BRB".into()
            },
        ]
    );
    let status = handle.status().await.unwrap();
    assert!(status.scene_switched);
    assert_eq!(status.switched_scene.as_deref(), Some("BRB"));
    assert_eq!(status.original_scene.as_deref(), Some("Live"));

    // A second matching file is now a no-op again.
    handle.auto_switch_scene("other.secret.env").await.unwrap();
    settle().await;
    assert_eq!(studio.scene_requests().len(), 2);

    handle.auto_switch_scene("main.ts").await.unwrap();
    settle().await;
    assert_eq!(studio.scene(), "Live");
    assert_eq!(studio.transition_ms(), 250);
}
