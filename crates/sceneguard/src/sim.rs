//! An in-process stand-in for the streaming studio.
//!
//! [`SimulatedStudio`] implements [`RemoteClient`] on top of a bit of
//! shared state instead of a socket. It keeps a scene list, a program
//! scene and a transition duration, answers the same requests a real
//! studio would, and emits the same notifications, including the
//! `ConnectionClosed` that follows every failed connect.

use std::sync::{Mutex, MutexGuard, PoisonError};

use sceneguard_client::{ClientError, Notification, RemoteClient};
use sceneguard_protocol::Request;
use serde_json::{json, Value};
use tokio::sync::broadcast;

const NOTIFICATION_CAPACITY: usize = 64;

const STUDIO_VERSION: &str = "26.1.2";
const WEBSOCKET_VERSION: &str = "4.9.1";

#[derive(Debug)]
struct StudioState {
    online: bool,
    password: Option<String>,
    connected: bool,
    connect_attempts: usize,
    scenes: Vec<String>,
    program_scene: String,
    transition_ms: u64,
    requests: Vec<Request>,
}

/// A fake studio that lives in the same process.
#[derive(Debug)]
pub struct SimulatedStudio {
    state: Mutex<StudioState>,
    notify: broadcast::Sender<Notification>,
}

impl SimulatedStudio {
    /// An online studio showing `program_scene` with the given transition
    /// duration and no password.
    pub fn new(program_scene: impl Into<String>, transition_ms: u64) -> Self {
        let program_scene = program_scene.into();
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            state: Mutex::new(StudioState {
                online: true,
                password: None,
                connected: false,
                connect_attempts: 0,
                scenes: vec![program_scene.clone()],
                program_scene,
                transition_ms,
                requests: Vec::new(),
            }),
            notify,
        }
    }

    /// Adds a scene that `SetCurrentScene` may switch to.
    pub fn with_scene(self, scene: impl Into<String>) -> Self {
        let scene = scene.into();
        {
            let mut state = self.state();
            if !state.scenes.contains(&scene) {
                state.scenes.push(scene);
            }
        }
        self
    }

    /// Requires `password` on connect.
    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.state().password = Some(password.into());
        self
    }

    /// Takes the studio offline (connects are refused) or back online.
    /// Going offline drops an open connection.
    pub fn set_online(&self, online: bool) {
        self.state().online = online;
        if !online {
            self.drop_connection();
        }
    }

    /// Drops the open connection as if the studio crashed.
    pub fn drop_connection(&self) {
        let was_connected = std::mem::replace(&mut self.state().connected, false);
        if was_connected {
            tracing::debug!("simulated studio dropped the connection");
            self.emit(Notification::ConnectionClosed);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Number of `connect` calls seen so far.
    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn program_scene(&self) -> String {
        self.state().program_scene.clone()
    }

    pub fn transition_ms(&self) -> u64 {
        self.state().transition_ms
    }

    /// Every request answered so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, StudioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notify.send(notification);
    }

    fn answer(state: &mut StudioState, request: Request) -> Value {
        match request {
            Request::GetVersion => json!({
                "status": "ok",
                "obs-studio-version": STUDIO_VERSION,
                "obs-websocket-version": WEBSOCKET_VERSION,
            }),
            Request::GetTransitionDuration => json!({
                "status": "ok",
                "transition-duration": state.transition_ms,
            }),
            Request::SetTransitionDuration { duration } => {
                state.transition_ms = duration;
                json!({ "status": "ok" })
            }
            Request::GetCurrentScene => json!({
                "status": "ok",
                "name": state.program_scene,
                "sources": [],
            }),
            Request::SetCurrentScene { scene_name } => {
                if state.scenes.contains(&scene_name) {
                    state.program_scene = scene_name;
                    json!({ "status": "ok" })
                } else {
                    json!({
                        "status": "error",
                        "error": "requested scene does not exist",
                    })
                }
            }
        }
    }
}

impl RemoteClient for SimulatedStudio {
    async fn connect(
        &self,
        address: &str,
        password: Option<&str>,
    ) -> Result<(), ClientError> {
        let result = {
            let mut state = self.state();
            state.connect_attempts += 1;
            if state.connected {
                return Ok(());
            }
            if !state.online {
                Err(ClientError::ConnectFailed(format!(
                    "connection refused by {address}"
                )))
            } else if state.password.is_some()
                && state.password.as_deref() != password
            {
                Err(ClientError::AuthenticationFailed)
            } else {
                state.connected = true;
                Ok(())
            }
        };

        match &result {
            Ok(()) => self.emit(Notification::ConnectionOpened),
            Err(ClientError::AuthenticationFailed) => {
                self.emit(Notification::AuthenticationFailure);
                self.emit(Notification::ConnectionClosed);
            }
            Err(_) => self.emit(Notification::ConnectionClosed),
        }
        result
    }

    async fn disconnect(&self) {
        self.drop_connection();
    }

    async fn send(&self, request: Request) -> Result<Value, ClientError> {
        let mut state = self.state();
        if !state.connected {
            return Err(ClientError::NotConnected);
        }
        state.requests.push(request.clone());
        Ok(Self::answer(&mut state, request))
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }
}
