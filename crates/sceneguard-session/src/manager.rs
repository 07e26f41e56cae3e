//! The session manager: one task that owns the connection to the studio.
//!
//! Everything that can change session state funnels into a single
//! `tokio::select!` loop:
//!
//! - **commands** from [`SessionHandle`] (connect, switch scene, ...)
//! - **notifications** from the [`RemoteClient`] (opened, closed, auth failure)
//! - **events** from tasks the session spawned itself (a connect attempt
//!   failed, a retry timer elapsed, the scene worker captured originals)
//!
//! Nothing the loop does awaits the studio. Connects, RPCs and timers run
//! on their own tasks and report back as events, so the state below is
//! only ever touched by one task at a time. Shutdown is the exception: it
//! waits for queued scene jobs to finish, then closes the connection.
//!
//! # Retry bookkeeping
//!
//! Each connect attempt gets an id. A failure is acted on only if it
//! belongs to the latest attempt, and at most one retry timer is pending,
//! so the error and the `ConnectionClosed` of the same attempt schedule a
//! single retry. Timers carry a generation number and are aborted on
//! teardown, on an explicit connect or disconnect, and on auth failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sceneguard_client::{ClientError, Notification, RemoteClient};
use sceneguard_protocol::{Request, VersionInfo};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::scene::{self, SceneJob, SceneOriginals, SceneWorker};
use crate::{
    ConnectionState, FileMatcher, Observers, Secret, SessionConfig,
    SessionError, SessionStatus,
};

/// Bound on queued commands before `SessionHandle` calls start waiting.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Commands sent to the session task through its channel.
pub(crate) enum SessionCommand {
    Connect { reset_retry_count: bool },
    Disconnect,
    Toggle,
    SwitchScene {
        scene: String,
        transition_ms: u64,
        capture_current: bool,
    },
    RevertSwitchScene,
    AutoSwitchScene { path: PathBuf },
    GetStatus { reply: oneshot::Sender<SessionStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Results reported back by tasks the session spawned.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    ConnectFailed { attempt: u64, error: ClientError },
    RetryElapsed { generation: u64 },
    OriginalsCaptured(SceneOriginals),
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session. Cheap to clone.
///
/// Command methods return as soon as the command is queued; the outcome
/// shows up in the status and through the [`Observers`]. They only fail
/// with [`SessionError::Unavailable`] once the session has stopped.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Starts connecting. With `reset_retry_count`, also clears the attempt
    /// counter and a previous auth failure, which is the only way out of
    /// an exhausted session.
    pub async fn connect(
        &self,
        reset_retry_count: bool,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::Connect { reset_retry_count }).await
    }

    /// Closes the connection on purpose; no automatic reconnect follows.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect).await
    }

    /// Disconnects if connected, otherwise `connect(true)`.
    pub async fn toggle_connection(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Toggle).await
    }

    /// Puts `scene` on program with the given transition duration.
    ///
    /// With `capture_current`, the scene and duration on program right
    /// now are remembered for [`revert_switch_scene`](Self::revert_switch_scene)
    /// and the session counts as switched.
    pub async fn switch_scene(
        &self,
        scene: impl Into<String>,
        transition_ms: u64,
        capture_current: bool,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::SwitchScene {
            scene: scene.into(),
            transition_ms,
            capture_current,
        })
        .await
    }

    /// Restores the captured scene and transition duration, if switched.
    pub async fn revert_switch_scene(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RevertSwitchScene).await
    }

    /// Reacts to `path` becoming the active file: switch to the secret
    /// scene if it matches a pattern, switch back if it doesn't.
    pub async fn auto_switch_scene(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::AutoSwitchScene {
            path: path.as_ref().to_path_buf(),
        })
        .await
    }

    /// Asks the session task for its status, after every command queued
    /// before this one has been handled.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::GetStatus { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Stops the session: cancels pending retries, stops the scene worker
    /// and closes the connection. Resolves once all of that is done.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.status.borrow().is_connecting()
    }

    pub fn scene_is_switched(&self) -> bool {
        self.status.borrow().scene_switched
    }

    /// The last status the session published.
    pub fn snapshot(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// A receiver that wakes on every published status change.
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SessionError::Unavailable)
    }
}

/// Spawns a session task and returns a handle to it.
///
/// The session starts `Disconnected`; call
/// [`SessionHandle::connect`] to bring it up. Must be called from within
/// a Tokio runtime.
pub fn spawn_session<C, M>(
    config: SessionConfig,
    client: Arc<C>,
    matcher: M,
    observers: Observers,
) -> SessionHandle
where
    C: RemoteClient,
    M: FileMatcher,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());

    // Subscribe before returning so no notification can slip past.
    let notifications = client.subscribe();

    let resume = config.resume.clone();
    let switched_scene = resume.as_ref().map(|_| {
        config
            .resumed_scene
            .clone()
            .unwrap_or_else(|| config.secret_scene.clone())
    });
    let worker = SceneWorker::new(
        Arc::clone(&client),
        resume.clone().unwrap_or_default(),
        jobs_rx,
        events_tx.clone(),
    );
    let scene_worker = tokio::spawn(worker.run());

    tracing::debug!(
        address = %config.service_address,
        patterns = config.patterns.len(),
        "session created"
    );

    let actor = SessionActor {
        config,
        client,
        matcher,
        observers,
        state: ConnectionState::Disconnected,
        retry_count: 0,
        auth_failed: false,
        exhausted: false,
        intentional_disconnect: false,
        scene_switched: resume.is_some(),
        switched_scene,
        originals: resume,
        active_file: None,
        attempt: 0,
        retry_timer: None,
        retry_generation: 0,
        scene_jobs: jobs_tx,
        scene_worker,
        commands: command_rx,
        notifications,
        listening: true,
        events_tx,
        events: events_rx,
        status: status_tx,
    };
    actor.publish();

    tokio::spawn(actor.run());

    SessionHandle {
        sender: command_tx,
        status: status_rx,
    }
}

// ---------------------------------------------------------------------------
// SessionActor
// ---------------------------------------------------------------------------

struct SessionActor<C, M> {
    config: SessionConfig,
    client: Arc<C>,
    matcher: M,
    observers: Observers,

    state: ConnectionState,
    retry_count: u32,
    auth_failed: bool,
    /// `on_exhausted_retries` already fired for the current episode.
    exhausted: bool,
    intentional_disconnect: bool,

    scene_switched: bool,
    /// Secret scene put on program by the last capturing switch.
    switched_scene: Option<String>,
    originals: Option<SceneOriginals>,
    /// Last path passed to `auto_switch_scene`, replayed on reconnect.
    active_file: Option<PathBuf>,

    /// Id of the latest connect attempt.
    attempt: u64,
    retry_timer: Option<JoinHandle<()>>,
    retry_generation: u64,

    scene_jobs: mpsc::UnboundedSender<SceneJob>,
    scene_worker: JoinHandle<()>,

    commands: mpsc::Receiver<SessionCommand>,
    notifications: broadcast::Receiver<Notification>,
    /// Cleared when the client drops its notification sender.
    listening: bool,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl<C: RemoteClient, M: FileMatcher> SessionActor<C, M> {
    async fn run(mut self) {
        tracing::info!(address = %self.config.service_address, "session started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown { reply }) => {
                        self.teardown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                notification = self.notifications.recv(), if self.listening => {
                    match notification {
                        Ok(notification) => self.handle_notification(notification),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "missed studio notifications");
                        }
                        Err(RecvError::Closed) => {
                            tracing::warn!("studio client stopped emitting notifications");
                            self.listening = false;
                        }
                    }
                }
                Some(event) = self.events.recv() => self.handle_event(event),
            }
            self.publish();
        }

        tracing::info!(address = %self.config.service_address, "session stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { reset_retry_count } => {
                self.connect(reset_retry_count);
            }
            SessionCommand::Disconnect => self.disconnect(),
            SessionCommand::Toggle => {
                if self.state == ConnectionState::Connected {
                    self.disconnect();
                } else {
                    self.connect(true);
                }
            }
            SessionCommand::SwitchScene {
                scene,
                transition_ms,
                capture_current,
            } => self.switch_scene(scene, transition_ms, capture_current),
            SessionCommand::RevertSwitchScene => self.revert_switch_scene(),
            SessionCommand::AutoSwitchScene { path } => {
                self.auto_switch_scene(path);
            }
            SessionCommand::GetStatus { reply } => {
                let _ = reply.send(self.status());
            }
            // Handled in `run`, it needs to await.
            SessionCommand::Shutdown { .. } => {}
        }
    }

    // -- Connection lifecycle ---------------------------------------------

    fn connect(&mut self, reset_retry_count: bool) {
        if self.state == ConnectionState::Connected {
            tracing::debug!("connect ignored, already connected");
            return;
        }
        self.cancel_retry();
        if reset_retry_count {
            self.retry_count = 0;
            self.auth_failed = false;
            self.exhausted = false;
        }

        if self.retry_count >= self.config.retry.max_attempts || self.auth_failed
        {
            self.set_state(ConnectionState::Disconnected);
            tracing::warn!(
                address = %self.config.service_address,
                attempts = self.retry_count,
                auth_failed = self.auth_failed,
                "exhausted all attempts to connect to the studio; check that it is running and start the connection again"
            );
            self.halt();
            return;
        }

        self.retry_count += 1;
        self.attempt += 1;
        self.set_state(ConnectionState::Connecting);
        tracing::info!(
            address = %self.config.service_address,
            attempt = self.retry_count,
            max_attempts = self.config.retry.max_attempts,
            "trying to connect to the studio"
        );

        let attempt = self.attempt;
        let client = Arc::clone(&self.client);
        let address = self.config.service_address.clone();
        let credential = self.config.credential.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let password = credential.as_ref().map(Secret::expose);
            if let Err(error) = client.connect(&address, password).await {
                let _ = events.send(SessionEvent::ConnectFailed { attempt, error });
            }
        });
    }

    fn disconnect(&mut self) {
        match self.state {
            ConnectionState::Disconnected => {
                tracing::debug!("disconnect ignored, not connected");
            }
            ConnectionState::Connected => {
                tracing::info!("disconnecting from the studio");
                self.intentional_disconnect = true;
                self.spawn_disconnect();
            }
            ConnectionState::Connecting => {
                tracing::info!("connection attempt cancelled");
                self.intentional_disconnect = true;
                self.cancel_retry();
                // Whatever the in-flight attempt reports is now stale.
                self.attempt += 1;
                self.set_state(ConnectionState::Disconnected);
                self.spawn_disconnect();
                self.observers.disconnected();
            }
        }
    }

    fn spawn_disconnect(&self) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move { client.disconnect().await });
    }

    fn schedule_retry(&mut self) {
        if self.retry_timer.is_some() {
            tracing::debug!("retry already scheduled");
            return;
        }
        self.retry_generation += 1;
        let generation = self.retry_generation;
        let delay = self.config.retry.delay;
        let events = self.events_tx.clone();
        tracing::info!(delay_secs = delay.as_secs_f64(), "retrying connection");
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::RetryElapsed { generation });
        }));
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    /// Fires `on_exhausted_retries`, at most once per episode.
    fn halt(&mut self) {
        if !self.exhausted {
            self.exhausted = true;
            self.observers.exhausted_retries();
        }
    }

    async fn teardown(&mut self) {
        self.cancel_retry();
        self.drain_scene_worker().await;
        if self.state != ConnectionState::Disconnected {
            self.intentional_disconnect = true;
            self.client.disconnect().await;
            self.set_state(ConnectionState::Disconnected);
        }
        // Captures reported while draining.
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::OriginalsCaptured(originals) = event {
                self.originals = Some(originals);
            }
        }
        self.publish();
    }

    /// Lets the worker finish the jobs already queued, then stops it.
    async fn drain_scene_worker(&mut self) {
        let (closed, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.scene_jobs, closed));
        if let Err(error) = (&mut self.scene_worker).await {
            tracing::warn!(%error, "scene worker ended abnormally");
        }
    }

    // -- Notifications ----------------------------------------------------

    fn handle_notification(&mut self, notification: Notification) {
        tracing::debug!(%notification, state = %self.state, "studio notification");
        match notification {
            Notification::ConnectionOpened => self.connection_opened(),
            Notification::ConnectionClosed => self.connection_closed(),
            Notification::AuthenticationFailure => self.authentication_failed(),
        }
    }

    fn connection_opened(&mut self) {
        if self.state == ConnectionState::Disconnected && self.intentional_disconnect {
            tracing::info!("connection opened after it was cancelled, closing it");
            self.spawn_disconnect();
            return;
        }

        self.cancel_retry();
        self.retry_count = 0;
        self.intentional_disconnect = false;
        self.exhausted = false;
        self.set_state(ConnectionState::Connected);
        tracing::info!(address = %self.config.service_address, "connected to the studio");

        self.log_version_info();
        self.observers.connected();

        if let Some(path) = self.active_file.clone() {
            self.auto_switch_scene(path);
        }
    }

    fn connection_closed(&mut self) {
        match self.state {
            ConnectionState::Connected => {
                self.set_state(ConnectionState::Disconnected);
                tracing::info!("disconnected from the studio");
                self.observers.disconnected();
                if !self.intentional_disconnect && !self.auth_failed {
                    tracing::info!("connection dropped unexpectedly, reconnecting");
                    self.connect(false);
                }
            }
            ConnectionState::Connecting => {
                if self.auth_failed || self.retry_timer.is_some() {
                    return;
                }
                tracing::info!("a connection with the studio could not be established");
                self.schedule_retry();
            }
            ConnectionState::Disconnected => {
                tracing::debug!("close ignored, already disconnected");
            }
        }
    }

    fn authentication_failed(&mut self) {
        tracing::error!(
            address = %self.config.service_address,
            "studio rejected the password; fix it and start the connection again"
        );
        self.auth_failed = true;
        self.cancel_retry();
        if self.state != ConnectionState::Connected {
            self.set_state(ConnectionState::Disconnected);
            self.halt();
        }
    }

    fn log_version_info(&self) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            match scene::request::<C, VersionInfo>(&client, Request::GetVersion)
                .await
            {
                Ok(info) => tracing::info!(
                    studio = %info.studio_version,
                    websocket = %info.websocket_version,
                    "studio version"
                ),
                Err(error) => {
                    tracing::debug!(%error, "could not read the studio version")
                }
            }
        });
    }

    // -- Internal events --------------------------------------------------

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ConnectFailed { attempt, error } => {
                if attempt != self.attempt
                    || self.state != ConnectionState::Connecting
                {
                    tracing::debug!(%error, attempt, "ignoring failure of a superseded attempt");
                    return;
                }
                if error.is_authentication() {
                    // The AuthenticationFailure notification does the bookkeeping.
                    return;
                }
                tracing::warn!(%error, "could not establish a connection with the studio");
                self.schedule_retry();
            }
            SessionEvent::RetryElapsed { generation } => {
                if self.retry_timer.is_none() || generation != self.retry_generation {
                    return;
                }
                self.retry_timer = None;
                self.connect(false);
            }
            SessionEvent::OriginalsCaptured(originals) => {
                self.originals = Some(originals);
            }
        }
    }

    // -- Scene switching --------------------------------------------------

    fn switch_scene(
        &mut self,
        scene: String,
        transition_ms: u64,
        capture_current: bool,
    ) {
        tracing::info!(%scene, transition_ms, capture_current, "switching scene");
        self.scene_switched = capture_current;
        self.switched_scene = capture_current.then(|| scene.clone());
        let job = SceneJob::Switch {
            scene,
            transition_ms,
            capture_current,
        };
        if self.scene_jobs.send(job).is_err() {
            tracing::warn!("scene worker is gone, switch dropped");
        }
    }

    fn revert_switch_scene(&mut self) {
        if !self.scene_switched {
            tracing::debug!("revert ignored, scene not switched");
            return;
        }
        tracing::info!("switching back to the original scene");
        self.scene_switched = false;
        self.switched_scene = None;
        if self.scene_jobs.send(SceneJob::Revert).is_err() {
            tracing::warn!("scene worker is gone, revert dropped");
        }
    }

    fn auto_switch_scene(&mut self, path: PathBuf) {
        if self.state != ConnectionState::Connected {
            tracing::debug!(path = %path.display(), "not connected, scene left alone");
            self.active_file = Some(path);
            return;
        }

        let matched = self
            .config
            .patterns
            .iter()
            .find(|pattern| self.matcher.matches(&path, pattern))
            .cloned();

        match matched {
            // Secret scene was renamed since the switch. Move program over
            // without capturing; the originals stay what they were.
            Some(pattern)
                if self.scene_switched
                    && self.switched_scene.as_deref()
                        != Some(self.config.secret_scene.as_str()) =>
            {
                let scene = self.config.secret_scene.clone();
                tracing::info!(path = %path.display(), %pattern, %scene, "moving to the new secret scene");
                self.switched_scene = Some(scene.clone());
                let job = SceneJob::Switch {
                    scene,
                    transition_ms: 0,
                    capture_current: false,
                };
                if self.scene_jobs.send(job).is_err() {
                    tracing::warn!("scene worker is gone, switch dropped");
                }
            }
            // Capturing again would record the secret scene as the original.
            Some(pattern) if self.scene_switched => {
                tracing::debug!(path = %path.display(), %pattern, "already on the secret scene");
            }
            Some(pattern) => {
                tracing::info!(path = %path.display(), %pattern, "sensitive file is active");
                self.switch_scene(self.config.secret_scene.clone(), 0, true);
            }
            None if self.scene_switched && self.config.auto_switch_back => {
                self.revert_switch_scene();
            }
            None => {}
        }
        self.active_file = Some(path);
    }

    // -- Status -----------------------------------------------------------

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "connection state changed");
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            connection: self.state,
            retry_count: self.retry_count,
            auth_failed: self.auth_failed,
            scene_switched: self.scene_switched,
            switched_scene: self.switched_scene.clone(),
            original_scene: self.originals.as_ref().map(|o| o.scene.clone()),
            original_transition_ms: self.originals.as_ref().map(|o| o.transition_ms),
        }
    }
}

impl<C, M> Drop for SessionActor<C, M> {
    fn drop(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.scene_worker.abort();
    }
}
