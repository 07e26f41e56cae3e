//! `SceneGuard` builder and the editor-facing command surface.
//!
//! This is what an editor integration talks to. It owns the current
//! [`Settings`], resolves the password, and keeps exactly one session
//! alive. Any settings change replaces that session with a fresh one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sceneguard_client::RemoteClient;
use sceneguard_session::{
    spawn_session, ConnectionState, CredentialStore, FileMatcher, Observers,
    RetryPolicy, SceneOriginals, Secret, SessionConfig, SessionError,
    SessionHandle, SessionStatus,
};

use crate::{SceneGuardError, Settings};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// What the status indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Connected,
    Connecting,
    Disconnected,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Connecting => "Connecting...",
            Self::Disconnected => "Disconnected",
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            Self::Connected => "Connected to the studio",
            Self::Connecting => "Trying to connect to the studio",
            Self::Disconnected => "Disconnected from the studio",
        }
    }
}

impl From<&SessionStatus> for Status {
    fn from(status: &SessionStatus) -> Self {
        match status.connection {
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Disconnected => Self::Disconnected,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SceneGuard`].
///
/// # Example
///
/// ```rust,ignore
/// let guard = SceneGuardBuilder::new()
///     .settings(Settings::load("sceneguard.toml")?)
///     .observers(Observers::new().on_connected(refresh_status_bar))
///     .build(Arc::new(studio), MemoryCredentialStore::new(), GlobMatcher);
/// guard.activate().await?;
/// ```
#[derive(Debug, Default)]
pub struct SceneGuardBuilder {
    settings: Settings,
    observers: Observers,
    retry: RetryPolicy,
}

impl SceneGuardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings.validated();
        self
    }

    /// Hooks handed to every session this guard spawns.
    pub fn observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Spawns the first session. It stays disconnected until
    /// [`SceneGuard::activate`] or [`SceneGuard::start`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build<C, S, M>(
        self,
        client: Arc<C>,
        credentials: S,
        matcher: M,
    ) -> SceneGuard<C, S, M>
    where
        C: RemoteClient,
        S: CredentialStore,
        M: FileMatcher + Clone,
    {
        let session = new_session(
            &self.settings,
            self.retry,
            None,
            None,
            &client,
            &credentials,
            &matcher,
            &self.observers,
        );
        SceneGuard {
            client,
            credentials,
            matcher,
            observers: self.observers,
            retry: self.retry,
            settings: self.settings,
            session,
            active_file: None,
        }
    }
}

fn new_session<C, S, M>(
    settings: &Settings,
    retry: RetryPolicy,
    resume: Option<SceneOriginals>,
    resumed_scene: Option<String>,
    client: &Arc<C>,
    credentials: &S,
    matcher: &M,
    observers: &Observers,
) -> SessionHandle
where
    C: RemoteClient,
    S: CredentialStore,
    M: FileMatcher + Clone,
{
    let credential = resolve_credential(settings, credentials);
    let config = SessionConfig {
        resume,
        resumed_scene,
        ..settings.session_config(credential, retry)
    };
    spawn_session(
        config,
        Arc::clone(client),
        matcher.clone(),
        observers.clone(),
    )
}

fn resolve_credential<S: CredentialStore>(
    settings: &Settings,
    credentials: &S,
) -> Option<Secret> {
    if !settings.use_password {
        return None;
    }
    if !credentials.exists() {
        tracing::warn!("password requested but no credential store is available");
        return None;
    }
    let secret = credentials.get(&settings.service_url);
    if secret.is_none() {
        tracing::warn!(address = %settings.service_url, "no password stored for the studio");
    }
    secret
}

// ---------------------------------------------------------------------------
// SceneGuard
// ---------------------------------------------------------------------------

/// The running application: settings plus one live session.
pub struct SceneGuard<C, S, M> {
    client: Arc<C>,
    credentials: S,
    matcher: M,
    observers: Observers,
    retry: RetryPolicy,
    settings: Settings,
    session: SessionHandle,
    /// Replayed into every replacement session.
    active_file: Option<PathBuf>,
}

impl<C, S, M> SceneGuard<C, S, M>
where
    C: RemoteClient,
    S: CredentialStore,
    M: FileMatcher + Clone,
{
    /// Called once when the editor loads the integration: starts connecting.
    pub async fn activate(&self) -> Result<(), SceneGuardError> {
        tracing::info!(
            address = %self.settings.service_url,
            patterns = self.settings.file_names.len(),
            "sceneguard activated"
        );
        self.start().await
    }

    /// Connects with a fresh retry budget.
    pub async fn start(&self) -> Result<(), SceneGuardError> {
        Ok(self.session.connect(true).await?)
    }

    pub async fn stop(&self) -> Result<(), SceneGuardError> {
        Ok(self.session.disconnect().await?)
    }

    pub async fn toggle(&self) -> Result<(), SceneGuardError> {
        Ok(self.session.toggle_connection().await?)
    }

    /// Tells the session which file the editor now shows.
    pub async fn active_editor_changed(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), SceneGuardError> {
        let path = path.as_ref().to_path_buf();
        self.session.auto_switch_scene(&path).await?;
        self.active_file = Some(path);
        Ok(())
    }

    /// Replaces the settings. Unchanged settings are a no-op; anything
    /// else rebuilds the session.
    pub async fn apply_settings(
        &mut self,
        settings: Settings,
    ) -> Result<(), SceneGuardError> {
        let settings = settings.validated();
        if settings == self.settings {
            tracing::debug!("settings unchanged");
            return Ok(());
        }
        self.settings = settings;
        self.rebuild().await
    }

    /// Adds the file names of `paths` to the sensitive patterns.
    pub async fn add_secret_files<P: AsRef<Path>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<(), SceneGuardError> {
        let mut settings = self.settings.clone();
        for name in file_names(paths) {
            if !settings.file_names.contains(&name) {
                tracing::info!(file = %name, "adding file to secrets");
                settings.file_names.push(name);
            }
        }
        self.apply_settings(settings).await
    }

    /// Removes the file names of `paths` from the sensitive patterns.
    pub async fn remove_secret_files<P: AsRef<Path>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<(), SceneGuardError> {
        let names = file_names(paths);
        let mut settings = self.settings.clone();
        settings.file_names.retain(|pattern| {
            let keep = !names.contains(pattern);
            if !keep {
                tracing::info!(file = %pattern, "removing file from secrets");
            }
            keep
        });
        self.apply_settings(settings).await
    }

    /// Stores the studio password under the current service address and
    /// reconnects with it. Blank input is rejected so the caller can
    /// prompt again.
    pub async fn set_password(
        &mut self,
        password: &str,
    ) -> Result<(), SceneGuardError> {
        if password.trim().is_empty() {
            return Err(SceneGuardError::EmptyPassword);
        }
        self.credentials
            .set(&self.settings.service_url, Secret::new(password));
        tracing::info!(address = %self.settings.service_url, "password stored");
        self.rebuild().await
    }

    /// Forgets the stored password. Returns whether one was removed.
    pub fn clear_password(&self) -> bool {
        let removed = self.credentials.delete(&self.settings.service_url);
        tracing::info!(address = %self.settings.service_url, removed, "password cleared");
        removed
    }

    /// Status indicator state, as last published by the session.
    pub fn status(&self) -> Status {
        Status::from(&self.session.snapshot())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The live session, for status queries and direct scene control.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Puts the original scene back, if switched, and stops the session.
    pub async fn shutdown(self) -> Result<(), SceneGuardError> {
        if self.session.scene_is_switched() {
            self.session.revert_switch_scene().await?;
        }
        self.session.shutdown().await?;
        tracing::info!("sceneguard stopped");
        Ok(())
    }

    async fn rebuild(&mut self) -> Result<(), SceneGuardError> {
        tracing::info!(address = %self.settings.service_url, "settings changed, rebuilding session");
        match self.session.shutdown().await {
            Ok(()) | Err(SessionError::Unavailable) => {}
            Err(error) => return Err(error.into()),
        }

        // Hand a switched scene over instead of flashing the real one.
        let last = self.session.snapshot();
        let resume = last.scene_switched.then(|| {
            let defaults = SceneOriginals::default();
            SceneOriginals {
                scene: last.original_scene.unwrap_or(defaults.scene),
                transition_ms: last
                    .original_transition_ms
                    .unwrap_or(defaults.transition_ms),
            }
        });

        self.session = new_session(
            &self.settings,
            self.retry,
            resume,
            last.switched_scene,
            &self.client,
            &self.credentials,
            &self.matcher,
            &self.observers,
        );
        if let Some(path) = &self.active_file {
            self.session.auto_switch_scene(path).await?;
        }
        self.start().await
    }
}

/// Basenames of `paths`; paths without one are skipped.
fn file_names<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Vec<String> {
    paths
        .into_iter()
        .filter_map(|path| {
            path.as_ref()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect()
}
