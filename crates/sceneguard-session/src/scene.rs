//! Scene-switch orchestration.
//!
//! Each session owns one [`SceneWorker`] task. The session decides *what*
//! to do (switch to the secret scene, or revert) and queues a
//! [`SceneJob`]; the worker performs the RPCs of each job strictly in
//! order:
//!
//! ```text
//! [GetTransitionDuration] → SetTransitionDuration → [GetCurrentScene] → SetCurrentScene
//!   (only when capturing)                           (only when capturing)
//! ```
//!
//! Running jobs one after another means a capture has always landed
//! before a later revert reads it, and the current scene is read before
//! the switch replaces it. Failures are logged and the job moves on;
//! nothing is rolled back.

use std::sync::Arc;

use sceneguard_client::RemoteClient;
use sceneguard_protocol::{
    decode_response, CurrentScene, Request, TransitionDuration,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::sync::mpsc;

use crate::manager::SessionEvent;
use crate::SessionError;

/// The scene and transition duration to restore on revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneOriginals {
    pub scene: String,
    pub transition_ms: u64,
}

/// Used until the first capture succeeds.
impl Default for SceneOriginals {
    fn default() -> Self {
        Self {
            scene: "Scene".to_string(),
            transition_ms: 300,
        }
    }
}

/// Work queued by the session for the scene worker.
#[derive(Debug)]
pub(crate) enum SceneJob {
    /// Switch to `scene`, optionally capturing what's on program first.
    Switch {
        scene: String,
        transition_ms: u64,
        capture_current: bool,
    },
    /// Switch back to whatever was captured last.
    Revert,
}

pub(crate) struct SceneWorker<C> {
    client: Arc<C>,
    originals: SceneOriginals,
    jobs: mpsc::UnboundedReceiver<SceneJob>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<C: RemoteClient> SceneWorker<C> {
    pub(crate) fn new(
        client: Arc<C>,
        originals: SceneOriginals,
        jobs: mpsc::UnboundedReceiver<SceneJob>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            client,
            originals,
            jobs,
            events,
        }
    }

    /// Processes jobs until the session drops its sender.
    pub(crate) async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            match job {
                SceneJob::Switch {
                    scene,
                    transition_ms,
                    capture_current,
                } => {
                    self.switch(&scene, transition_ms, capture_current).await;
                }
                SceneJob::Revert => {
                    let SceneOriginals {
                        scene,
                        transition_ms,
                    } = self.originals.clone();
                    self.switch(&scene, transition_ms, false).await;
                }
            }
        }
        tracing::debug!("scene worker stopped");
    }

    async fn switch(
        &mut self,
        scene: &str,
        transition_ms: u64,
        capture_current: bool,
    ) {
        if capture_current {
            match request::<C, TransitionDuration>(
                &self.client,
                Request::GetTransitionDuration,
            )
            .await
            {
                Ok(current) => self.originals.transition_ms = current.duration_ms,
                Err(error) => tracing::warn!(
                    %error,
                    "could not read the current transition duration"
                ),
            }
        }

        tracing::debug!(transition_ms, "setting transition duration");
        if let Err(error) = request::<C, IgnoredAny>(
            &self.client,
            Request::SetTransitionDuration {
                duration: transition_ms,
            },
        )
        .await
        {
            tracing::warn!(%error, transition_ms, "could not set transition duration");
        }

        if capture_current {
            match request::<C, CurrentScene>(
                &self.client,
                Request::GetCurrentScene,
            )
            .await
            {
                Ok(current) => self.originals.scene = current.name,
                Err(error) => {
                    tracing::warn!(%error, "could not read the current scene")
                }
            }
            tracing::debug!(
                scene = %self.originals.scene,
                transition_ms = self.originals.transition_ms,
                "captured original scene"
            );
            let _ = self
                .events
                .send(SessionEvent::OriginalsCaptured(self.originals.clone()));
        }

        match request::<C, IgnoredAny>(
            &self.client,
            Request::SetCurrentScene {
                scene_name: scene.to_string(),
            },
        )
        .await
        {
            Ok(_) => tracing::info!(scene, "switched scene"),
            Err(error) => tracing::warn!(%error, scene, "could not switch scene"),
        }
    }
}

/// Sends `request` and decodes the reply as `T`.
pub(crate) async fn request<C: RemoteClient, T: DeserializeOwned>(
    client: &C,
    request: Request,
) -> Result<T, SessionError> {
    let reply = client.send(request.clone()).await?;
    Ok(decode_response(&request, reply)?)
}
