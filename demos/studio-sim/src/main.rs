//! Drives SceneGuard against an in-process studio and prints what the
//! status indicator would show at each step.
//!
//! ```text
//! RUST_LOG=debug cargo run -p studio-sim -- [settings.toml]
//! ```

use std::sync::Arc;
use std::time::Duration;

use sceneguard::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings {
            scene: "Hidden".to_string(),
            file_names: vec!["*.secret.env".to_string(), ".env".to_string()],
            ..Settings::default()
        },
    };

    let studio = Arc::new(
        SimulatedStudio::new("Live", 300).with_scene(settings.scene.clone()),
    );
    let mut guard = SceneGuardBuilder::new()
        .settings(settings)
        .observers(
            Observers::new()
                .on_connected(|| tracing::info!("status: connected"))
                .on_disconnected(|| tracing::info!("status: disconnected"))
                .on_exhausted_retries(|| tracing::warn!("status: gave up")),
        )
        .build(Arc::clone(&studio), MemoryCredentialStore::new(), GlobMatcher);

    guard.activate().await?;
    pause().await;
    report(&guard, &studio);

    for file in [
        "src/main.rs",
        "deploy/prod.secret.env",
        "deploy/staging.secret.env",
        "README.md",
        ".env",
        "src/lib.rs",
    ] {
        println!("open {file}");
        guard.active_editor_changed(file).await?;
        pause().await;
        report(&guard, &studio);
    }

    println!("studio crashes");
    studio.set_online(false);
    pause().await;
    report(&guard, &studio);

    println!("studio comes back");
    studio.set_online(true);
    tokio::time::sleep(Duration::from_secs(6)).await;
    report(&guard, &studio);

    guard.shutdown().await?;
    Ok(())
}

async fn pause() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn report<C, S, M>(guard: &SceneGuard<C, S, M>, studio: &SimulatedStudio)
where
    C: RemoteClient,
    S: CredentialStore,
    M: FileMatcher + Clone,
{
    let status = guard.status();
    println!(
        "  [{}] {} | program: {} ({} ms)",
        status.label(),
        status.tooltip(),
        studio.program_scene(),
        studio.transition_ms(),
    );
}
