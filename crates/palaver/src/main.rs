mod banner;
mod input;
mod scenes;
mod toast;

use color_eyre::eyre::{Context, eyre};
use tracing::info;
use tracing_subscriber::EnvFilter;

use palaver_worker::{MessagePayload, PalaverWorker, Services, WorkerEvent};

use crate::banner::print_banner;
use crate::scenes::Scene;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .from_env_lossy()
                .add_directive("palaver=info".parse()?)
                .add_directive("palaver_worker=info".parse()?)
                .add_directive("palaver_backend=info".parse()?)
                .add_directive("palaver_db=info".parse()?),
        )
        .init();

    info!("Palaver start");

    let services = Services::from_env();
    let mut worker = PalaverWorker::new(services)
        .await
        .wrap_err("Failed to start the sync engine")?;

    let mut event_rx = worker
        .take_event_receiver()
        .ok_or_else(|| eyre!("event receiver already taken"))?;
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_event(event);
        }
    });

    // Whoever was signed in last time skips the login screen.
    let mut scene = match worker.restore_session().await {
        Ok(Some(_)) => Scene::Home,
        Ok(None) => Scene::Login,
        Err(e) => {
            tracing::warn!(error = %e, "could not restore session");
            Scene::Login
        }
    };

    loop {
        scene = match scene {
            Scene::Login => scenes::login::run(&worker).await?,
            Scene::Home => scenes::home::run(&worker).await?,
            Scene::Chat(peer) => scenes::chat::run(&worker, peer).await?,
            Scene::Profile => scenes::profile::run(&worker).await?,
            Scene::Quit => break,
        };
    }

    println!("👋 Bye");
    Ok(())
}

/// Asynchronous pushes from the sync engine print over whatever prompt is
/// showing; the active screen redraws on its next turn.
fn handle_event(event: WorkerEvent) {
    match event {
        WorkerEvent::RoomUpdated { room_id, messages } => {
            if let Some(newest) = messages.first() {
                tracing::debug!(room = %room_id, count = messages.len(), "room updated");
                println!("\n💬 {}", preview(newest));
            }
        }
        WorkerEvent::PeerTyping { typing: true, .. } => {
            println!("✏️  typing...");
        }
        WorkerEvent::PeerTyping { typing: false, .. } => {}
        WorkerEvent::MessageDeleted { removed, .. } => {
            tracing::debug!(removed, "messages deleted");
        }
        WorkerEvent::DirectoryLoaded { count } => {
            tracing::debug!(count, "directory loaded");
        }
        WorkerEvent::Error { context, message } => {
            println!("❌ {context}: {message}");
        }
        WorkerEvent::SignedIn { .. }
        | WorkerEvent::SignedOut
        | WorkerEvent::ProfileSaved { .. } => {}
    }
}

fn preview(message: &palaver_worker::ChatMessage) -> String {
    match &message.payload {
        MessagePayload::Text { text } => {
            if text.chars().count() > 30 {
                let short: String = text.chars().take(30).collect();
                format!("{short}...")
            } else {
                text.clone()
            }
        }
        MessagePayload::Image { .. } => "[image]".to_string(),
        MessagePayload::Location { .. } => "[location]".to_string(),
    }
}
