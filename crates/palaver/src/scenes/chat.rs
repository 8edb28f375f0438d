use async_trait::async_trait;
use color_eyre::Result;
use owo_colors::OwoColorize;

use palaver_worker::{
    ChatMessage, Coordinates, LocationProvider, MessageFeed, MessagePayload, PalaverWorker,
    UserProfile,
};

use crate::input::read_line;
use crate::scenes::Scene;
use crate::toast;

/// One conversation. Subscribes on entry, releases the subscriptions on
/// the way out; everything in between is rendering and pass-through calls
/// on the feed.
pub async fn run(worker: &PalaverWorker, peer: UserProfile) -> Result<Scene> {
    let feed = match worker.open_feed(&peer.user_id).await {
        Ok(feed) => feed,
        Err(e) => {
            toast::danger(&e.to_string());
            return Ok(Scene::Home);
        }
    };
    if let Err(e) = feed.subscribe().await {
        toast::danger(&e.to_string());
        return Ok(Scene::Home);
    }

    let self_id = worker
        .session()
        .await
        .map(|s| s.user_id)
        .unwrap_or_default();

    println!();
    println!("{} {}", peer.full_name.bold(), peer.presence().dimmed());
    println!(
        "{}",
        "text sends · /image <path> · /location · /delete <n> · /search <q> · /call · /back"
            .dimmed()
    );

    let mut query: Option<String> = None;

    loop {
        render(&feed, query.as_deref(), &self_id, &peer).await;

        let line = read_line("> ")?;
        let line = line.trim_end();

        if line.trim().is_empty() {
            // Stepping away from the input drops our typing flag.
            if let Err(e) = feed.input_blurred().await {
                tracing::error!(error = %e, "failed to clear typing flag");
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("/search") {
            let q = rest.trim();
            query = if q.is_empty() { None } else { Some(q.to_string()) };
            continue;
        }

        match line.trim() {
            "/back" => {
                feed.unsubscribe();
                return Ok(Scene::Home);
            }
            "/call" => {
                println!("📞 {}", dial_link(&peer.phone_number));
                continue;
            }
            "/location" => {
                if let Err(e) = feed.send_location(&PromptLocation).await {
                    tracing::error!(error = %e, "failed to send location");
                }
                continue;
            }
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("/image") {
            send_image(&feed, rest.trim()).await;
            continue;
        }

        if let Some(rest) = line.strip_prefix("/delete") {
            delete_message(&feed, query.as_deref(), rest.trim()).await;
            continue;
        }

        // Anything else is a message. Line-oriented input means the
        // compose signal collapses into submit time: flag, send, and the
        // send clears the flag again.
        if let Err(e) = feed.input_changed(line).await {
            tracing::error!(error = %e, "failed to set typing flag");
        }
        if let Err(e) = feed.send_text(line).await {
            tracing::error!(error = %e, "failed to send message");
        }
    }
}

async fn render(feed: &MessageFeed, query: Option<&str>, self_id: &str, peer: &UserProfile) {
    let messages = feed.visible_messages(query).await;

    if let Some(q) = query {
        println!("{}", format!("filter: \"{q}\"").dimmed());
    }

    // Newest first, same order the snapshot keeps.
    for (i, message) in messages.iter().enumerate() {
        let who = if message.sender_id == self_id {
            "you".to_string()
        } else {
            peer.full_name.clone()
        };
        println!(
            "  [{}] {} {}  {}",
            i,
            clock(message.timestamp).dimmed(),
            who.bold(),
            body(message),
        );
    }

    if feed.peer_typing() {
        println!("{}", format!("{} is typing...", peer.full_name).dimmed());
    }
}

async fn send_image(feed: &MessageFeed, path: &str) {
    if path.is_empty() {
        toast::danger("Usage: /image <path>");
        return;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            // The picker was cancelled, effectively.
            toast::danger(&format!("Could not read {path}: {e}"));
            return;
        }
    };
    if let Err(e) = feed.send_image(bytes).await {
        tracing::error!(error = %e, "failed to send image");
    }
}

async fn delete_message(feed: &MessageFeed, query: Option<&str>, arg: &str) {
    let Ok(index) = arg.parse::<usize>() else {
        toast::danger("Usage: /delete <n>");
        return;
    };
    let messages = feed.visible_messages(query).await;
    let Some(target) = messages.get(index) else {
        toast::danger("No such message");
        return;
    };

    let answer = read_line("Delete message? (y/N): ").unwrap_or_default();
    if !answer.trim().eq_ignore_ascii_case("y") {
        return;
    }

    match feed.delete_matching(target.timestamp).await {
        Ok(removed) => toast::info(&format!("removed {removed} message(s)")),
        Err(e) => tracing::error!(error = %e, "failed to delete message"),
    }
}

/// The terminal's position fix: ask for a coordinate pair. A blank or
/// malformed answer counts as denied.
struct PromptLocation;

#[async_trait]
impl LocationProvider for PromptLocation {
    async fn current_position(&self) -> Option<Coordinates> {
        let line = read_line("Latitude longitude (blank to cancel): ").ok()?;
        parse_coordinates(&line)
    }
}

fn parse_coordinates(line: &str) -> Option<Coordinates> {
    let mut parts = line.split_whitespace();
    let latitude = parts.next()?.parse().ok()?;
    let longitude = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Coordinates {
        latitude,
        longitude,
    })
}

fn body(message: &ChatMessage) -> String {
    match &message.payload {
        MessagePayload::Text { text } => text.clone(),
        MessagePayload::Image { image } => format!("🖼️ {image}"),
        MessagePayload::Location { location } => format!("📍 {}", maps_link(location)),
    }
}

fn maps_link(coords: &Coordinates) -> String {
    format!(
        "https://www.google.com/maps?q={},{}",
        coords.latitude, coords.longitude
    )
}

fn dial_link(phone_number: &str) -> String {
    format!("tel:+216{phone_number}")
}

fn clock(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}
