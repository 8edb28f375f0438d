use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use palaver_backend::{MediaStore, RealtimeStore};
use palaver_core::{ChatMessage, now_millis, room_key, sort_newest_first};

use crate::error::Result;
use crate::events::WorkerEvent;
use crate::location::LocationProvider;

const CHAT_IMAGE_BUCKET: &str = "chat_images";

/// A live view of one conversation. Holds the room's current snapshot
/// (newest first) and the peer's typing flag, and owns the two pump tasks
/// feeding them. One instance per open conversation; `unsubscribe` (or
/// drop) releases the subscriptions so listeners don't pile up per room
/// visited.
pub struct MessageFeed {
    room_id: String,
    self_id: String,
    peer_id: String,
    realtime: Arc<dyn RealtimeStore>,
    media: Arc<dyn MediaStore>,
    event_tx: mpsc::Sender<WorkerEvent>,
    messages: Arc<RwLock<Vec<ChatMessage>>>,
    peer_typing: Arc<AtomicBool>,
    pumps: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MessageFeed {
    pub fn new(
        self_id: &str,
        peer_id: &str,
        realtime: Arc<dyn RealtimeStore>,
        media: Arc<dyn MediaStore>,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            room_id: room_key(self_id, peer_id),
            self_id: self_id.to_string(),
            peer_id: peer_id.to_string(),
            realtime,
            media,
            event_tx,
            messages: Arc::new(RwLock::new(Vec::new())),
            peer_typing: Arc::new(AtomicBool::new(false)),
            pumps: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Open the room-snapshot subscription and the peer's typing-flag
    /// subscription. Every update replaces the whole in-memory list with
    /// the server snapshot, re-sorted newest first. Full replace, no
    /// pagination.
    pub async fn subscribe(&self) -> Result<()> {
        let mut snapshot_rx = self.realtime.subscribe(&self.room_id).await?;
        let messages = self.messages.clone();
        let event_tx = self.event_tx.clone();
        let room = self.room_id.clone();
        let snapshot_pump = tokio::spawn(async move {
            while let Some(mut snapshot) = snapshot_rx.recv().await {
                sort_newest_first(&mut snapshot);
                *messages.write().await = snapshot.clone();
                let _ = event_tx
                    .send(WorkerEvent::RoomUpdated {
                        room_id: room.clone(),
                        messages: snapshot,
                    })
                    .await;
            }
            // Reached only when the server side closed the stream; an
            // abort through unsubscribe never gets here.
            let _ = event_tx
                .send(WorkerEvent::Error {
                    context: "realtime".to_string(),
                    message: format!("subscription to {room} ended"),
                })
                .await;
        });

        let mut typing_rx = self
            .realtime
            .typing_updates(&self.room_id, &self.peer_id)
            .await?;
        let peer_typing = self.peer_typing.clone();
        let event_tx = self.event_tx.clone();
        let room = self.room_id.clone();
        let typing_pump = tokio::spawn(async move {
            while let Some(typing) = typing_rx.recv().await {
                peer_typing.store(typing, Ordering::Relaxed);
                let _ = event_tx
                    .send(WorkerEvent::PeerTyping {
                        room_id: room.clone(),
                        typing,
                    })
                    .await;
            }
        });

        let mut pumps = self.pumps.lock().expect("pump registry poisoned");
        pumps.push(snapshot_pump);
        pumps.push(typing_pump);
        Ok(())
    }

    /// Release both subscriptions. Aborting the pumps drops the receivers,
    /// which closes the server-side streams.
    pub fn unsubscribe(&self) {
        let mut pumps = self.pumps.lock().expect("pump registry poisoned");
        for handle in pumps.drain(..) {
            handle.abort();
        }
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    /// The render list under an optional text filter: text messages must
    /// contain the query (case-sensitive substring); image and location
    /// messages always pass.
    pub async fn visible_messages(&self, query: Option<&str>) -> Vec<ChatMessage> {
        let messages = self.messages.read().await;
        match query {
            Some(q) => messages.iter().filter(|m| m.matches_filter(q)).cloned().collect(),
            None => messages.clone(),
        }
    }

    pub fn peer_typing(&self) -> bool {
        self.peer_typing.load(Ordering::Relaxed)
    }

    /// Append a text entry, then clear our own typing flag for the room.
    pub async fn send_text(&self, body: &str) -> Result<()> {
        let message = ChatMessage::text(&self.self_id, &self.peer_id, body, now_millis());
        self.realtime.append(&self.room_id, message).await?;
        self.realtime
            .set_typing(&self.room_id, &self.self_id, false)
            .await?;
        Ok(())
    }

    /// Upload the image bytes to the object store, then append an entry
    /// carrying the public URL.
    pub async fn send_image(&self, bytes: Vec<u8>) -> Result<()> {
        let timestamp = now_millis();
        let filename = format!("{}-{}.jpg", self.self_id, timestamp);
        let stored = self
            .media
            .upload(CHAT_IMAGE_BUCKET, &filename, bytes, "image/jpeg")
            .await?;
        let url = self.media.public_url(CHAT_IMAGE_BUCKET, &stored.path);
        let message = ChatMessage::image(&self.self_id, &self.peer_id, &url, timestamp);
        self.realtime.append(&self.room_id, message).await?;
        Ok(())
    }

    /// Ask the location provider for a position fix; denial aborts
    /// silently, nothing is appended.
    pub async fn send_location(&self, provider: &dyn LocationProvider) -> Result<()> {
        let Some(coords) = provider.current_position().await else {
            tracing::debug!(room = %self.room_id, "location unavailable, nothing sent");
            return Ok(());
        };
        let message =
            ChatMessage::location(&self.self_id, &self.peer_id, coords, now_millis());
        self.realtime.append(&self.room_id, message).await?;
        Ok(())
    }

    /// Mirror the compose box into our typing flag: non-empty input means
    /// typing, cleared input means not.
    pub async fn input_changed(&self, text: &str) -> Result<()> {
        self.set_typing(!text.trim().is_empty()).await
    }

    /// Focus left the input; the flag drops regardless of content.
    pub async fn input_blurred(&self) -> Result<()> {
        self.set_typing(false).await
    }

    async fn set_typing(&self, typing: bool) -> Result<()> {
        self.realtime
            .set_typing(&self.room_id, &self.self_id, typing)
            .await?;
        Ok(())
    }

    /// Remove every entry in the room with this timestamp. Equality match,
    /// not a key match: two messages sharing a timestamp both go.
    pub async fn delete_matching(&self, timestamp: i64) -> Result<usize> {
        let removed = self.realtime.delete_matching(&self.room_id, timestamp).await?;
        let _ = self
            .event_tx
            .send(WorkerEvent::MessageDeleted {
                room_id: self.room_id.clone(),
                removed,
            })
            .await;
        Ok(removed)
    }

}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_backend::{MemoryMedia, MemoryRealtime};
    use palaver_core::{Coordinates, MessagePayload};

    struct GrantedLocation(Coordinates);

    #[async_trait]
    impl LocationProvider for GrantedLocation {
        async fn current_position(&self) -> Option<Coordinates> {
            Some(self.0)
        }
    }

    struct DeniedLocation;

    #[async_trait]
    impl LocationProvider for DeniedLocation {
        async fn current_position(&self) -> Option<Coordinates> {
            None
        }
    }

    struct Fixture {
        realtime: Arc<MemoryRealtime>,
        feed: MessageFeed,
        event_rx: mpsc::Receiver<WorkerEvent>,
    }

    fn fixture(self_id: &str, peer_id: &str) -> Fixture {
        let realtime = Arc::new(MemoryRealtime::new());
        let media = Arc::new(MemoryMedia::new());
        let (event_tx, event_rx) = mpsc::channel(64);
        let feed = MessageFeed::new(self_id, peer_id, realtime.clone(), media, event_tx);
        Fixture {
            realtime,
            feed,
            event_rx,
        }
    }

    async fn next_room_update(rx: &mut mpsc::Receiver<WorkerEvent>) -> Vec<ChatMessage> {
        loop {
            match rx.recv().await.expect("event channel closed") {
                WorkerEvent::RoomUpdated { messages, .. } => return messages,
                _ => continue,
            }
        }
    }

    #[test]
    fn test_feed_derives_room_key_from_either_side() {
        let a = fixture("u1", "u2");
        let b = fixture("u2", "u1");
        assert_eq!(a.feed.room_id(), "u1_u2");
        assert_eq!(a.feed.room_id(), b.feed.room_id());
    }

    #[tokio::test]
    async fn test_subscribe_empty_room() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();

        let snapshot = next_room_update(&mut fx.event_rx).await;
        assert!(snapshot.is_empty());
        assert!(!fx.feed.peer_typing());
    }

    #[tokio::test]
    async fn test_send_text_appends_one_entry_and_clears_typing() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();
        next_room_update(&mut fx.event_rx).await;

        fx.feed.input_changed("hel").await.unwrap();
        assert!(fx.realtime.typing("u1_u2", "u1").await);

        fx.feed.send_text("hello").await.unwrap();

        let snapshot = next_room_update(&mut fx.event_rx).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload.kind(), "text");
        assert_eq!(snapshot[0].sender_id, "u1");
        assert_eq!(snapshot[0].receiver_id, "u2");
        assert!(!fx.realtime.typing("u1_u2", "u1").await);
    }

    #[tokio::test]
    async fn test_snapshots_arrive_sorted_newest_first() {
        let mut fx = fixture("u1", "u2");

        for (body, ts) in [("first", 100), ("third", 300), ("second", 200)] {
            fx.realtime
                .append("u1_u2", ChatMessage::text("u1", "u2", body, ts))
                .await
                .unwrap();
        }

        fx.feed.subscribe().await.unwrap();
        let snapshot = next_room_update(&mut fx.event_rx).await;
        let stamps: Vec<i64> = snapshot.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
        assert_eq!(fx.feed.messages().await.len(), 3);
    }

    #[tokio::test]
    async fn test_typing_flag_tracks_input() {
        let fx = fixture("u1", "u2");

        fx.feed.input_changed("hi").await.unwrap();
        assert!(fx.realtime.typing("u1_u2", "u1").await);

        fx.feed.input_changed("").await.unwrap();
        assert!(!fx.realtime.typing("u1_u2", "u1").await);

        fx.feed.input_changed("   ").await.unwrap();
        assert!(!fx.realtime.typing("u1_u2", "u1").await);

        fx.feed.input_changed("back").await.unwrap();
        fx.feed.input_blurred().await.unwrap();
        assert!(!fx.realtime.typing("u1_u2", "u1").await);
    }

    #[tokio::test]
    async fn test_peer_typing_reaches_the_feed() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();

        fx.realtime.set_typing("u1_u2", "u2", true).await.unwrap();

        loop {
            match fx.event_rx.recv().await.unwrap() {
                WorkerEvent::PeerTyping { typing: true, .. } => break,
                _ => continue,
            }
        }
        assert!(fx.feed.peer_typing());
    }

    #[tokio::test]
    async fn test_delete_removes_every_entry_with_equal_timestamp() {
        let fx = fixture("u1", "u2");

        fx.realtime
            .append("u1_u2", ChatMessage::text("u1", "u2", "one", 7))
            .await
            .unwrap();
        fx.realtime
            .append("u1_u2", ChatMessage::text("u2", "u1", "two", 7))
            .await
            .unwrap();
        fx.realtime
            .append("u1_u2", ChatMessage::text("u1", "u2", "keep", 9))
            .await
            .unwrap();

        // Both entries at timestamp 7 go, the near-simultaneous pair
        // included.
        let removed = fx.feed.delete_matching(7).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_send_image_uploads_then_appends_url() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();
        next_room_update(&mut fx.event_rx).await;

        fx.feed.send_image(vec![0xff, 0xd8, 0xff]).await.unwrap();

        let snapshot = next_room_update(&mut fx.event_rx).await;
        assert_eq!(snapshot.len(), 1);
        match &snapshot[0].payload {
            MessagePayload::Image { image } => {
                assert!(image.starts_with("memory://chat_images/u1-"));
            }
            other => panic!("expected image payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_location_grant_and_denial() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();
        next_room_update(&mut fx.event_rx).await;

        fx.feed.send_location(&DeniedLocation).await.unwrap();
        assert!(fx.feed.messages().await.is_empty());

        let coords = Coordinates {
            latitude: 36.8065,
            longitude: 10.1815,
        };
        fx.feed
            .send_location(&GrantedLocation(coords))
            .await
            .unwrap();

        let snapshot = next_room_update(&mut fx.event_rx).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[0].payload,
            MessagePayload::Location { location: coords }
        );
    }

    #[tokio::test]
    async fn test_filter_hides_only_non_matching_text() {
        let fx = fixture("u1", "u2");
        fx.realtime
            .append("u1_u2", ChatMessage::text("u1", "u2", "hello world", 1))
            .await
            .unwrap();
        fx.realtime
            .append("u1_u2", ChatMessage::text("u2", "u1", "bye", 2))
            .await
            .unwrap();
        fx.realtime
            .append("u1_u2", ChatMessage::image("u1", "u2", "url", 3))
            .await
            .unwrap();

        let mut fx = fx;
        fx.feed.subscribe().await.unwrap();
        next_room_update(&mut fx.event_rx).await;

        let visible = fx.feed.visible_messages(Some("hello")).await;
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().any(|m| m.payload.kind() == "image"));

        let unfiltered = fx.feed.visible_messages(None).await;
        assert_eq!(unfiltered.len(), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_updates() {
        let mut fx = fixture("u1", "u2");
        fx.feed.subscribe().await.unwrap();
        next_room_update(&mut fx.event_rx).await;

        fx.feed.unsubscribe();
        tokio::task::yield_now().await;

        fx.realtime
            .append("u1_u2", ChatMessage::text("u2", "u1", "late", 5))
            .await
            .unwrap();

        // The pump is gone; no further room updates are delivered.
        tokio::select! {
            event = fx.event_rx.recv() => {
                assert!(
                    !matches!(event, Some(WorkerEvent::RoomUpdated { .. })),
                    "update arrived after unsubscribe"
                );
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
        }
    }
}
