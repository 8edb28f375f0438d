//! In-process implementations of the remote services: the test fixture and
//! the no-network demo mode. Semantics match the hosted services — merge
//! writes, full-snapshot pushes, last-writer-wins typing flags.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use palaver_core::{ChatMessage, UserProfile};

use crate::directory::{DirectoryStore, merge_document};
use crate::error::{BackendError, Result};
use crate::identity::{AuthSession, IdentityService};
use crate::media::{MediaStore, StoredObject};
use crate::realtime::RealtimeStore;

/// Accepts any well-formed credentials, remembers them for the process
/// lifetime, and derives a stable user id from the email so repeated
/// logins land on the same profile document.
#[derive(Default)]
pub struct LocalIdentity {
    accounts: Mutex<HashMap<String, String>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_for(email: &str) -> AuthSession {
        AuthSession {
            user_id: user_id_for(email),
            email: email.to_string(),
            id_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
        }
    }
}

fn user_id_for(email: &str) -> String {
    email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[async_trait]
impl IdentityService for LocalIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let accounts = self.accounts.lock().await;
        match accounts.get(email) {
            Some(stored) if stored == password => Ok(Self::session_for(email)),
            _ => Err(BackendError::Service {
                message: "INVALID_LOGIN_CREDENTIALS".to_string(),
            }),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(BackendError::Service {
                message: "EMAIL_EXISTS".to_string(),
            });
        }
        accounts.insert(email.to_string(), password.to_string());
        Ok(Self::session_for(email))
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    documents: Mutex<BTreeMap<String, Value>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let documents = self.documents.lock().await;
        match documents.get(user_id) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn put_user_merged(&self, user_id: &str, patch: Value) -> Result<()> {
        let mut documents = self.documents.lock().await;
        let doc = documents.entry(user_id.to_string()).or_insert(Value::Null);
        merge_document(doc, patch);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let documents = self.documents.lock().await;
        let mut users = Vec::with_capacity(documents.len());
        for (key, doc) in documents.iter() {
            let mut profile: UserProfile = serde_json::from_value(doc.clone())?;
            if profile.user_id.is_empty() {
                profile.user_id = key.clone();
            }
            users.push(profile);
        }
        Ok(users)
    }
}

#[derive(Default)]
pub struct MemoryMedia {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().await;
        objects.get(&format!("{bucket}/{path}")).cloned()
    }
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject> {
        let mut objects = self.objects.lock().await;
        objects.insert(format!("{bucket}/{filename}"), bytes);
        Ok(StoredObject {
            path: filename.to_string(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}

struct TypingWatcher {
    user_id: String,
    tx: mpsc::Sender<bool>,
}

#[derive(Default)]
struct RoomState {
    messages: Vec<ChatMessage>,
    typing: HashMap<String, bool>,
    snapshot_watchers: Vec<mpsc::Sender<Vec<ChatMessage>>>,
    typing_watchers: Vec<TypingWatcher>,
}

impl RoomState {
    async fn broadcast_messages(&mut self) {
        let snapshot = self.messages.clone();
        let mut kept = Vec::with_capacity(self.snapshot_watchers.len());
        for tx in self.snapshot_watchers.drain(..) {
            if tx.send(snapshot.clone()).await.is_ok() {
                kept.push(tx);
            }
        }
        self.snapshot_watchers = kept;
    }

    async fn broadcast_typing(&mut self, user_id: &str) {
        let value = self.typing.get(user_id).copied().unwrap_or(false);
        let mut kept = Vec::with_capacity(self.typing_watchers.len());
        for watcher in self.typing_watchers.drain(..) {
            if watcher.user_id != user_id {
                kept.push(watcher);
            } else if watcher.tx.send(value).await.is_ok() {
                kept.push(watcher);
            }
        }
        self.typing_watchers = kept;
    }
}

#[derive(Default)]
pub struct MemoryRealtime {
    rooms: Mutex<HashMap<String, RoomState>>,
}

impl MemoryRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the current flag value without a subscription.
    pub async fn typing(&self, room_id: &str, user_id: &str) -> bool {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .and_then(|room| room.typing.get(user_id).copied())
            .unwrap_or(false)
    }
}

#[async_trait]
impl RealtimeStore for MemoryRealtime {
    async fn subscribe(&self, room_id: &str) -> Result<mpsc::Receiver<Vec<ChatMessage>>> {
        let (tx, rx) = mpsc::channel(64);
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        tx.send(room.messages.clone())
            .await
            .map_err(|_| BackendError::ChannelClosed)?;
        room.snapshot_watchers.push(tx);
        Ok(rx)
    }

    async fn append(&self, room_id: &str, message: ChatMessage) -> Result<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        room.messages.push(message);
        room.broadcast_messages().await;
        Ok(())
    }

    async fn delete_matching(&self, room_id: &str, timestamp: i64) -> Result<usize> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        let before = room.messages.len();
        room.messages.retain(|m| m.timestamp != timestamp);
        let removed = before - room.messages.len();
        if removed > 0 {
            room.broadcast_messages().await;
        }
        Ok(removed)
    }

    async fn set_typing(&self, room_id: &str, user_id: &str, typing: bool) -> Result<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        room.typing.insert(user_id.to_string(), typing);
        room.broadcast_typing(user_id).await;
        Ok(())
    }

    async fn typing_updates(&self, room_id: &str, user_id: &str) -> Result<mpsc::Receiver<bool>> {
        let (tx, rx) = mpsc::channel(64);
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        let current = room.typing.get(user_id).copied().unwrap_or(false);
        tx.send(current)
            .await
            .map_err(|_| BackendError::ChannelClosed)?;
        room.typing_watchers.push(TypingWatcher {
            user_id: user_id.to_string(),
            tx,
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_room_yields_empty_snapshot() {
        let realtime = MemoryRealtime::new();
        let mut rx = realtime.subscribe("u1_u2").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Vec::new());
        assert!(!realtime.typing("u1_u2", "u2").await);
    }

    #[tokio::test]
    async fn test_append_pushes_new_snapshot() {
        let realtime = MemoryRealtime::new();
        let mut rx = realtime.subscribe("r").await.unwrap();
        rx.recv().await.unwrap();

        realtime
            .append("r", ChatMessage::text("a", "b", "hi", 10))
            .await
            .unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_matching_removes_equal_timestamps() {
        let realtime = MemoryRealtime::new();
        realtime
            .append("r", ChatMessage::text("a", "b", "one", 7))
            .await
            .unwrap();
        realtime
            .append("r", ChatMessage::text("b", "a", "two", 7))
            .await
            .unwrap();
        realtime
            .append("r", ChatMessage::text("a", "b", "three", 8))
            .await
            .unwrap();

        let removed = realtime.delete_matching("r", 7).await.unwrap();
        assert_eq!(removed, 2);

        let mut rx = realtime.subscribe("r").await.unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].timestamp, 8);
    }

    #[tokio::test]
    async fn test_typing_updates_deliver_current_then_changes() {
        let realtime = MemoryRealtime::new();
        let mut rx = realtime.typing_updates("r", "u1").await.unwrap();
        assert!(!rx.recv().await.unwrap());

        realtime.set_typing("r", "u1", true).await.unwrap();
        assert!(rx.recv().await.unwrap());

        // Another user's flag does not reach this watcher.
        realtime.set_typing("r", "u2", true).await.unwrap();
        realtime.set_typing("r", "u1", false).await.unwrap();
        assert!(!rx.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_identity_round_trip() {
        let identity = LocalIdentity::new();
        let created = identity.sign_up("amine@example.com", "pw").await.unwrap();
        let again = identity.sign_in("amine@example.com", "pw").await.unwrap();
        assert_eq!(created.user_id, again.user_id);
        assert_eq!(created.user_id, "amine-example-com");
    }

    #[tokio::test]
    async fn test_local_identity_rejections() {
        let identity = LocalIdentity::new();
        identity.sign_up("a@b.c", "pw").await.unwrap();

        let dup = identity.sign_up("a@b.c", "other").await.unwrap_err();
        assert_eq!(dup.to_string(), "EMAIL_EXISTS");

        let bad = identity.sign_in("a@b.c", "wrong").await.unwrap_err();
        assert_eq!(bad.to_string(), "INVALID_LOGIN_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_directory_merge_preserves_other_fields() {
        let directory = MemoryDirectory::new();
        directory
            .put_user_merged(
                "u1",
                serde_json::json!({
                    "userId": "u1",
                    "fullName": "Amine",
                    "bio": "hello",
                    "connected": true,
                }),
            )
            .await
            .unwrap();

        directory
            .put_user_merged("u1", serde_json::json!({"connected": false}))
            .await
            .unwrap();

        let profile = directory.get_user("u1").await.unwrap().unwrap();
        assert!(!profile.connected);
        assert_eq!(profile.full_name, "Amine");
        assert_eq!(profile.bio.as_deref(), Some("hello"));
    }
}
