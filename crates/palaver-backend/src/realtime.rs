use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use palaver_core::ChatMessage;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::sse::{SseEvent, SseParser};

/// The realtime log: one append-only message list per room plus a sibling
/// `typing` subtree of per-user flags. Subscriptions deliver full
/// snapshots, never deltas, and the current state arrives immediately on
/// subscribe — an empty room yields an empty list.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Dropping the receiver releases the subscription.
    async fn subscribe(&self, room_id: &str) -> Result<mpsc::Receiver<Vec<ChatMessage>>>;

    async fn append(&self, room_id: &str, message: ChatMessage) -> Result<()>;

    /// Remove every entry in the room whose timestamp equals the argument
    /// and report how many were removed. Timestamp equality is the
    /// documented contract: duplicates go together.
    async fn delete_matching(&self, room_id: &str, timestamp: i64) -> Result<usize>;

    async fn set_typing(&self, room_id: &str, user_id: &str, typing: bool) -> Result<()>;

    /// Last-writer-wins flag stream for one user in one room; the current
    /// value arrives immediately.
    async fn typing_updates(&self, room_id: &str, user_id: &str) -> Result<mpsc::Receiver<bool>>;
}

pub struct HttpRealtime {
    http: reqwest::Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct StreamUpdate {
    path: String,
    data: Value,
}

impl HttpRealtime {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn room_url(&self, room_id: &str) -> String {
        format!(
            "{}/chats/{}.json?auth={}",
            self.config.realtime_url, room_id, self.config.api_key
        )
    }

    fn entry_url(&self, room_id: &str, key: &str) -> String {
        format!(
            "{}/chats/{}/{}.json?auth={}",
            self.config.realtime_url, room_id, key, self.config.api_key
        )
    }

    fn typing_url(&self, room_id: &str, user_id: &str) -> String {
        format!(
            "{}/chats/{}/typing/{}.json?auth={}",
            self.config.realtime_url, room_id, user_id, self.config.api_key
        )
    }
}

#[async_trait]
impl RealtimeStore for HttpRealtime {
    async fn subscribe(&self, room_id: &str) -> Result<mpsc::Receiver<Vec<ChatMessage>>> {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(64);
        let mut event_rx = spawn_sse_reader(self.http.clone(), self.room_url(room_id));
        let room = room_id.to_string();

        tokio::spawn(async move {
            // The server mirror: every push event is folded in here, then
            // the whole thing is re-emitted as a snapshot.
            let mut tree = Value::Null;
            while let Some(event) = event_rx.recv().await {
                match event.event.as_str() {
                    "put" | "patch" => {
                        let Ok(update) = serde_json::from_str::<StreamUpdate>(&event.data) else {
                            continue;
                        };
                        apply_update(&mut tree, &update.path, update.data, event.event == "patch");
                        if snapshot_tx.send(messages_from_tree(&tree)).await.is_err() {
                            break;
                        }
                    }
                    "keep-alive" => {}
                    "cancel" | "auth_revoked" => {
                        tracing::warn!(room = %room, event = %event.event, "subscription revoked");
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(snapshot_rx)
    }

    async fn append(&self, room_id: &str, message: ChatMessage) -> Result<()> {
        let response = self
            .http
            .post(self.room_url(room_id))
            .json(&message)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn delete_matching(&self, room_id: &str, timestamp: i64) -> Result<usize> {
        let response = self.http.get(self.room_url(room_id)).send().await?;
        let body = expect_success(response).await?;
        let tree: Value = serde_json::from_str(&body)?;

        let Some(entries) = tree.as_object() else {
            return Ok(0);
        };

        let doomed: Vec<&String> = entries
            .iter()
            .filter(|(key, entry)| {
                *key != "typing" && entry.get("timestamp").and_then(Value::as_i64) == Some(timestamp)
            })
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in doomed {
            let response = self
                .http
                .delete(self.entry_url(room_id, key))
                .send()
                .await?;
            expect_success(response).await?;
            removed += 1;
        }
        Ok(removed)
    }

    async fn set_typing(&self, room_id: &str, user_id: &str, typing: bool) -> Result<()> {
        let response = self
            .http
            .put(self.typing_url(room_id, user_id))
            .json(&typing)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn typing_updates(&self, room_id: &str, user_id: &str) -> Result<mpsc::Receiver<bool>> {
        let (flag_tx, flag_rx) = mpsc::channel(64);
        let mut event_rx = spawn_sse_reader(self.http.clone(), self.typing_url(room_id, user_id));

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if event.event != "put" {
                    continue;
                }
                let Ok(update) = serde_json::from_str::<StreamUpdate>(&event.data) else {
                    continue;
                };
                let typing = update.data.as_bool().unwrap_or(false);
                if flag_tx.send(typing).await.is_err() {
                    break;
                }
            }
        });

        Ok(flag_rx)
    }
}

fn spawn_sse_reader(http: reqwest::Client, url: String) -> mpsc::Receiver<SseEvent> {
    let (event_tx, event_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        if let Err(e) = read_sse(&http, &url, event_tx).await {
            tracing::warn!(error = %e, "event stream ended");
        }
    });
    event_rx
}

async fn read_sse(
    http: &reqwest::Client,
    url: &str,
    event_tx: mpsc::Sender<SseEvent>,
) -> Result<()> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for event in parser.push(&String::from_utf8_lossy(&chunk)) {
            if event_tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Fold one stream update into the local mirror. Paths are `/`-separated
/// from the subscription root; a null put removes the node.
fn apply_update(tree: &mut Value, path: &str, data: Value, is_patch: bool) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Walk down to the leaf's parent, materializing objects on the way.
    let mut node: &mut Value = tree;
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if !node.is_object() {
            *node = Value::Object(serde_json::Map::new());
        }
        node = node
            .as_object_mut()
            .expect("just ensured object")
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    match segments.last() {
        None => {
            if is_patch {
                crate::directory::merge_document(node, data);
            } else {
                *node = data;
            }
        }
        Some(leaf) => {
            if !node.is_object() {
                *node = Value::Object(serde_json::Map::new());
            }
            let map = node.as_object_mut().expect("just ensured object");
            if is_patch {
                let entry = map.entry((*leaf).to_string()).or_insert(Value::Null);
                crate::directory::merge_document(entry, data);
            } else if data.is_null() {
                map.remove(*leaf);
            } else {
                map.insert((*leaf).to_string(), data);
            }
        }
    }
}

/// A room's renderable entries: every child that parses as a message.
/// The `typing` subtree and the log's own bookkeeping are not messages.
fn messages_from_tree(tree: &Value) -> Vec<ChatMessage> {
    let Some(entries) = tree.as_object() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|(key, _)| *key != "typing")
        .filter_map(|(_, entry)| serde_json::from_value(entry.clone()).ok())
        .collect()
}

async fn expect_success(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
