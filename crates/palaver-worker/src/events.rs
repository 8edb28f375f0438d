use palaver_core::ChatMessage;

/// Pushed to the front-end over the worker's event channel. Request/response
/// outcomes travel on the calling path; these are the asynchronous updates.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    SignedIn { user_id: String },
    SignedOut,
    DirectoryLoaded { count: usize },
    ProfileSaved { user_id: String },
    RoomUpdated { room_id: String, messages: Vec<ChatMessage> },
    PeerTyping { room_id: String, typing: bool },
    MessageDeleted { room_id: String, removed: usize },
    Error { context: String, message: String },
}
