use std::sync::Arc;

use serde_json::json;
use tokio::sync::{RwLock, mpsc};

use palaver_backend::{AuthSession, DirectoryStore, IdentityService, MediaStore, Services};
use palaver_core::{UserProfile, now_millis};
use palaver_db::{PalaverDb, Session};

use crate::error::{Result, WorkerError};
use crate::events::WorkerEvent;
use crate::feed::MessageFeed;

const PROFILE_IMAGE_BUCKET: &str = "profile_images";

/// Fields collected by the edit-profile screen. `profile_picture` carries
/// the current URL; a new avatar, when present, is uploaded first and
/// replaces it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub bio: String,
    pub phone_number: String,
    pub profile_picture: String,
    pub avatar: Option<Vec<u8>>,
}

/// The sync engine. Owns the persisted session for the process lifetime
/// (loaded once at startup, cleared exactly once at logout) and hands out
/// message feeds per conversation. Asynchronous updates reach the
/// front-end through the event channel.
pub struct PalaverWorker {
    db: Arc<PalaverDb>,
    services: Services,
    session: RwLock<Option<Session>>,
    event_tx: mpsc::Sender<WorkerEvent>,
    event_rx: Option<mpsc::Receiver<WorkerEvent>>,
}

impl PalaverWorker {
    pub async fn new(services: Services) -> Result<Self> {
        let db = PalaverDb::new().await?;
        Ok(Self::with_db(services, db))
    }

    pub fn with_db(services: Services, db: PalaverDb) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);
        Self {
            db: Arc::new(db),
            services,
            session: RwLock::new(None),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<WorkerEvent>> {
        self.event_rx.take()
    }

    /// Load whatever session survived the last run. The caller picks the
    /// initial screen from the answer.
    pub async fn restore_session(&self) -> Result<Option<Session>> {
        let session = self.db.load_session().await?;
        *self.session.write().await = session.clone();
        if let Some(ref s) = session {
            tracing::info!(user = %s.user_id, "restored session");
        }
        Ok(session)
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let auth = self.services.identity.sign_in(email, password).await?;
        self.store_session(auth).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let auth = self.services.identity.sign_up(email, password).await?;
        self.store_session(auth).await
    }

    async fn store_session(&self, auth: AuthSession) -> Result<Session> {
        self.db
            .save_session(
                &auth.user_id,
                &auth.email,
                Some(&auth.id_token),
                Some(&auth.refresh_token),
            )
            .await?;
        let session = self
            .db
            .load_session()
            .await?
            .ok_or(WorkerError::NotSignedIn)?;

        *self.session.write().await = Some(session.clone());
        tracing::info!(user = %session.user_id, "✅ signed in");
        let _ = self
            .event_tx
            .send(WorkerEvent::SignedIn {
                user_id: session.user_id.clone(),
            })
            .await;
        Ok(session)
    }

    /// Flag the profile offline, then drop the persisted session. The
    /// in-memory session only clears once both writes went through.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(());
        };

        self.services
            .directory
            .put_user_merged(&session.user_id, json!({ "connected": false }))
            .await?;
        self.db.clear_session().await?;
        *self.session.write().await = None;

        tracing::info!(user = %session.user_id, "signed out");
        let _ = self.event_tx.send(WorkerEvent::SignedOut).await;
        Ok(())
    }

    /// Everyone with a profile document, except ourselves.
    pub async fn load_directory(&self) -> Result<Vec<UserProfile>> {
        let user_id = self.require_user_id().await?;
        let mut users = self.services.directory.list_users().await?;
        users.retain(|u| u.user_id != user_id);

        tracing::info!(count = users.len(), "📇 directory loaded");
        let _ = self
            .event_tx
            .send(WorkerEvent::DirectoryLoaded { count: users.len() })
            .await;
        Ok(users)
    }

    pub async fn load_profile(&self) -> Result<Option<UserProfile>> {
        let user_id = self.require_user_id().await?;
        Ok(self.services.directory.get_user(&user_id).await?)
    }

    /// Upload the new avatar if any, then merge-write the document. The
    /// write marks the user connected, same as every successful save.
    pub async fn save_profile(&self, update: ProfileUpdate) -> Result<()> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(WorkerError::NotSignedIn)?;

        let mut picture = update.profile_picture;
        if let Some(bytes) = update.avatar {
            let filename = format!("{}-{}.jpg", session.user_id, now_millis());
            let stored = self
                .services
                .media
                .upload(PROFILE_IMAGE_BUCKET, &filename, bytes, "image/jpeg")
                .await?;
            picture = self.services.media.public_url(PROFILE_IMAGE_BUCKET, &stored.path);
        }

        let document = json!({
            "userId": session.user_id,
            "profilePicture": picture,
            "email": session.email,
            "fullName": update.full_name,
            "bio": update.bio,
            "phoneNumber": update.phone_number,
            "connected": true,
        });
        self.services
            .directory
            .put_user_merged(&session.user_id, document)
            .await?;

        let _ = self
            .event_tx
            .send(WorkerEvent::ProfileSaved {
                user_id: session.user_id.clone(),
            })
            .await;
        Ok(())
    }

    pub async fn open_feed(&self, peer_id: &str) -> Result<MessageFeed> {
        let user_id = self.require_user_id().await?;
        Ok(MessageFeed::new(
            &user_id,
            peer_id,
            self.services.realtime.clone(),
            self.services.media.clone(),
            self.event_tx.clone(),
        ))
    }

    async fn require_user_id(&self) -> Result<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.user_id.clone())
            .ok_or(WorkerError::NotSignedIn)
    }
}

/// Directory search: case-insensitive substring on the display name.
pub fn filter_by_name(users: &[UserProfile], query: &str) -> Vec<UserProfile> {
    let needle = query.to_lowercase();
    users
        .iter()
        .filter(|u| u.full_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
