use serde::{Deserialize, Serialize};

/// The locally persisted session: who is signed in on this device. One
/// row at most; cleared at logout.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
