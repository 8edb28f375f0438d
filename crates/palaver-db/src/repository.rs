use directories::ProjectDirs;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::PathBuf;

use crate::error::{DbError, Result};
use crate::models::Session;
use crate::schema::SCHEMA;

pub struct PalaverDb {
    pool: Pool<Sqlite>,
}

impl PalaverDb {
    pub async fn new() -> Result<Self> {
        let db_path = Self::db_path()?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        tracing::info!("session store at {}", db_path.display());

        Ok(Self { pool })
    }

    pub async fn new_with_path(path: &str) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePool::connect(&db_url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn db_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "palaver", "palaver").ok_or(DbError::DataDir)?;
        Ok(dirs.data_dir().join("palaver.db"))
    }

    pub async fn save_session(
        &self,
        user_id: &str,
        email: &str,
        id_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO session (slot, user_id, email, id_token, refresh_token)
               VALUES (0, ?, ?, ?, ?)
               ON CONFLICT(slot) DO UPDATE SET
                 user_id = excluded.user_id,
                 email = excluded.email,
                 id_token = excluded.id_token,
                 refresh_token = excluded.refresh_token,
                 updated_at = strftime('%s', 'now')"#,
        )
        .bind(user_id)
        .bind(email)
        .bind(id_token)
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_session(&self) -> Result<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT user_id, email, id_token, refresh_token, created_at, updated_at
             FROM session WHERE slot = 0",
        )
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn clear_session(&self) -> Result<()> {
        sqlx::query("DELETE FROM session").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db() -> PalaverDb {
        let path = std::env::temp_dir().join(format!(
            "palaver-test-{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        PalaverDb::new_with_path(path.to_str().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let db = temp_db().await;
        assert!(db.load_session().await.unwrap().is_none());

        db.save_session("u1", "a@b.c", Some("tok"), Some("ref"))
            .await
            .unwrap();
        let session = db.load_session().await.unwrap().unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email, "a@b.c");
        assert_eq!(session.id_token.as_deref(), Some("tok"));

        db.clear_session().await.unwrap();
        assert!(db.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saving_again_replaces_the_single_row() {
        let db = temp_db().await;
        db.save_session("u1", "a@b.c", None, None).await.unwrap();
        db.save_session("u2", "x@y.z", Some("t2"), None)
            .await
            .unwrap();

        let session = db.load_session().await.unwrap().unwrap();
        assert_eq!(session.user_id, "u2");
        assert_eq!(session.email, "x@y.z");
    }
}
