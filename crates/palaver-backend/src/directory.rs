use async_trait::async_trait;
use serde_json::Value;

use palaver_core::UserProfile;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// Profile documents keyed by user id. Writes are merge writes: fields
/// absent from the payload are preserved, present fields overwrite
/// (last-write-wins per field).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn put_user_merged(&self, user_id: &str, patch: Value) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<UserProfile>>;
}

/// Shallow field-level merge, the document store's `merge: true` contract.
pub fn merge_document(document: &mut Value, patch: Value) {
    if let (Some(target), Some(fields)) = (document.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
        return;
    }
    *document = patch;
}

pub struct HttpDirectory {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpDirectory {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn user_url(&self, user_id: &str) -> String {
        format!(
            "{}/users/{}.json?auth={}",
            self.config.document_url, user_id, self.config.api_key
        )
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
}

#[async_trait]
impl DirectoryStore for HttpDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let response = self.http.get(self.user_url(user_id)).send().await?;
        let body = Self::expect_success(response).await?;
        let value: Value = serde_json::from_str(&body)?;
        if value.is_null() {
            return Ok(None);
        }
        let mut profile: UserProfile = serde_json::from_value(value)?;
        if profile.user_id.is_empty() {
            profile.user_id = user_id.to_string();
        }
        Ok(Some(profile))
    }

    async fn put_user_merged(&self, user_id: &str, patch: Value) -> Result<()> {
        let response = self
            .http
            .patch(self.user_url(user_id))
            .json(&patch)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let url = format!(
            "{}/users.json?auth={}",
            self.config.document_url, self.config.api_key
        );
        let response = self.http.get(url).send().await?;
        let body = Self::expect_success(response).await?;
        let value: Value = serde_json::from_str(&body)?;

        let Some(documents) = value.as_object() else {
            return Ok(Vec::new());
        };

        let mut users = Vec::with_capacity(documents.len());
        for (key, doc) in documents {
            match serde_json::from_value::<UserProfile>(doc.clone()) {
                Ok(mut profile) => {
                    if profile.user_id.is_empty() {
                        profile.user_id = key.clone();
                    }
                    users.push(profile);
                }
                Err(e) => {
                    tracing::warn!(user = %key, error = %e, "skipping malformed profile document");
                }
            }
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_preserves_absent_fields() {
        let mut doc = json!({
            "userId": "u1",
            "fullName": "Amine",
            "bio": "hello",
            "connected": true,
        });
        merge_document(&mut doc, json!({"connected": false}));

        assert_eq!(doc["connected"], false);
        assert_eq!(doc["fullName"], "Amine");
        assert_eq!(doc["bio"], "hello");
    }

    #[test]
    fn test_merge_overwrites_present_fields() {
        let mut doc = json!({"fullName": "Amine", "bio": "old"});
        merge_document(&mut doc, json!({"bio": "new", "phoneNumber": "555"}));

        assert_eq!(doc["bio"], "new");
        assert_eq!(doc["phoneNumber"], "555");
        assert_eq!(doc["fullName"], "Amine");
    }

    #[test]
    fn test_merge_into_missing_document() {
        let mut doc = Value::Null;
        merge_document(&mut doc, json!({"userId": "u9"}));
        assert_eq!(doc["userId"], "u9");
    }
}
