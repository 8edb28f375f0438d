use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// A session as the identity service issues it. Sign-out is purely local
/// (drop the tokens), so the trait only covers the two credential calls.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession>;
}

pub struct HttpIdentity {
    http: reqwest::Client,
    config: BackendConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialPayload<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl HttpIdentity {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn credential_call(&self, endpoint: &str, email: &str, password: &str) -> Result<AuthSession> {
        let url = format!(
            "{}/v1/{}?key={}",
            self.config.identity_url, endpoint, self.config.api_key
        );
        let response = self
            .http
            .post(url)
            .json(&CredentialPayload {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Surface whatever message the service gives us, verbatim.
            if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
                return Err(BackendError::Service {
                    message: parsed.error.message,
                });
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        Ok(AuthSession {
            user_id: token.local_id,
            email: token.email,
            id_token: token.id_token,
            refresh_token: token.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityService for HttpIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.credential_call("accounts:signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.credential_call("accounts:signUp", email, password).await
    }
}
