/// Endpoints and credentials for the hosted services. All five values must
/// be present for the HTTP clients to be wired; otherwise the app falls
/// back to the in-process services.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: String,
    pub identity_url: String,
    pub document_url: String,
    pub storage_url: String,
    pub realtime_url: String,
}

impl BackendConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = read("PALAVER_API_KEY")?;
        Some(Self {
            api_key,
            identity_url: read("PALAVER_IDENTITY_URL")?,
            document_url: read("PALAVER_DOCUMENT_URL")?,
            storage_url: read("PALAVER_STORAGE_URL")?,
            realtime_url: read("PALAVER_REALTIME_URL")?,
        })
    }
}

fn read(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            tracing::debug!("{} not set", name);
            None
        }
    }
}
