mod config;
mod directory;
mod error;
mod identity;
mod media;
mod memory;
mod realtime;
mod services;
mod sse;

pub use config::BackendConfig;
pub use directory::{DirectoryStore, HttpDirectory, merge_document};
pub use error::BackendError;
pub use identity::{AuthSession, HttpIdentity, IdentityService};
pub use media::{HttpMedia, MediaStore, StoredObject};
pub use memory::{LocalIdentity, MemoryDirectory, MemoryMedia, MemoryRealtime};
pub use realtime::{HttpRealtime, RealtimeStore};
pub use services::Services;
