mod error;
mod events;
mod feed;
mod location;
mod worker;

pub use error::WorkerError;
pub use events::WorkerEvent;
pub use feed::MessageFeed;
pub use location::LocationProvider;
pub use worker::{PalaverWorker, ProfileUpdate, filter_by_name};

pub use palaver_backend::Services;
pub use palaver_core::{ChatMessage, Coordinates, MessagePayload, UserProfile, room_key};
pub use palaver_db::Session;
