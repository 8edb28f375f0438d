mod error;
mod models;
mod repository;
mod schema;

pub use error::DbError;
pub use models::Session;
pub use repository::PalaverDb;
