use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("could not locate a platform data directory")]
    DataDir,
}

pub type Result<T> = std::result::Result<T, DbError>;
