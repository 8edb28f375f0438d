use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("session store error: {0}")]
    Db(#[from] palaver_db::DbError),

    #[error("{0}")]
    Backend(#[from] palaver_backend::BackendError),

    #[error("not signed in")]
    NotSignedIn,

    #[error("channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, WorkerError>;
