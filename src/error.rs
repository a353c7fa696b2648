use thiserror::Error;

/// Failures of provider operations. Each variant carries a message naming the
/// operation that failed followed by the underlying cause.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("declare error: {0}")]
    Declare(String),

    #[error("list error: {0}")]
    List(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("delete error: {0}")]
    Delete(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
