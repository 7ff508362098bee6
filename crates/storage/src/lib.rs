pub mod auth;
pub mod client;

pub use auth::{DropboxAuth, MemoryStateStore, StateStore};
pub use client::{DropboxClient, FileStore, MockFileStore, RemoteFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid or expired state parameter")]
    InvalidState,
    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed storage response: {0}")]
    MalformedResponse(String),
    #[error("File not found: {0}")]
    NotFound(String),
}
