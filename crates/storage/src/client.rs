use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::StorageError;

const API_BASE: &str = "https://api.dropboxapi.com";
const CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Extensions the file browser exposes for processing.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "pdf"];

/// One entry from a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_folder: bool,
}

/// The one storage operation the pipeline needs: fetch a file's bytes
/// and its canonical name.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn download(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<(Vec<u8>, String), StorageError>;
}

// ── Dropbox API types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ListFolderRequest<'a> {
    path: &'a str,
}

#[derive(Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListEntry>,
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
struct DownloadMetadata {
    name: String,
}

/// Dropbox HTTP API client (RPC + content endpoints).
pub struct DropboxClient {
    http: reqwest::Client,
    api_base: String,
    content_base: String,
}

impl Default for DropboxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DropboxClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
            content_base: CONTENT_BASE.to_string(),
        }
    }

    /// Override the endpoints (tests).
    pub fn with_bases(mut self, api_base: impl Into<String>, content_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.content_base = content_base.into();
        self
    }

    /// List a folder, keeping sub-folders and files on the image/PDF
    /// allow-list. Dropbox addresses the root as `""`, not `/`.
    pub async fn list_folder(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<Vec<RemoteFile>, StorageError> {
        let path = if path == "/" { "" } else { path };

        let response = self
            .http
            .post(format!("{}/2/files/list_folder", self.api_base))
            .bearer_auth(access_token)
            .json(&ListFolderRequest { path })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api { status, body });
        }

        let listing: ListFolderResponse = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        Ok(listing
            .entries
            .into_iter()
            .filter_map(|entry| {
                let path = entry
                    .path_display
                    .or(entry.path_lower)
                    .unwrap_or_default();
                match entry.tag.as_str() {
                    "folder" => Some(RemoteFile {
                        name: entry.name,
                        path,
                        size: 0,
                        is_folder: true,
                    }),
                    "file" if has_allowed_extension(&entry.name) => Some(RemoteFile {
                        name: entry.name,
                        path,
                        size: entry.size,
                        is_folder: false,
                    }),
                    _ => None,
                }
            })
            .collect())
    }
}

fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Encode a JSON value for use in an HTTP header: Dropbox requires
/// non-ASCII characters in `Dropbox-API-Arg` to be `\uXXXX`-escaped.
fn header_safe_json(value: &serde_json::Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii() {
                c.to_string()
            } else {
                let mut buf = [0u16; 2];
                c.encode_utf16(&mut buf)
                    .iter()
                    .map(|unit| format!("\\u{unit:04x}"))
                    .collect()
            }
        })
        .collect()
}

#[async_trait]
impl FileStore for DropboxClient {
    async fn download(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<(Vec<u8>, String), StorageError> {
        let arg = header_safe_json(&serde_json::json!({ "path": path }));

        let response = self
            .http
            .post(format!("{}/2/files/download", self.content_base))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api { status, body });
        }

        let name = response
            .headers()
            .get("Dropbox-API-Result")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| serde_json::from_str::<DownloadMetadata>(v).ok())
            .map(|m| m.name)
            .ok_or_else(|| {
                StorageError::MalformedResponse(
                    "missing or unreadable Dropbox-API-Result header".to_string(),
                )
            })?;

        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(path, size = bytes.len(), "Downloaded file");
        Ok((bytes, name))
    }
}

// ── Mock store (always available, used for tests) ─────────────────────────────

/// Serves files from an in-memory map; unknown paths fail like a missing
/// remote file.
#[derive(Default)]
pub struct MockFileStore {
    files: HashMap<String, (Vec<u8>, String)>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.files.insert(path.into(), (bytes, name.into()));
        self
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn download(
        &self,
        _access_token: &str,
        path: &str,
    ) -> Result<(Vec<u8>, String), StorageError> {
        self.files
            .get(path)
            .map(|(bytes, name)| (bytes.clone(), name.clone()))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extension_allow_list() {
        assert!(has_allowed_extension("a.JPG"));
        assert!(has_allowed_extension("scan.pdf"));
        assert!(!has_allowed_extension("notes.txt"));
        assert!(!has_allowed_extension("noext"));
    }

    #[test]
    fn header_safe_json_escapes_non_ascii() {
        let arg = header_safe_json(&serde_json::json!({ "path": "/領収書.jpg" }));
        assert!(arg.is_ascii());
        assert!(arg.contains("\\u9818"));
        // ASCII passes through untouched.
        assert!(arg.contains("\"path\""));
    }

    #[tokio::test]
    async fn list_folder_filters_to_allow_list_and_keeps_folders() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [
                    { ".tag": "folder", "name": "2025", "path_display": "/2025" },
                    { ".tag": "file", "name": "a.jpg", "path_display": "/a.jpg", "size": 123 },
                    { ".tag": "file", "name": "notes.txt", "path_display": "/notes.txt", "size": 9 },
                    { ".tag": "file", "name": "scan.pdf", "path_lower": "/scan.pdf", "size": 456 }
                ]
            })))
            .mount(&server)
            .await;

        let client = DropboxClient::new().with_bases(server.uri(), server.uri());
        let files = client.list_folder("token", "/").await.unwrap();

        assert_eq!(files.len(), 3);
        assert!(files[0].is_folder);
        assert_eq!(files[1].name, "a.jpg");
        assert_eq!(files[1].size, 123);
        assert_eq!(files[2].path, "/scan.pdf");

        // Root must be requested as "".
        let body: serde_json::Value =
            serde_json::from_slice(&server.received_requests().await.unwrap()[0].body).unwrap();
        assert_eq!(body["path"], "");
    }

    #[tokio::test]
    async fn download_returns_bytes_and_header_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .and(header_exists("Dropbox-API-Arg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Dropbox-API-Result", r#"{"name": "a.jpg"}"#)
                    .set_body_bytes(b"image-bytes".to_vec()),
            )
            .mount(&server)
            .await;

        let client = DropboxClient::new().with_bases(server.uri(), server.uri());
        let (bytes, name) = client.download("token", "/a.jpg").await.unwrap();
        assert_eq!(bytes, b"image-bytes");
        assert_eq!(name, "a.jpg");
    }

    #[tokio::test]
    async fn download_maps_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("path/not_found/"))
            .mount(&server)
            .await;

        let client = DropboxClient::new().with_bases(server.uri(), server.uri());
        let err = client.download("token", "/missing.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn mock_store_serves_and_misses() {
        let store = MockFileStore::new().with_file("/a.jpg", "a.jpg", vec![1, 2, 3]);
        let (bytes, name) = store.download("t", "/a.jpg").await.unwrap();
        assert_eq!((bytes, name), (vec![1, 2, 3], "a.jpg".to_string()));
        assert!(matches!(
            store.download("t", "/b.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
