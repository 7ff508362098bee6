use async_trait::async_trait;
use base64::Engine as _;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::StorageError;

const AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";
const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// One-time storage for PKCE state → verifier pairs.
///
/// `take` must remove atomically: a state token is consumable exactly
/// once, and looking up an unknown or already-consumed token is a hard
/// failure at the call site. Injected so a shared store (Redis, DB) can
/// replace the in-process map when running more than one instance.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, state: String, verifier: String);
    async fn take(&self, state: &str) -> Option<String>;
}

/// In-process implementation backed by a mutexed map.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, state: String, verifier: String) {
        self.entries.lock().await.insert(state, verifier);
    }

    async fn take(&self, state: &str) -> Option<String> {
        self.entries.lock().await.remove(state)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Dropbox OAuth2 with PKCE: builds the authorization URL and exchanges
/// the returned code for a bearer token. Token issuance itself is the
/// provider's business; the credential comes back opaque.
pub struct DropboxAuth {
    http: reqwest::Client,
    app_key: String,
    app_secret: String,
    redirect_uri: String,
    store: Arc<dyn StateStore>,
    token_url: String,
}

impl DropboxAuth {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            store,
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Point the token exchange at a different endpoint (tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Generate the authorization URL and its one-time state token.
    /// The PKCE verifier is stored under the state until the callback.
    pub async fn authorize_url(&self) -> Result<(String, String), StorageError> {
        let verifier = random_token(64);
        let challenge = s256_challenge(&verifier);
        let state = random_token(32);

        self.store.put(state.clone(), verifier).await;

        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.app_key.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("token_access_type", "online"),
            ],
        )
        .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        Ok((url.to_string(), state))
    }

    /// Exchange an authorization code for an access token. Consumes the
    /// state's verifier; a second exchange with the same state fails.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<String, StorageError> {
        let verifier = self
            .store
            .take(state)
            .await
            .ok_or(StorageError::InvalidState)?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("client_id", &self.app_key),
                ("client_secret", &self.app_secret),
                ("redirect_uri", &self.redirect_uri),
                ("code_verifier", &verifier),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;
        Ok(token.access_token)
    }
}

/// URL-safe random token of `bytes` random bytes (unpadded base64url).
fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&buf)
}

/// RFC 7636 S256: base64url(sha256(verifier)), unpadded.
fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
