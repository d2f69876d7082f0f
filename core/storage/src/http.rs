//! REST client for the hosted vault API.
//!
//! The server authenticates every request with a bearer session token and
//! scopes it to the account that token belongs to. Binary fields travel as
//! base64 strings (`blobB64`, `ivB64`, `saltB64`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::provider::RemoteVaultStore;
use passvault_common::{
    encoding, AccountId, EncryptedItem, Error, MalformedItem, Result, VaultMeta, VaultSnapshot,
    IV_LENGTH, SALT_LENGTH,
};

/// Iteration count the server assumes when a stored meta carries none.
const SERVER_DEFAULT_ITERATIONS: u32 = 200_000;

/// Vault metadata as the server stores it.
///
/// Older documents may also carry a whole-vault blob (`vaultB64`/`ivB64`);
/// those fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMeta {
    #[serde(default)]
    salt_b64: Option<String>,
    #[serde(default)]
    iterations: Option<u32>,
}

impl WireMeta {
    fn from_meta(meta: &VaultMeta) -> Self {
        Self {
            salt_b64: Some(encoding::encode(&meta.salt)),
            iterations: Some(meta.iterations),
        }
    }

    /// `None` when the server has no salt for this account yet.
    fn into_meta(self) -> Result<Option<VaultMeta>> {
        let Some(salt_b64) = self.salt_b64 else {
            return Ok(None);
        };
        let salt = encoding::decode_array::<SALT_LENGTH>(&salt_b64)
            .map_err(|e| Error::Store(format!("Invalid salt from server: {}", e)))?;
        let iterations = self.iterations.unwrap_or(SERVER_DEFAULT_ITERATIONS);
        VaultMeta::new(salt, iterations).map(Some)
    }
}

/// One stored password blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    id: String,
    blob_b64: String,
    #[serde(default)]
    iv_b64: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl WireItem {
    /// Convert to an [`EncryptedItem`], or the reason it can't be.
    fn into_item(self) -> std::result::Result<EncryptedItem, String> {
        let iv_b64 = self.iv_b64.ok_or_else(|| "missing iv".to_string())?;
        let iv = encoding::decode_array::<IV_LENGTH>(&iv_b64)
            .map_err(|e| format!("invalid iv: {}", e))?;
        let ciphertext =
            encoding::decode(&self.blob_b64).map_err(|e| format!("invalid blob: {}", e))?;

        Ok(EncryptedItem {
            id: self.id,
            iv,
            ciphertext,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Body of `GET /api/vault`.
///
/// Password entries stay raw so each one is parsed on its own.
#[derive(Debug, Deserialize)]
struct VaultResponse {
    #[serde(default)]
    meta: Option<WireMeta>,
    #[serde(default)]
    passwords: Vec<Value>,
}

/// Body of item mutations.
#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(default)]
    meta: Option<WireMeta>,
    #[serde(default)]
    passwords: Option<Vec<Value>>,
}

/// Body of `POST /api/vault`.
#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    meta: Option<WireMeta>,
}

#[derive(Serialize)]
struct SetMetaRequest {
    meta: WireMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendRequest<'a> {
    id: &'a str,
    blob_b64: String,
    iv_b64: String,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    id: &'a str,
}

/// Build a snapshot from a server document.
///
/// Entries without an id were written by the legacy whole-vault path and
/// cannot be addressed for removal, so they are left out entirely. Entries
/// with an id that fail to parse are reported as malformed.
fn to_snapshot(meta: Option<WireMeta>, passwords: Vec<Value>) -> Result<VaultSnapshot> {
    let mut snapshot = VaultSnapshot {
        meta: meta.unwrap_or_default().into_meta()?,
        ..VaultSnapshot::default()
    };

    for entry in passwords {
        let Some(id) = entry.get("id").and_then(Value::as_str).map(str::to_string) else {
            debug!("Ignoring legacy server item without an id");
            continue;
        };

        let parsed = serde_json::from_value::<WireItem>(entry)
            .map_err(|e| e.to_string())
            .and_then(WireItem::into_item);
        match parsed {
            Ok(item) => snapshot.items.push(item),
            Err(reason) => {
                warn!(item_id = %id, %reason, "Malformed server item");
                snapshot.malformed.push(MalformedItem { id, reason });
            }
        }
    }

    Ok(snapshot)
}

/// Vault store backed by the hosted REST API.
///
/// Bound to a single session token; the `account` argument of each call is
/// used for logging only, the server resolves the account from the token.
pub struct HttpStore {
    http: Client,
    base_url: Url,
    token: String,
}

impl HttpStore {
    /// Create a new REST store.
    ///
    /// # Errors
    /// - Invalid base URL
    /// - Empty token
    /// - HTTP client construction failure
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::InvalidInput("Session token cannot be empty".to_string()));
        }

        // A trailing slash makes `join` append instead of replacing the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::InvalidInput(format!("Invalid base URL: {}", e)))?;

        let http = Client::builder()
            .user_agent("PassVault/0.1")
            .build()
            .map_err(|e| Error::Store(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "Vault API request");

        let mut request = self
            .http
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Store(format!("Request failed: {}", e)))?;

        Self::handle_response(response).await
    }

    /// Handle API response with error checking.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Store(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Store("Session token rejected".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Store(format!("API error: {} - {}", status, body)))
        }
    }

    async fn fetch_vault(&self) -> Result<VaultSnapshot> {
        let response: VaultResponse = self.send::<(), _>(Method::GET, "api/vault", None).await?;
        to_snapshot(response.meta, response.passwords)
    }

    /// Mutation responses normally carry the canonical list; fall back to a
    /// fresh fetch when a server omits it.
    async fn snapshot_from(&self, response: MutationResponse) -> Result<VaultSnapshot> {
        match response.passwords {
            Some(passwords) => to_snapshot(response.meta, passwords),
            None => self.fetch_vault().await,
        }
    }
}

impl fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStore")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl RemoteVaultStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_meta(&self, account: &AccountId) -> Result<Option<VaultMeta>> {
        debug!(account = %account, "Fetching vault meta");
        let response: VaultResponse = self.send::<(), _>(Method::GET, "api/vault", None).await?;
        response.meta.unwrap_or_default().into_meta()
    }

    async fn set_meta(&self, account: &AccountId, meta: VaultMeta) -> Result<VaultMeta> {
        debug!(account = %account, "Storing vault meta");
        let body = SetMetaRequest {
            meta: WireMeta::from_meta(&meta),
        };
        let response: MetaResponse = self.send(Method::POST, "api/vault", Some(&body)).await?;

        match response.meta.map(WireMeta::into_meta).transpose()?.flatten() {
            Some(stored) => Ok(stored),
            None => Ok(meta),
        }
    }

    async fn list_items(&self, account: &AccountId) -> Result<Vec<EncryptedItem>> {
        debug!(account = %account, "Listing vault items");
        Ok(self.fetch_vault().await?.items)
    }

    async fn fetch(&self, account: &AccountId) -> Result<VaultSnapshot> {
        debug!(account = %account, "Fetching vault");
        self.fetch_vault().await
    }

    async fn append_item(&self, account: &AccountId, item: EncryptedItem) -> Result<VaultSnapshot> {
        debug!(account = %account, item_id = %item.id, "Appending vault item");
        let body = AppendRequest {
            id: &item.id,
            blob_b64: encoding::encode(&item.ciphertext),
            iv_b64: encoding::encode(&item.iv),
        };
        let response: MutationResponse = self
            .send(Method::POST, "api/vault/item", Some(&body))
            .await?;
        self.snapshot_from(response).await
    }

    async fn remove_item(&self, account: &AccountId, id: &str) -> Result<VaultSnapshot> {
        debug!(account = %account, item_id = %id, "Removing vault item");
        let body = RemoveRequest { id };
        let response: MutationResponse = self
            .send(Method::DELETE, "api/vault/item", Some(&body))
            .await?;
        self.snapshot_from(response).await
    }
}
