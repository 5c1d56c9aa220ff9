use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::urls::encode_key;
use super::{validate_key, ObjectStore, ObjectStoreError};

const STORAGE_API: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token actually expires.
const TOKEN_SLACK_SECS: i64 = 60;

/// Google Cloud Storage object store backend.
pub struct GcsStore {
    bucket: String,
    client: Client,
    credentials_file: Option<String>,
    token: RwLock<CachedToken>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            credentials_file: credentials_file.map(|s| s.to_string()),
            token: RwLock::new(CachedToken {
                value: String::new(),
                expires_at: DateTime::<Utc>::MIN_UTC,
            }),
        };

        // Fail fast on bad credentials instead of on the first upload
        store.bearer_token().await?;
        Ok(store)
    }

    /// Current access token, exchanging a new one when it is about to expire.
    async fn bearer_token(&self) -> Result<String, ObjectStoreError> {
        let fresh_until = Utc::now() + Duration::seconds(TOKEN_SLACK_SECS);
        {
            let cached = self.token.read().await;
            if cached.expires_at > fresh_until {
                return Ok(cached.value.clone());
            }
        }

        let mut cached = self.token.write().await;
        if cached.expires_at > fresh_until {
            return Ok(cached.value.clone());
        }

        let response = match self.credentials_file {
            Some(ref path) => self.token_from_service_account(path).await,
            None => self.token_from_metadata_server().await,
        }
        .map_err(|e| ObjectStoreError::Backend(format!("GCS token exchange failed: {e}")))?;

        tracing::debug!(expires_in = response.expires_in, "Refreshed GCS access token");
        cached.value = response.access_token;
        cached.expires_at = Utc::now() + Duration::seconds(response.expires_in);
        Ok(cached.value.clone())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");
        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let assertion = format!("{unsigned}.{}", base64_url_encode(&signature));

        let token = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(token)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let token = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(token)
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{STORAGE_API}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            encode_key(key)
        )
    }

    /// Object names contain slashes, so the path form must be fully encoded.
    fn resource_url(&self, key: &str) -> String {
        format!(
            "{STORAGE_API}/storage/v1/b/{}/o/{}",
            self.bucket,
            encode_key(key)
        )
    }
}

async fn ensure_success(resp: Response, action: &str) -> Result<Response, ObjectStoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ObjectStoreError::Backend(format!(
        "GCS {action} failed ({status}): {body}"
    )))
}

fn transport(e: reqwest::Error) -> ObjectStoreError {
    ObjectStoreError::Backend(e.to_string())
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer_token().await?;

        let resp = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(transport)?;

        ensure_success(resp, "upload").await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer_token().await?;

        let resp = self
            .client
            .get(format!("{}?alt=media", self.resource_url(key)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        ensure_success(resp, "download")
            .await?
            .bytes()
            .await
            .map_err(transport)
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer_token().await?;

        let resp = self
            .client
            .delete(self.resource_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        // Already gone
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        ensure_success(resp, "delete").await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer_token().await?;

        let resp = self
            .client
            .get(self.resource_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => ensure_success(resp, "metadata lookup").await.map(|_| true),
        }
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

/// Sign `data` with the PKCS#8 PEM key of a service account.
fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    use base64::Engine;

    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect();
    let der = base64::engine::general_purpose::STANDARD.decode(der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
