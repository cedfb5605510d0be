//! Feishu (Lark) open-platform transport.
//!
//! Authenticates with a tenant access token obtained from the app credentials
//! and sends messages through the IM v1 API.

use async_trait::async_trait;
use fb_core::{Destination, DestinationKind, Error, MessageTransport, OutgoingMessage, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Tokens are refreshed this long before Feishu says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Codes Feishu returns for an expired or revoked tenant token.
const INVALID_TOKEN_CODES: [i64; 2] = [99991661, 99991663];

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    receive_id: &'a str,
    msg_type: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(value: String, expire_secs: u64) -> Self {
        let lifetime = Duration::from_secs(expire_secs).saturating_sub(TOKEN_REFRESH_MARGIN);
        Self {
            value,
            refresh_at: Instant::now() + lifetime,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

pub struct FeishuClient {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        let app_secret = app_secret.into();
        if app_id.trim().is_empty() || app_secret.trim().is_empty() {
            return Err(Error::Configuration(
                "missing Feishu app credentials: set FEISHU_APP_ID and FEISHU_APP_SECRET".to_string(),
            ));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id,
            app_secret,
            token: Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Checks the credentials by requesting a fresh tenant token.
    pub async fn test_connection(&self) -> Result<()> {
        let (token, expire) = self.request_token().await?;
        info!(expires_in = expire, "Feishu credentials verified");
        *self.token.lock().await = Some(CachedToken::new(token, expire));
        Ok(())
    }

    async fn request_token(&self) -> Result<(String, u64)> {
        let response: TokenResponse = self
            .client
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("token request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("invalid token response: {}", e)))?;

        if response.code != 0 {
            return Err(Error::Delivery(format!(
                "Feishu rejected app credentials (code {}): {}",
                response.code, response.msg
            )));
        }
        let token = response
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Delivery("token response without tenant_access_token".to_string()))?;
        Ok((token, response.expire))
    }

    async fn tenant_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("requesting Feishu tenant access token");
        let (token, expire) = self.request_token().await?;
        *cached = Some(CachedToken::new(token.clone(), expire));
        Ok(token)
    }

    async fn send_message(
        &self,
        destination: &Destination,
        msg_type: &str,
        content: String,
    ) -> Result<()> {
        let token = self.tenant_token().await?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .query(&[("receive_id_type", receive_id_type(destination.kind))])
            .bearer_auth(token)
            .json(&SendMessageRequest {
                receive_id: &destination.id,
                msg_type,
                content,
            })
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("send to {} failed: {}", destination.id, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Delivery(format!("failed to read send response: {}", e)))?;
        let api: ApiResponse = serde_json::from_str(&body).map_err(|_| {
            Error::Delivery(format!("HTTP {} from Feishu for {}", status, destination.id))
        })?;

        if api.code != 0 {
            if INVALID_TOKEN_CODES.contains(&api.code) {
                self.token.lock().await.take();
            }
            return Err(Error::Delivery(format!(
                "Feishu error {} for {}: {}",
                api.code, destination.id, api.msg
            )));
        }
        Ok(())
    }
}

pub fn receive_id_type(kind: DestinationKind) -> &'static str {
    match kind {
        DestinationKind::Group => "chat_id",
        DestinationKind::User => "open_id",
    }
}

#[async_trait]
impl MessageTransport for FeishuClient {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn deliver(&self, destination: &Destination, message: &OutgoingMessage) -> Result<()> {
        match message {
            OutgoingMessage::Card(card) => {
                self.send_message(destination, "interactive", serde_json::to_string(card)?)
                    .await
            }
            OutgoingMessage::Text(text) => {
                let content = serde_json::json!({ "text": text }).to_string();
                self.send_message(destination, "text", content).await
            }
        }
    }
}
