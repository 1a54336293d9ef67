//! HTTP implementation of [`GameApi`] over the game server's REST surface.
//!
//! Transport failures retry with exponential backoff (0.5/1/2/4 s, three
//! retries); an active-cooldown rejection waits out the stated cooldown and
//! retries the same action once. Everything else surfaces as a typed
//! [`ApiError`] for the caller to handle.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use common::Clock;

use crate::GameApi;
use crate::error::ApiError;
use crate::types::*;

const BACKOFF_MS: [u64; 4] = [500, 1_000, 2_000, 4_000];
const MAX_TRANSPORT_RETRIES: usize = 3;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct PagedEnvelope<T> {
    data: Vec<T>,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    pages: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    message: String,
}

#[derive(Clone)]
pub struct HttpGameClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    clock: Arc<dyn Clock>,
}

impl HttpGameClient {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.request(method.clone(), self.url(path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    /// Issue a request with the transport retry ladder and cooldown handling.
    async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let mut transport_attempts = 0;
        let mut cooldown_retried = false;

        loop {
            let err = match self.send_once(&method, path, body.as_ref()).await {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.map_err(ApiError::from)?;
                    if status.is_success() {
                        return Ok(text);
                    }
                    classify_response(status, &text)
                }
                Err(e) => e,
            };

            if err.is_retryable() && transport_attempts < MAX_TRANSPORT_RETRIES {
                let delay = BACKOFF_MS[transport_attempts.min(BACKOFF_MS.len() - 1)];
                warn!(
                    path,
                    attempt = transport_attempts + 1,
                    delay_ms = delay,
                    error = %err,
                    "transport error, backing off"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                transport_attempts += 1;
                continue;
            }

            if let ApiError::CooldownActive { seconds_left } = &err {
                let seconds_left = *seconds_left;
                if !cooldown_retried {
                    debug!(path, seconds_left, "waiting out active cooldown before retry");
                    let deadline = self.clock.now_ms() + (seconds_left * 1_000.0).ceil() as u64;
                    self.clock.sleep_until_ms(deadline).await;
                    cooldown_retried = true;
                    continue;
                }
            }

            return Err(err);
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let text = self.request_raw(Method::GET, path, None).await?;
        let env: Envelope<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(env.data)
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str) -> Result<Page<T>, ApiError> {
        let text = self.request_raw(Method::GET, path, None).await?;
        let env: PagedEnvelope<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(Page {
            items: env.data,
            page: env.page.max(1),
            pages: env.pages.max(1),
        })
    }

    #[instrument(skip(self, body), level = "debug", fields(name = %name))]
    async fn action(
        &self,
        name: &str,
        action: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ActionResult, ApiError> {
        let path = format!("/my/{name}/action/{action}");
        let text = self.request_raw(Method::POST, &path, body).await?;
        let env: Envelope<ActionResult> =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
        debug!(
            action,
            cooldown_s = env.data.cooldown.remaining_seconds,
            "action accepted"
        );
        Ok(env.data)
    }
}

fn classify_response(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let code = if env.error.code != 0 {
                env.error.code
            } else {
                status.as_u16()
            };
            ApiError::from_status(code, &env.error.message)
        }
        Err(_) => ApiError::from_status(status.as_u16(), body),
    }
}

#[async_trait::async_trait]
impl GameApi for HttpGameClient {
    async fn get_my_characters(&self) -> Result<Vec<CharacterData>, ApiError> {
        self.get_data("/my/characters").await
    }

    async fn get_character(&self, name: &str) -> Result<CharacterData, ApiError> {
        self.get_data(&format!("/characters/{name}")).await
    }

    async fn get_maps(&self, filter: MapFilter) -> Result<Page<MapTile>, ApiError> {
        let mut query = format!("?page={}&size=100", filter.page.max(1));
        if let Some(t) = &filter.content_type {
            query.push_str(&format!("&content_type={t}"));
        }
        if let Some(c) = &filter.content_code {
            query.push_str(&format!("&content_code={c}"));
        }
        self.get_page(&format!("/maps{query}")).await
    }

    async fn get_bank_details(&self) -> Result<BankDetails, ApiError> {
        self.get_data("/my/bank").await
    }

    async fn get_bank_items(&self, page: u32) -> Result<Page<SimpleItem>, ApiError> {
        self.get_page(&format!("/my/bank/items?page={}&size=100", page.max(1)))
            .await
    }

    async fn get_active_events(&self) -> Result<Vec<ActiveEvent>, ApiError> {
        self.get_data("/events/active").await
    }

    async fn get_server_details(&self) -> Result<ServerDetails, ApiError> {
        self.get_data("/").await
    }

    async fn get_achievements(&self, page: u32, size: u32) -> Result<Page<AchievementData>, ApiError> {
        self.get_page(&format!("/achievements?page={}&size={}", page.max(1), size))
            .await
    }

    async fn move_to(&self, name: &str, x: i32, y: i32) -> Result<ActionResult, ApiError> {
        self.action(name, "move", Some(serde_json::json!({ "x": x, "y": y })))
            .await
    }

    async fn fight(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "fight", None).await
    }

    async fn gather(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "gathering", None).await
    }

    async fn craft(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "crafting",
            Some(serde_json::json!({ "code": code, "quantity": quantity })),
        )
        .await
    }

    async fn rest(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "rest", None).await
    }

    async fn use_item(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "use",
            Some(serde_json::json!({ "code": code, "quantity": quantity })),
        )
        .await
    }

    async fn recycle(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "recycling",
            Some(serde_json::json!({ "code": code, "quantity": quantity })),
        )
        .await
    }

    async fn equip(&self, name: &str, code: &str, slot: &str) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "equip",
            Some(serde_json::json!({ "code": code, "slot": slot })),
        )
        .await
    }

    async fn unequip(&self, name: &str, slot: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "unequip", Some(serde_json::json!({ "slot": slot })))
            .await
    }

    async fn sell(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "grandexchange/sell",
            Some(serde_json::json!({ "code": code, "quantity": quantity })),
        )
        .await
    }

    async fn deposit_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError> {
        self.action(name, "bank/deposit", Some(serde_json::json!(items)))
            .await
    }

    async fn withdraw_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError> {
        self.action(name, "bank/withdraw", Some(serde_json::json!(items)))
            .await
    }

    async fn deposit_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "bank/deposit/gold",
            Some(serde_json::json!({ "quantity": quantity })),
        )
        .await
    }

    async fn withdraw_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError> {
        self.action(
            name,
            "bank/withdraw/gold",
            Some(serde_json::json!({ "quantity": quantity })),
        )
        .await
    }

    async fn buy_bank_expansion(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "bank/buy_expansion", None).await
    }

    async fn complete_task(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "task/complete", None).await
    }

    async fn accept_task(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.action(name, "task/new", None).await
    }

    async fn sandbox_give_gold(&self, name: &str, quantity: u64) -> Result<(), ApiError> {
        self.request_raw(
            Method::POST,
            "/sandbox/gold",
            Some(serde_json::json!({ "name": name, "quantity": quantity })),
        )
        .await
        .map(|_| ())
    }

    async fn sandbox_give_item(&self, name: &str, code: &str, quantity: u32) -> Result<(), ApiError> {
        self.request_raw(
            Method::POST,
            "/sandbox/item",
            Some(serde_json::json!({ "name": name, "code": code, "quantity": quantity })),
        )
        .await
        .map(|_| ())
    }

    async fn sandbox_give_xp(&self, name: &str, skill: &str, quantity: u64) -> Result<(), ApiError> {
        self.request_raw(
            Method::POST,
            "/sandbox/xp",
            Some(serde_json::json!({ "name": name, "skill": skill, "quantity": quantity })),
        )
        .await
        .map(|_| ())
    }

    async fn sandbox_spawn_event(&self, code: &str) -> Result<(), ApiError> {
        self.request_raw(
            Method::POST,
            "/sandbox/event",
            Some(serde_json::json!({ "code": code })),
        )
        .await
        .map(|_| ())
    }

    async fn sandbox_reset_account(&self) -> Result<(), ApiError> {
        self.request_raw(Method::POST, "/sandbox/reset", None)
            .await
            .map(|_| ())
    }
}
