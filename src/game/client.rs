use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, trace};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde_json::{json, Value};

use super::{absorb, GameApi, GameConnector, GameError, GameResponse, GameResult};
use crate::session::{agents::sec_ch_ua_headers, Session};

const GAME_API_URL: &str = "https://api.eventhorizongame.xyz";
const PROXY_PROBE_URL: &str = "https://ifconfig.me/ip";

const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
const PROXY_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

const BASE_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("content-type", "application/json"),
    ("origin", "https://eventhorizongame.xyz"),
    ("referer", "https://eventhorizongame.xyz/"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-site"),
    ("x-requested-with", "org.telegram.messenger"),
];

/// HTTP client of the game API, one per loop iteration
pub struct GameClient {
    http: reqwest::Client,
    session_name: String,
    proxy_label: String,
}

impl GameClient {
    /// Create a new `GameClient` with the session's headers and proxy
    pub fn new(session: &Session) -> GameResult<Self> {
        let mut builder = reqwest::Client::builder()
            .default_headers(build_headers(&session.user_agent)?)
            .timeout(CLIENT_TIMEOUT);

        if let Some(proxy) = &session.proxy {
            builder = builder.proxy(proxy.to_reqwest().map_err(GameError::ProxyError)?);
        }

        let http = builder.build().map_err(GameError::ReqwestError)?;

        Ok(Self {
            http,
            session_name: session.name.clone(),
            proxy_label: session
                .proxy
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "direct".to_string()),
        })
    }

    /// Send `payload` to `endpoint` and decode the JSON answer
    pub async fn call(&self, method: Method, endpoint: &str, payload: &Value) -> GameResult<Value> {
        let url = format!("{}{}", GAME_API_URL, endpoint);
        trace!("{} | {} {}", self.session_name, method, url);

        self.http
            .request(method, url)
            .json(payload)
            .send()
            .await
            .map_err(GameError::ReqwestError)?
            .error_for_status()
            .map_err(GameError::ReqwestError)?
            .json::<Value>()
            .await
            .map_err(GameError::ReqwestError)
    }

    async fn post_with_token(
        &self,
        label: &'static str,
        endpoint: &str,
        token: &str,
    ) -> Option<GameResponse> {
        absorb(&self.session_name, label, async {
            let value = self
                .call(Method::POST, endpoint, &json!({ "auth": token }))
                .await?;
            serde_json::from_value(value).map_err(GameError::SerdeError)
        })
        .await
    }
}

fn build_headers(user_agent: &str) -> GameResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    let dynamic = sec_ch_ua_headers(user_agent)
        .into_iter()
        .chain(std::iter::once(("user-agent", user_agent.to_string())));
    let fixed = BASE_HEADERS
        .iter()
        .map(|(name, value)| (*name, value.to_string()));

    for (name, value) in fixed.chain(dynamic) {
        let value =
            HeaderValue::from_str(&value).map_err(|_| GameError::InvalidHeader(value.clone()))?;
        headers.insert(HeaderName::from_static(name), value);
    }

    Ok(headers)
}

#[async_trait]
impl GameApi for GameClient {
    async fn check_proxy(&self) -> bool {
        let response = self
            .http
            .get(PROXY_PROBE_URL)
            .timeout(PROXY_PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(response) => {
                let ip = response.text().await.unwrap_or_default();
                info!("{} | Proxy IP: {}", self.session_name, ip.trim());
                true
            }
            Err(error) => {
                error!(
                    "{} | Proxy: {} | Error: {:?}",
                    self.session_name, self.proxy_label, error
                );
                false
            }
        }
    }

    async fn login(&self, token: &str) -> Option<GameResponse> {
        self.post_with_token("login", "/auth", token).await
    }

    async fn tap_red_button(&self, token: &str) -> Option<GameResponse> {
        self.post_with_token("tap_red_button", "/tap", token).await
    }

    async fn boost(&self, token: &str) -> Option<GameResponse> {
        self.post_with_token("boost", "/tap?boost=true", token).await
    }

    async fn tap(&self, token: &str, count: u64) -> Option<GameResponse> {
        self.post_with_token("tap", &format!("/taps?count={}", count), token).await
    }
}

/// Connector producing real `GameClient`s
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

impl GameConnector for HttpConnector {
    fn connect(&self, session: &Session) -> GameResult<Box<dyn GameApi>> {
        Ok(Box::new(GameClient::new(session)?))
    }
}
