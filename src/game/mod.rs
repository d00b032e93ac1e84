use std::{future::Future, time::Duration};

use async_trait::async_trait;
use log::error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

mod client;
pub use client::HttpConnector;

use crate::session::{ProxyError, Session};

/// Pause after a failed call, before handing `None` back
const FAILED_CALL_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum GameError {
    ReqwestError(reqwest::Error),
    SerdeError(serde_json::Error),
    ProxyError(ProxyError),
    InvalidHeader(String),
}

pub type GameResult<T> = Result<T, GameError>;

/// Rocket progress as reported by the server after every call
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RocketState {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub distance: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub boost_attempts: u64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub last_boost_timestamp: i64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub boost_taps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserState {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub referrals_count: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Common shape of every game API response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub rocket: Option<RocketState>,
    #[serde(default)]
    pub user: Option<UserState>,
}

impl GameResponse {
    pub fn rocket(&self) -> RocketState {
        self.rocket.clone().unwrap_or_default()
    }

    pub fn user(&self) -> UserState {
        self.user.clone().unwrap_or_default()
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(|number| number.max(0.0) as u64)
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(|number| number as i64)
}

/// Calls made against the game, failures come back as `None`
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Reachability check of the outgoing connection
    async fn check_proxy(&self) -> bool;

    async fn login(&self, token: &str) -> Option<GameResponse>;

    async fn tap_red_button(&self, token: &str) -> Option<GameResponse>;

    async fn boost(&self, token: &str) -> Option<GameResponse>;

    /// Submit `count` taps at once
    async fn tap(&self, token: &str, count: u64) -> Option<GameResponse>;
}

/// Builds a fresh `GameApi` bound to the session proxy
pub trait GameConnector: Send + Sync {
    fn connect(&self, session: &Session) -> GameResult<Box<dyn GameApi>>;
}

/// Await `operation`, turning a failure into a logged `None`
pub async fn absorb<T, F>(session_name: &str, label: &str, operation: F) -> Option<T>
where
    F: Future<Output = GameResult<T>>,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(error) => {
            tokio::time::sleep(FAILED_CALL_PAUSE).await;
            error!("{} | {} error: {:?}", session_name, label, error);
            None
        }
    }
}
