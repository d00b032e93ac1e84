use std::{fmt, ops::RangeInclusive, time::Duration};

use chrono::Utc;
use log::{error, info, warn};
use rand::Rng;
use tokio::time::{sleep, Instant};

pub mod speed;
pub mod token;

use crate::{
    game::{GameApi, GameConnector, GameError},
    session::{LockError, Session, SessionLock},
    settings::Settings,
    telegram::{BridgeError, WebAppBridge, WebViewTarget},
};
use speed::speed_calc;
use token::InitData;

/// Referral used when the configured one is not picked
pub const FALLBACK_REF_ID: &str = "525256526";
const REF_ID_PROBABILITY: f64 = 0.8;

const TOKEN_LIVE_TIME_SECONDS: std::ops::Range<u64> = 3500..3600;
const FLOOD_WAIT_BUFFER: Duration = Duration::from_secs(3);

const PROXY_FAILURE_SLEEP: Duration = Duration::from_secs(300);
const LOGIN_FAILURE_SLEEP: Duration = Duration::from_secs(1800);
const POST_LOGIN_PAUSE: Duration = Duration::from_secs(2);
const UNKNOWN_ERROR_PAUSE: Duration = Duration::from_secs(3);
const UNKNOWN_ERROR_SLEEP: Duration = Duration::from_secs(1200);

const BOOST_WINDOW_SECONDS: i64 = 3600;
const MAX_BOOST_ATTEMPTS: u64 = 6;
const BOOST_SETTLE: Duration = Duration::from_secs(3);
const BOOST_TAP_GOAL: u64 = 1000;
const TAP_BATCH: RangeInclusive<u64> = 30..=60;
const TAP_JITTER_SECONDS: RangeInclusive<u64> = 1..=3;

#[derive(Debug)]
pub enum TapperError {
    /// The session cannot produce a token anymore, the loop stops
    InvalidSession(String),
    LockError(LockError),
    GameError(GameError),
}

impl fmt::Display for TapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapperError::InvalidSession(reason) => write!(f, "{}", reason),
            TapperError::LockError(error) => write!(f, "session lock error: {:?}", error),
            TapperError::GameError(error) => write!(f, "game client error: {:?}", error),
        }
    }
}

pub type TapperResult<T> = Result<T, TapperError>;

/// How a single pass of the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    ProxyUnreachable,
    LoginFailed,
    /// No referrals, boost window still running or boosts used up
    BoostNotAvailable,
    BoostFailed,
    Boosted { cooldown: Duration },
}

impl CycleOutcome {
    /// Time to wait before the next pass
    pub fn sleep(&self) -> Duration {
        match self {
            CycleOutcome::ProxyUnreachable => PROXY_FAILURE_SLEEP,
            CycleOutcome::LoginFailed => LOGIN_FAILURE_SLEEP,
            CycleOutcome::BoostNotAvailable | CycleOutcome::BoostFailed => {
                Duration::from_secs(BOOST_WINDOW_SECONDS as u64)
            }
            CycleOutcome::Boosted { cooldown } => *cooldown,
        }
    }
}

/// Age tracking of the auth token
#[derive(Debug, Clone, Copy)]
pub struct TokenClock {
    created: Option<Instant>,
    live_time: Duration,
}

impl TokenClock {
    pub fn new(live_time: Duration) -> Self {
        Self {
            created: None,
            live_time,
        }
    }

    /// Clock with a lifetime drawn from 3500..3600 seconds
    pub fn random() -> Self {
        Self::new(Duration::from_secs(
            rand::rng().random_range(TOKEN_LIVE_TIME_SECONDS),
        ))
    }

    #[cfg(test)]
    pub fn live_time(&self) -> Duration {
        self.live_time
    }

    pub fn needs_refresh(&self, now: Instant) -> bool {
        match self.created {
            Some(created) => now.saturating_duration_since(created) >= self.live_time,
            None => true,
        }
    }

    pub fn mark_refreshed(&mut self, now: Instant) {
        self.created = Some(now);
    }
}

/// The hour after a boost, during which up to 1000 taps count
#[derive(Debug, Clone, Copy)]
pub struct BoostWindow {
    elapsed: i64,
}

impl BoostWindow {
    /// Window of a boost granted right now
    pub fn opened() -> Self {
        Self { elapsed: 0 }
    }

    /// Time until the next boost may be requested
    pub fn remaining(&self) -> Duration {
        Duration::from_secs((BOOST_WINDOW_SECONDS - self.elapsed).max(0) as u64)
    }
}

/// Number of taps for the next batch, never more than what is left
pub fn next_batch(submitted: u64) -> u64 {
    let remaining = BOOST_TAP_GOAL.saturating_sub(submitted);
    rand::rng().random_range(TAP_BATCH).min(remaining)
}

#[derive(Debug, Clone)]
pub struct TapperOptions {
    pub ref_id: String,
    /// Random delay range, in seconds, before the first pass
    pub start_delay: Option<(u64, u64)>,
}

impl TapperOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ref_id: settings.ref_id.clone(),
            start_delay: settings
                .use_random_delay_in_run
                .then_some(settings.random_delay_in_run),
        }
    }
}

/// State machine playing the game for one session
pub struct Tapper<B: WebAppBridge> {
    session: Session,
    options: TapperOptions,
    bridge: B,
    connector: Box<dyn GameConnector>,
    lock: SessionLock,
    webview_target: Option<WebViewTarget>,
    token: Option<String>,
    token_clock: TokenClock,
}

impl<B: WebAppBridge> Tapper<B> {
    /// Create new `Tapper` instance
    pub fn new(
        session: Session,
        options: TapperOptions,
        bridge: B,
        connector: Box<dyn GameConnector>,
        lock: SessionLock,
    ) -> Self {
        Self {
            session,
            options,
            bridge,
            connector,
            lock,
            webview_target: None,
            token: None,
            token_clock: TokenClock::random(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session.name
    }

    /// Release the session lock if still held
    pub fn release_lock(&mut self) -> bool {
        self.lock.release()
    }

    fn log_message(&self, message: impl fmt::Display) -> String {
        format!("{} | {}", self.session.name, message)
    }

    fn pick_ref_id(&self) -> String {
        if rand::rng().random_bool(REF_ID_PROBABILITY) {
            self.options.ref_id.clone()
        } else {
            FALLBACK_REF_ID.to_string()
        }
    }

    async fn flood_wait(&self, seconds: u32) {
        warn!("{}", self.log_message(format!("FloodWait {}s", seconds)));
        info!("{}", self.log_message(format!("Sleep {}s", seconds)));
        sleep(Duration::from_secs(u64::from(seconds)) + FLOOD_WAIT_BUFFER).await;
    }

    /// Get a fresh auth token while holding the session lock
    pub async fn acquire_token(&mut self) -> TapperResult<String> {
        self.lock.acquire().await.map_err(TapperError::LockError)?;

        let result = self.request_token().await;

        self.bridge.disconnect().await;
        self.lock.release();

        result
    }

    async fn request_token(&mut self) -> TapperResult<String> {
        let target = match self.webview_target.clone() {
            Some(target) => target,
            None => loop {
                match self.bridge.resolve_bot().await {
                    Ok(target) => {
                        self.webview_target = Some(target.clone());
                        break target;
                    }
                    Err(BridgeError::FloodWait(seconds)) => self.flood_wait(seconds).await,
                    Err(error) => {
                        return Err(TapperError::InvalidSession(format!(
                            "Failed to resolve bot: {:?}",
                            error
                        )))
                    }
                }
            },
        };

        let ref_id = self.pick_ref_id();

        let url = loop {
            match self.bridge.request_web_view(&target, &ref_id).await {
                Ok(url) => break url,
                Err(BridgeError::FloodWait(seconds)) => self.flood_wait(seconds).await,
                Err(error) => {
                    return Err(TapperError::InvalidSession(format!(
                        "Failed to get webview URL: {:?}",
                        error
                    )))
                }
            }
        };

        let init_data = InitData::from_web_view_url(&url).map_err(|error| {
            TapperError::InvalidSession(format!("Failed to parse webview URL: {:?}", error))
        })?;

        Ok(init_data.to_token())
    }

    async fn refresh_token_if_needed(&mut self) -> TapperResult<String> {
        if let Some(token) = &self.token {
            if !self.token_clock.needs_refresh(Instant::now()) {
                return Ok(token.clone());
            }
        }

        let token = self.acquire_token().await?;
        self.token_clock.mark_refreshed(Instant::now());
        self.token = Some(token.clone());

        Ok(token)
    }

    /// One pass: proxy check, token, login, tap and boost
    pub async fn cycle(&mut self, api: &dyn GameApi) -> TapperResult<CycleOutcome> {
        if !api.check_proxy().await {
            warn!(
                "{}",
                self.log_message("Failed to connect to proxy server. Sleep 5 minutes.")
            );
            return Ok(CycleOutcome::ProxyUnreachable);
        }

        let token = self.refresh_token_if_needed().await?;

        let login = match api.login(&token).await {
            Some(login) if login.ok => login,
            _ => {
                info!("{}", self.log_message("Login failed"));
                return Ok(CycleOutcome::LoginFailed);
            }
        };
        sleep(POST_LOGIN_PAUSE).await;

        let mut rocket = login.rocket();
        let mut user = login.user();
        info!("{}", self.log_message("Logged in successfully"));

        if let Some(tap) = api.tap_red_button(&token).await {
            if tap.ok {
                rocket = tap.rocket();
                user = tap.user();
            }
        }

        let now = Utc::now().timestamp();
        let time_since_last_boost = now.saturating_sub(rocket.last_boost_timestamp).max(0);
        let speed = speed_calc(user.referrals_count, time_since_last_boost, now);
        info!(
            "{}",
            self.log_message(format!(
                "Name: {} | Points: {} | Speed: {}% ({})",
                user.name.as_deref().unwrap_or("-"),
                rocket.distance as i64,
                speed.percent,
                speed.interval
            ))
        );

        if user.referrals_count < 1 {
            return Ok(CycleOutcome::BoostNotAvailable);
        }

        let minutes_left = (BOOST_WINDOW_SECONDS - time_since_last_boost) as f64 / 60.0;
        info!(
            "{}",
            self.log_message(format!(
                "You have {} boosts. Next boost in {} minutes",
                MAX_BOOST_ATTEMPTS.saturating_sub(rocket.boost_attempts),
                if minutes_left > 0.0 {
                    format!("{:.2}", minutes_left)
                } else {
                    "~".to_string()
                }
            ))
        );

        if time_since_last_boost < BOOST_WINDOW_SECONDS
            || rocket.boost_attempts >= MAX_BOOST_ATTEMPTS
        {
            return Ok(CycleOutcome::BoostNotAvailable);
        }

        let boost = match api.boost(&token).await {
            Some(boost) => boost,
            None => return Ok(CycleOutcome::BoostFailed),
        };

        // The window restarts at zero, so the cooldown below is always a full hour
        let window = BoostWindow::opened();
        info!("{}", self.log_message("Boosted successfully"));
        sleep(BOOST_SETTLE).await;

        self.boost_burst(api, &token, boost.rocket().boost_taps).await;

        Ok(CycleOutcome::Boosted {
            cooldown: window.remaining(),
        })
    }

    /// Submit taps in small batches until the boost window holds 1000
    async fn boost_burst(&self, api: &dyn GameApi, token: &str, already_tapped: u64) -> u64 {
        let mut all_tap_count = already_tapped.min(BOOST_TAP_GOAL);

        while all_tap_count < BOOST_TAP_GOAL {
            let tap_count = next_batch(all_tap_count);
            all_tap_count += tap_count;

            if let Some(taps) = api.tap(token, tap_count).await {
                info!(
                    "{}",
                    self.log_message(format!(
                        "Tapped {} / {} | Distance: {}",
                        all_tap_count,
                        BOOST_TAP_GOAL,
                        taps.rocket().distance as i64
                    ))
                );
                let jitter = rand::rng().random_range(TAP_JITTER_SECONDS);
                sleep(Duration::from_secs(jitter)).await;
            }
        }

        all_tap_count
    }

    /// Run one pass with a fresh client and sleep accordingly, returns the time slept
    pub async fn step(&mut self) -> TapperResult<Duration> {
        let outcome = match self.connector.connect(&self.session) {
            Ok(api) => self.cycle(api.as_ref()).await,
            Err(error) => Err(TapperError::GameError(error)),
        };

        match outcome {
            Ok(outcome) => {
                let duration = outcome.sleep();
                info!(
                    "{}",
                    self.log_message(format!("Sleep {}s", duration.as_secs()))
                );
                sleep(duration).await;
                Ok(duration)
            }
            Err(error @ TapperError::InvalidSession(_)) => Err(error),
            Err(error) => {
                error!("{}", self.log_message(format!("Unknown error: {}", error)));
                sleep(UNKNOWN_ERROR_PAUSE).await;
                info!(
                    "{}",
                    self.log_message(format!("Sleep {}s", UNKNOWN_ERROR_SLEEP.as_secs()))
                );
                sleep(UNKNOWN_ERROR_SLEEP).await;
                Ok(UNKNOWN_ERROR_PAUSE + UNKNOWN_ERROR_SLEEP)
            }
        }
    }

    /// Play until the session becomes invalid
    pub async fn run(&mut self) -> TapperResult<()> {
        if let Some((min, max)) = self.options.start_delay {
            let delay = rand::rng().random_range(min..=max);
            info!("{}", self.log_message(format!("Bot will start in {}s", delay)));
            sleep(Duration::from_secs(delay)).await;
        }

        loop {
            self.step().await?;
        }
    }
}

/// Run `tapper` to the end, then release its lock
pub async fn run_tapper<B: WebAppBridge>(mut tapper: Tapper<B>) {
    if let Err(error) = tapper.run().await {
        error!("{} | Invalid Session: {}", tapper.session_name(), error);
    }

    tapper.release_lock();
}

#[cfg(test)]
mod tests;
