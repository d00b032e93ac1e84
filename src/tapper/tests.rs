use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use super::*;
use crate::{
    game::{GameResponse, GameResult, RocketState, UserState},
    session::SessionConfig,
    telegram::BridgeResult,
};

#[derive(Debug, Default)]
struct BridgeLog {
    resolves: usize,
    start_params: Vec<String>,
}

struct MockBridge {
    log: Arc<Mutex<BridgeLog>>,
    floods: Vec<u32>,
    url: Option<String>,
}

impl MockBridge {
    fn new(url: Option<String>) -> Self {
        Self {
            log: Arc::new(Mutex::new(BridgeLog::default())),
            floods: Vec::new(),
            url,
        }
    }
}

#[async_trait]
impl WebAppBridge for MockBridge {
    async fn resolve_bot(&mut self) -> BridgeResult<WebViewTarget> {
        self.log.lock().unwrap().resolves += 1;
        Ok(WebViewTarget {
            bot_id: 1,
            access_hash: 2,
        })
    }

    async fn request_web_view(
        &mut self,
        _target: &WebViewTarget,
        start_param: &str,
    ) -> BridgeResult<String> {
        if let Some(seconds) = self.floods.pop() {
            return Err(BridgeError::FloodWait(seconds));
        }
        self.log
            .lock()
            .unwrap()
            .start_params
            .push(start_param.to_string());
        self.url.clone().ok_or(BridgeError::MissingWebAppUrl)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    CheckProxy,
    Login,
    TapRedButton,
    Boost,
    Taps(u64),
}

#[derive(Clone)]
struct MockGame {
    calls: Arc<Mutex<Vec<Call>>>,
    proxy_ok: bool,
    login: Option<GameResponse>,
    tap: Option<GameResponse>,
    boost: Option<GameResponse>,
    taps: Option<GameResponse>,
}

impl MockGame {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            proxy_ok: true,
            login: None,
            tap: None,
            boost: None,
            taps: None,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn tap_batches(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Taps(count) => Some(count),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl GameApi for MockGame {
    async fn check_proxy(&self) -> bool {
        self.record(Call::CheckProxy);
        self.proxy_ok
    }

    async fn login(&self, _token: &str) -> Option<GameResponse> {
        self.record(Call::Login);
        self.login.clone()
    }

    async fn tap_red_button(&self, _token: &str) -> Option<GameResponse> {
        self.record(Call::TapRedButton);
        self.tap.clone()
    }

    async fn boost(&self, _token: &str) -> Option<GameResponse> {
        self.record(Call::Boost);
        self.boost.clone()
    }

    async fn tap(&self, _token: &str, count: u64) -> Option<GameResponse> {
        self.record(Call::Taps(count));
        self.taps.clone()
    }
}

struct MockConnector {
    game: MockGame,
    fail: bool,
}

impl GameConnector for MockConnector {
    fn connect(&self, _session: &Session) -> GameResult<Box<dyn GameApi>> {
        if self.fail {
            return Err(GameError::InvalidHeader("broken".to_string()));
        }
        Ok(Box::new(self.game.clone()))
    }
}

fn launch_url() -> String {
    let user = utf8_percent_encode(r#"{"id":1,"first_name":"Ann"}"#, NON_ALPHANUMERIC);
    let inner = format!(
        "user={}&chat_instance=-1&chat_type=sender&start_param=111&auth_date=1725000000&hash=ff",
        user
    );
    format!(
        "https://eventhorizongame.xyz/#tgWebAppData={}&tgWebAppVersion=7.10",
        utf8_percent_encode(&inner, NON_ALPHANUMERIC)
    )
}

fn temp_config_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("horizon-tapper-loop-{}", rand::random::<u64>()))
        .join("accounts_config.json")
}

fn response(
    ok: bool,
    referrals: u64,
    boost_ago: i64,
    attempts: u64,
    boost_taps: u64,
) -> GameResponse {
    GameResponse {
        ok,
        rocket: Some(RocketState {
            distance: 5000.0,
            boost_attempts: attempts,
            last_boost_timestamp: Utc::now().timestamp() - boost_ago,
            boost_taps,
        }),
        user: Some(UserState {
            referrals_count: referrals,
            name: Some("Ann".to_string()),
        }),
    }
}

fn tapper_with(
    bridge: MockBridge,
    game: MockGame,
    fail_connect: bool,
    config_path: &PathBuf,
) -> Tapper<MockBridge> {
    let session = Session {
        name: "alice".to_string(),
        proxy: None,
        user_agent: "agent".to_string(),
        config: SessionConfig::default(),
    };
    let mut tapper = Tapper::new(
        session,
        TapperOptions {
            ref_id: "111".to_string(),
            start_delay: None,
        },
        bridge,
        Box::new(MockConnector {
            game,
            fail: fail_connect,
        }),
        SessionLock::new(config_path, "alice"),
    );
    tapper.token_clock = TokenClock::new(Duration::from_secs(3550));
    tapper
}

fn tapper(bridge: MockBridge, game: MockGame) -> Tapper<MockBridge> {
    tapper_with(bridge, game, false, &temp_config_path())
}

#[test]
fn outcome_sleeps() {
    assert_eq!(CycleOutcome::ProxyUnreachable.sleep(), Duration::from_secs(300));
    assert_eq!(CycleOutcome::LoginFailed.sleep(), Duration::from_secs(1800));
    assert_eq!(CycleOutcome::BoostFailed.sleep(), Duration::from_secs(3600));
    assert_eq!(CycleOutcome::BoostNotAvailable.sleep(), Duration::from_secs(3600));
    assert_eq!(
        CycleOutcome::Boosted {
            cooldown: Duration::from_secs(12)
        }
        .sleep(),
        Duration::from_secs(12)
    );
}

#[test]
fn token_clock_refreshes_at_live_time() {
    let start = Instant::now();
    let mut clock = TokenClock::new(Duration::from_secs(3550));

    assert!(clock.needs_refresh(start));
    clock.mark_refreshed(start);
    assert!(!clock.needs_refresh(start + Duration::from_secs(3549)));
    assert!(clock.needs_refresh(start + Duration::from_secs(3550)));
}

#[test]
fn random_token_lifetime_stays_in_range() {
    for _ in 0..200 {
        let live_time = TokenClock::random().live_time().as_secs();
        assert!((3500..3600).contains(&live_time));
    }
}

#[test]
fn batches_never_exceed_remaining_taps() {
    assert_eq!(next_batch(1000), 0);
    for _ in 0..200 {
        assert!(next_batch(990) <= 10);
        assert!(next_batch(990) >= 1);
        assert!(TAP_BATCH.contains(&next_batch(0)));
    }
}

#[test]
fn boost_window_cooldown_is_a_full_hour_when_opened() {
    assert_eq!(BoostWindow::opened().remaining(), Duration::from_secs(3600));
    assert_eq!(
        BoostWindow { elapsed: 4000 }.remaining(),
        Duration::from_secs(0)
    );
}

#[test]
fn configured_referral_is_picked_most_of_the_time() {
    let tapper = tapper(MockBridge::new(None), MockGame::new());
    let picked = (0..4000)
        .filter(|_| tapper.pick_ref_id() == "111")
        .count();

    assert!((2900..3500).contains(&picked), "picked {}", picked);
}

#[tokio::test(start_paused = true)]
async fn proxy_failure_sleeps_without_game_calls() {
    let bridge = MockBridge::new(Some(launch_url()));
    let bridge_log = bridge.log.clone();
    let game = MockGame {
        proxy_ok: false,
        ..MockGame::new()
    };
    let mut tapper = tapper(bridge, game.clone());

    assert_eq!(tapper.step().await.unwrap(), Duration::from_secs(300));
    assert_eq!(game.calls(), vec![Call::CheckProxy]);
    assert_eq!(bridge_log.lock().unwrap().start_params.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_login_sleeps_half_an_hour() {
    for login in [None, Some(response(false, 5, 7200, 0, 0))] {
        let game = MockGame {
            login,
            ..MockGame::new()
        };
        let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

        assert_eq!(tapper.step().await.unwrap(), Duration::from_secs(1800));
        assert_eq!(game.calls(), vec![Call::CheckProxy, Call::Login]);
    }
}

#[tokio::test(start_paused = true)]
async fn token_is_reused_until_its_lifetime_ends() {
    let bridge = MockBridge::new(Some(launch_url()));
    let bridge_log = bridge.log.clone();
    let mut tapper = tapper(bridge, MockGame::new());

    tapper.step().await.unwrap();
    assert_eq!(bridge_log.lock().unwrap().start_params.len(), 1);

    // 1800 s later, still inside the lifetime
    tapper.step().await.unwrap();
    assert_eq!(bridge_log.lock().unwrap().start_params.len(), 1);

    // 3600 s later, past it
    tapper.step().await.unwrap();
    let log = bridge_log.lock().unwrap();
    assert_eq!(log.start_params.len(), 2);
    assert_eq!(log.resolves, 1);
}

#[tokio::test(start_paused = true)]
async fn token_is_reassembled_from_the_launch_url() {
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), MockGame::new());

    let token = tapper.acquire_token().await.unwrap();

    assert_eq!(
        token,
        "user=%7B%22id%22%3A1%2C%22first_name%22%3A%22Ann%22%7D&chat_instance=-1\
         &chat_type=sender&start_param=111&auth_date=1725000000&hash=ff"
    );
    assert!(!tapper.lock.is_held());
}

#[tokio::test(start_paused = true)]
async fn flood_wait_is_retried_after_the_requested_delay() {
    let mut bridge = MockBridge::new(Some(launch_url()));
    bridge.floods = vec![5, 7];
    let mut tapper = tapper(bridge, MockGame::new());

    let started = Instant::now();
    assert!(tapper.acquire_token().await.is_ok());
    assert!(started.elapsed() >= Duration::from_secs(5 + 3 + 7 + 3));
}

#[tokio::test(start_paused = true)]
async fn missing_web_view_invalidates_the_session() {
    let mut tapper = tapper(MockBridge::new(None), MockGame::new());

    assert!(matches!(
        tapper.step().await,
        Err(TapperError::InvalidSession(_))
    ));
    assert!(!tapper.lock.is_held());
}

#[tokio::test(start_paused = true)]
async fn malformed_web_view_invalidates_the_session() {
    let url = "https://eventhorizongame.xyz/#tgWebAppData=user%3D1&tgWebAppVersion=7.10";
    let mut tapper = tapper(MockBridge::new(Some(url.to_string())), MockGame::new());

    assert!(matches!(
        tapper.acquire_token().await,
        Err(TapperError::InvalidSession(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn unknown_errors_cool_down_for_twenty_minutes() {
    let mut tapper = tapper_with(
        MockBridge::new(Some(launch_url())),
        MockGame::new(),
        true,
        &temp_config_path(),
    );

    assert_eq!(tapper.step().await.unwrap(), Duration::from_secs(1203));
}

#[tokio::test(start_paused = true)]
async fn without_referrals_no_boost_is_tried() {
    let game = MockGame {
        login: Some(response(true, 0, 7200, 0, 0)),
        tap: Some(response(true, 0, 7200, 0, 0)),
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    assert_eq!(
        tapper.cycle(&game).await.unwrap(),
        CycleOutcome::BoostNotAvailable
    );
    assert_eq!(
        game.calls(),
        vec![Call::CheckProxy, Call::Login, Call::TapRedButton]
    );
}

#[tokio::test(start_paused = true)]
async fn tap_state_supersedes_login_state() {
    let game = MockGame {
        login: Some(response(true, 0, 7200, 0, 0)),
        tap: Some(response(true, 5, 7200, 0, 0)),
        boost: Some(response(true, 5, 0, 1, 1000)),
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    assert_eq!(
        tapper.cycle(&game).await.unwrap(),
        CycleOutcome::Boosted {
            cooldown: Duration::from_secs(3600)
        }
    );
    assert_eq!(
        game.calls(),
        vec![Call::CheckProxy, Call::Login, Call::TapRedButton, Call::Boost]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_tap_keeps_login_state() {
    let game = MockGame {
        login: Some(response(true, 5, 7200, 0, 0)),
        tap: Some(response(false, 0, 7200, 0, 0)),
        boost: None,
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    assert_eq!(tapper.cycle(&game).await.unwrap(), CycleOutcome::BoostFailed);
}

#[tokio::test(start_paused = true)]
async fn running_window_or_used_up_boosts_skip_boosting() {
    for login in [response(true, 5, 600, 0, 0), response(true, 5, 7200, 6, 0)] {
        let game = MockGame {
            login: Some(login),
            ..MockGame::new()
        };
        let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

        assert_eq!(
            tapper.cycle(&game).await.unwrap(),
            CycleOutcome::BoostNotAvailable
        );
        assert!(!game.calls().contains(&Call::Boost));
    }
}

#[tokio::test(start_paused = true)]
async fn boost_burst_fills_exactly_the_remaining_taps() {
    let game = MockGame {
        login: Some(response(true, 5, 7200, 2, 0)),
        boost: Some(response(true, 5, 0, 3, 900)),
        taps: Some(response(true, 5, 0, 3, 0)),
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    tapper.cycle(&game).await.unwrap();

    let batches = game.tap_batches();
    assert_eq!(batches.iter().sum::<u64>(), 100);
    assert!(batches.iter().all(|count| (1..=60).contains(count)));
}

#[tokio::test(start_paused = true)]
async fn boost_burst_ends_even_when_batches_fail() {
    let game = MockGame {
        login: Some(response(true, 5, 7200, 0, 0)),
        boost: Some(response(true, 5, 0, 1, 0)),
        taps: None,
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    let submitted = tapper.boost_burst(&game, "token", 0).await;

    assert_eq!(submitted, 1000);
    assert_eq!(game.tap_batches().iter().sum::<u64>(), 1000);
    assert!(game.tap_batches().len() >= 17);
}

#[tokio::test(start_paused = true)]
async fn boost_settles_then_jitters_after_a_successful_batch() {
    let game = MockGame {
        login: Some(response(true, 5, 7200, 0, 0)),
        boost: Some(response(true, 5, 0, 1, 970)),
        taps: Some(response(true, 5, 0, 1, 1000)),
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    let started = Instant::now();
    tapper.cycle(&game).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(game.tap_batches(), vec![30]);
    // login pause, boost settle, then one jitter of 1..=3 s
    assert!(elapsed >= Duration::from_secs(2 + 3 + 1), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_secs(2 + 3 + 3), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn failed_batches_are_not_followed_by_jitter() {
    let game = MockGame {
        login: Some(response(true, 5, 7200, 0, 0)),
        boost: Some(response(true, 5, 0, 1, 970)),
        taps: None,
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    let started = Instant::now();
    tapper.cycle(&game).await.unwrap();

    assert_eq!(game.tap_batches(), vec![30]);
    assert_eq!(started.elapsed(), Duration::from_secs(2 + 3));
}

#[tokio::test(start_paused = true)]
async fn far_past_boost_timestamp_still_allows_a_boost() {
    let mut login = response(true, 5, 0, 0, 0);
    if let Some(rocket) = login.rocket.as_mut() {
        rocket.last_boost_timestamp = i64::MIN;
    }
    let game = MockGame {
        login: Some(login),
        boost: None,
        ..MockGame::new()
    };
    let mut tapper = tapper(MockBridge::new(Some(launch_url())), game.clone());

    assert_eq!(tapper.cycle(&game).await.unwrap(), CycleOutcome::BoostFailed);
    assert!(game.calls().contains(&Call::Boost));
}

#[tokio::test(start_paused = true)]
async fn runner_releases_the_lock_on_invalid_session() {
    let config_path = temp_config_path();
    let tapper = tapper_with(MockBridge::new(None), MockGame::new(), false, &config_path);

    run_tapper(tapper).await;

    let mut other = SessionLock::new(&config_path, "alice");
    assert!(other.try_acquire().unwrap());
}
