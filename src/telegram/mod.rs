use async_trait::async_trait;

#[cfg(any(feature = "captured-url", test))]
mod captured;
#[cfg(all(feature = "mtproto", not(feature = "captured-url")))]
mod mtproto;

#[cfg(feature = "captured-url")]
pub use captured::CapturedUrlBridge;
#[cfg(all(feature = "mtproto", not(feature = "captured-url")))]
pub use mtproto::MtprotoBridge;

/// Username of the game bot
pub const BOT_USERNAME: &str = "HorizonLaunch_bot";
/// Short name of the bot's web app
pub const APP_SHORT_NAME: &str = "HorizonLaunch";

#[derive(Debug)]
pub enum BridgeError {
    /// Telegram asked to wait this many seconds before retrying
    FloodWait(u32),
    NotAuthorized,
    BotNotFound,
    #[cfg(any(feature = "captured-url", test))]
    MissingWebAppUrl,
    Rpc(String),
    IoError(std::io::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Resolved identity of the game bot, cached for the session lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebViewTarget {
    pub bot_id: i64,
    pub access_hash: i64,
}

/// Access to the Telegram account behind a session, enough to open the game web app
#[async_trait]
pub trait WebAppBridge: Send + Sync {
    /// Resolve `BOT_USERNAME`
    async fn resolve_bot(&mut self) -> BridgeResult<WebViewTarget>;

    /// Ask Telegram for the web app launch URL with `start_param` as referral
    async fn request_web_view(
        &mut self,
        target: &WebViewTarget,
        start_param: &str,
    ) -> BridgeResult<String>;

    /// Drop any open connection
    async fn disconnect(&mut self) {}
}
