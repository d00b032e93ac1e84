use async_trait::async_trait;

use super::{BridgeError, BridgeResult, WebAppBridge, WebViewTarget};

/// Bridge serving a launch URL captured beforehand from a Telegram client.
///
/// The signed payload cannot be re-requested, so `start_param` is ignored.
#[derive(Debug, Clone)]
pub struct CapturedUrlBridge {
    url: Option<String>,
}

impl CapturedUrlBridge {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }
}

#[async_trait]
impl WebAppBridge for CapturedUrlBridge {
    async fn resolve_bot(&mut self) -> BridgeResult<WebViewTarget> {
        Ok(WebViewTarget {
            bot_id: 0,
            access_hash: 0,
        })
    }

    async fn request_web_view(
        &mut self,
        _target: &WebViewTarget,
        _start_param: &str,
    ) -> BridgeResult<String> {
        self.url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or(BridgeError::MissingWebAppUrl)
    }
}
