use std::path::PathBuf;

use async_trait::async_trait;
use grammers_client::{Client, Config, InitParams, InvocationError};
use grammers_session::Session;
use grammers_tl_types as tl;
use log::{trace, warn};

use super::{BridgeError, BridgeResult, WebAppBridge, WebViewTarget, APP_SHORT_NAME, BOT_USERNAME};
use crate::session::{proxy::ProxyScheme, Proxy};

const PLATFORM: &str = "android";

/// Bridge talking MTProto with the account stored in a Telegram session file
pub struct MtprotoBridge {
    session_file: PathBuf,
    api_id: i32,
    api_hash: String,
    proxy: Option<Proxy>,
    client: Option<Client>,
}

impl MtprotoBridge {
    pub fn new(
        session_file: PathBuf,
        api_id: i32,
        api_hash: String,
        proxy: Option<Proxy>,
    ) -> Self {
        Self {
            session_file,
            api_id,
            api_hash,
            proxy,
            client: None,
        }
    }

    /// Connect on first use and make sure the account is logged in
    async fn client(&mut self) -> BridgeResult<&Client> {
        if self.client.is_none() {
            let session =
                Session::load_file_or_create(&self.session_file).map_err(BridgeError::IoError)?;

            let proxy_url = self.proxy.as_ref().and_then(telegram_proxy_url);
            if let (Some(proxy), None) = (&self.proxy, &proxy_url) {
                warn!(
                    "Proxy {} cannot carry MTProto, {:?} connects directly",
                    proxy, self.session_file
                );
            }

            trace!("Connecting to Telegram with {:?}", self.session_file);

            let client = Client::connect(Config {
                session,
                api_id: self.api_id,
                api_hash: self.api_hash.clone(),
                params: InitParams {
                    proxy_url,
                    ..Default::default()
                },
            })
            .await
            .map_err(|error| BridgeError::Rpc(format!("{:?}", error)))?;

            if !client.is_authorized().await.map_err(invocation_error)? {
                return Err(BridgeError::NotAuthorized);
            }

            self.client = Some(client);
        }

        self.client.as_ref().ok_or(BridgeError::NotAuthorized)
    }
}

/// Only socks5 proxies can be handed to the MTProto transport
fn telegram_proxy_url(proxy: &Proxy) -> Option<String> {
    match proxy.scheme {
        ProxyScheme::Socks5 => Some(proxy.to_url()),
        ProxyScheme::Http | ProxyScheme::Https => None,
    }
}

fn invocation_error(error: InvocationError) -> BridgeError {
    match error {
        InvocationError::Rpc(rpc) if rpc.name == "FLOOD_WAIT" => {
            BridgeError::FloodWait(rpc.value.unwrap_or(0))
        }
        other => BridgeError::Rpc(format!("{:?}", other)),
    }
}

#[async_trait]
impl WebAppBridge for MtprotoBridge {
    async fn resolve_bot(&mut self) -> BridgeResult<WebViewTarget> {
        let chat = self
            .client()
            .await?
            .resolve_username(BOT_USERNAME)
            .await
            .map_err(invocation_error)?
            .ok_or(BridgeError::BotNotFound)?;

        let packed = chat.pack();

        Ok(WebViewTarget {
            bot_id: packed.id,
            access_hash: packed.access_hash.unwrap_or(0),
        })
    }

    async fn request_web_view(
        &mut self,
        target: &WebViewTarget,
        start_param: &str,
    ) -> BridgeResult<String> {
        let request = tl::functions::messages::RequestAppWebView {
            write_allowed: true,
            compact: false,
            peer: tl::types::InputPeerUser {
                user_id: target.bot_id,
                access_hash: target.access_hash,
            }
            .into(),
            app: tl::types::InputBotAppShortName {
                bot_id: tl::types::InputUser {
                    user_id: target.bot_id,
                    access_hash: target.access_hash,
                }
                .into(),
                short_name: APP_SHORT_NAME.to_string(),
            }
            .into(),
            start_param: Some(start_param.to_string()),
            theme_params: None,
            platform: PLATFORM.to_string(),
        };

        let result = self
            .client()
            .await?
            .invoke(&request)
            .await
            .map_err(invocation_error)?;

        match result {
            tl::enums::WebViewResult::Url(web_view) => Ok(web_view.url),
        }
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(error) = client.session().save_to_file(&self.session_file) {
                warn!("Cannot save {:?}: {:?}", self.session_file, error);
            }
        }
    }
}
