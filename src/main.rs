use std::sync::Arc;

use dotenv::dotenv;
use futures::future::join_all;
use log::{error, info};

use crate::{
    game::HttpConnector,
    session::{ConfigStore, Session, SessionLock, SharedConfigStore},
    settings::Settings,
    tapper::{run_tapper, Tapper, TapperOptions},
};

mod game;
mod session;
mod settings;
mod tapper;
mod telegram;

#[cfg(not(any(feature = "mtproto", feature = "captured-url")))]
compile_error!("enable the `mtproto` feature, or `captured-url` for the replayed launch URL");

#[cfg(all(feature = "mtproto", not(feature = "captured-url")))]
fn make_bridge(settings: &Settings, session: &Session) -> Option<telegram::MtprotoBridge> {
    let (api_id, api_hash) = match (settings.api_id, settings.api_hash.clone()) {
        (Some(api_id), Some(api_hash)) => (api_id, api_hash),
        _ => {
            error!("{} | API_ID and API_HASH are required", session.name);
            return None;
        }
    };

    Some(telegram::MtprotoBridge::new(
        settings.session_file(&session.name),
        api_id,
        api_hash,
        session.proxy.clone(),
    ))
}

#[cfg(feature = "captured-url")]
fn make_bridge(_settings: &Settings, session: &Session) -> Option<telegram::CapturedUrlBridge> {
    Some(telegram::CapturedUrlBridge::new(
        session.config.web_app_url.clone(),
    ))
}

async fn start_session(settings: Arc<Settings>, store: SharedConfigStore, session_name: String) {
    let session = match Session::load(&session_name, &store).await {
        Ok(session) => session,
        Err(error) => {
            error!("{} | Cannot load session config: {:?}", session_name, error);
            return;
        }
    };

    let bridge = match make_bridge(&settings, &session) {
        Some(bridge) => bridge,
        None => return,
    };

    let tapper = Tapper::new(
        session,
        TapperOptions::from_settings(&settings),
        bridge,
        Box::new(HttpConnector),
        SessionLock::new(&settings.config_path, &session_name),
    );

    run_tapper(tapper).await;
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    let settings = match Settings::from_env() {
        Ok(settings) => Arc::new(settings),
        Err(error) => {
            error!("Invalid settings: {:?}", error);
            return;
        }
    };

    let session_names = match settings.session_names() {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => {
            error!("No sessions found in {}", settings.sessions_path.display());
            return;
        }
        Err(error) => {
            error!("Cannot list sessions: {:?}", error);
            return;
        }
    };

    info!("Starting {} session(s)", session_names.len());

    let store: SharedConfigStore = Arc::new(ConfigStore::new(settings.config_path.clone()));

    let tasks = session_names.into_iter().map(|session_name| {
        tokio::spawn(start_session(settings.clone(), store.clone(), session_name))
    });

    tokio::select! {
        _ = join_all(tasks) => info!("All sessions stopped"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
}
