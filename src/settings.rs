use std::{env, num::ParseIntError, path::PathBuf};

const DEFAULT_CONFIG_PATH: &str = "sessions/accounts_config.json";
const DEFAULT_SESSIONS_PATH: &str = "sessions";
const DEFAULT_RANDOM_DELAY: (u64, u64) = (5, 30);

#[derive(Debug)]
pub enum SettingsError {
    MissingVar(&'static str),
    ParseInt(&'static str, ParseIntError),
    InvalidDelayRange(String),
    IoError(std::io::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Process-wide settings, read once from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub ref_id: String,
    pub use_random_delay_in_run: bool,
    pub random_delay_in_run: (u64, u64),
    pub config_path: PathBuf,
    pub sessions_path: PathBuf,
    pub sessions: Vec<String>,
}

impl Settings {
    /// Build settings from environment variables
    pub fn from_env() -> SettingsResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> SettingsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_id = match lookup("API_ID") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i32>()
                    .map_err(|error| SettingsError::ParseInt("API_ID", error))?,
            ),
            None => None,
        };

        let ref_id = lookup("REF_ID").ok_or(SettingsError::MissingVar("REF_ID"))?;

        let use_random_delay_in_run = lookup("USE_RANDOM_DELAY_IN_RUN")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        let random_delay_in_run = match lookup("RANDOM_DELAY_IN_RUN") {
            Some(raw) => parse_range(&raw)?,
            None => DEFAULT_RANDOM_DELAY,
        };

        let sessions = lookup("SESSIONS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_id,
            api_hash: lookup("API_HASH"),
            ref_id: ref_id.trim().to_string(),
            use_random_delay_in_run,
            random_delay_in_run,
            config_path: lookup("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            sessions_path: lookup("SESSIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_PATH)),
            sessions,
        })
    }

    /// Session names to run: the explicit list, or every `*.session` file in the sessions folder
    pub fn session_names(&self) -> SettingsResult<Vec<String>> {
        if !self.sessions.is_empty() {
            return Ok(self.sessions.clone());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.sessions_path).map_err(SettingsError::IoError)? {
            let path = entry.map_err(SettingsError::IoError)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("session") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();

        Ok(names)
    }

    /// Path to the Telegram session file of `session_name`
    pub fn session_file(&self, session_name: &str) -> PathBuf {
        self.sessions_path.join(format!("{}.session", session_name))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_range(raw: &str) -> SettingsResult<(u64, u64)> {
    let cleaned = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut parts = cleaned.split(',').map(str::trim);

    let (min, max) = match (parts.next(), parts.next(), parts.next()) {
        (Some(min), Some(max), None) => (min, max),
        _ => return Err(SettingsError::InvalidDelayRange(raw.to_string())),
    };

    let min = min
        .parse::<u64>()
        .map_err(|error| SettingsError::ParseInt("RANDOM_DELAY_IN_RUN", error))?;
    let max = max
        .parse::<u64>()
        .map_err(|error| SettingsError::ParseInt("RANDOM_DELAY_IN_RUN", error))?;

    if min > max {
        return Err(SettingsError::InvalidDelayRange(raw.to_string()));
    }

    Ok((min, max))
}
