use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const WEB_APP_DATA_KEY: &str = "tgWebAppData=";
const WEB_APP_VERSION_KEY: &str = "&tgWebAppVersion";

/// Field names of `tgWebAppData`, in the order Telegram sends them
pub const INIT_DATA_FIELDS: [&str; 6] = [
    "user",
    "chat_instance",
    "chat_type",
    "start_param",
    "auth_date",
    "hash",
];

/// Everything but unreserved characters and `/` gets escaped
const USER_QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    MissingWebAppData,
    FieldCount(usize),
    UnexpectedField {
        expected: &'static str,
        found: String,
    },
    MalformedField(String),
}

pub type TokenResult<T> = Result<T, TokenError>;

/// Signed launch parameters of the web app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub user: String,
    pub chat_instance: String,
    pub chat_type: String,
    pub start_param: String,
    pub auth_date: String,
    pub hash: String,
}

impl InitData {
    /// Parse the `tgWebAppData` carried by a web app launch URL
    pub fn from_web_view_url(url: &str) -> TokenResult<Self> {
        let start = url
            .find(WEB_APP_DATA_KEY)
            .ok_or(TokenError::MissingWebAppData)?
            + WEB_APP_DATA_KEY.len();
        let rest = &url[start..];
        let raw = match rest.find(WEB_APP_VERSION_KEY) {
            Some(end) => &rest[..end],
            None => rest,
        };

        if raw.is_empty() {
            return Err(TokenError::MissingWebAppData);
        }

        // The payload is encoded twice: once as a query value, once inside the fragment
        let once = percent_decode_str(raw).decode_utf8_lossy();
        let decoded = percent_decode_str(&once).decode_utf8_lossy();

        Self::from_decoded(&decoded)
    }

    fn from_decoded(decoded: &str) -> TokenResult<Self> {
        let parts: Vec<&str> = decoded.split('&').collect();
        if parts.len() != INIT_DATA_FIELDS.len() {
            return Err(TokenError::FieldCount(parts.len()));
        }

        let mut values = Vec::with_capacity(INIT_DATA_FIELDS.len());
        for (part, expected) in parts.iter().zip(INIT_DATA_FIELDS) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| TokenError::MalformedField(part.to_string()))?;
            if name != expected {
                return Err(TokenError::UnexpectedField {
                    expected,
                    found: name.to_string(),
                });
            }
            values.push(value.to_string());
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();

        Ok(Self {
            user: next(),
            chat_instance: next(),
            chat_type: next(),
            start_param: next(),
            auth_date: next(),
            hash: next(),
        })
    }

    /// Token string sent as `auth` to the game API
    pub fn to_token(&self) -> String {
        format!(
            "user={}&chat_instance={}&chat_type={}&start_param={}&auth_date={}&hash={}",
            utf8_percent_encode(&self.user, USER_QUOTE_SET),
            self.chat_instance,
            self.chat_type,
            self.start_param,
            self.auth_date,
            self.hash
        )
    }
}
