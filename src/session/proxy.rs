use std::{fmt, num::ParseIntError, str::FromStr};

#[derive(Debug)]
pub enum ProxyError {
    UnsupportedScheme(String),
    MissingHost,
    MissingPort,
    InvalidPort(ParseIntError),
    InvalidCredentials,
    ReqwestError(reqwest::Error),
}

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

impl FromStr for ProxyScheme {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyScheme::Http),
            "https" => Ok(ProxyScheme::Https),
            "socks5" | "socks5h" | "socks" => Ok(ProxyScheme::Socks5),
            other => Err(ProxyError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// A proxy in the form `scheme://[user:pass@]host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl Proxy {
    /// Full url, credentials included
    pub fn to_url(&self) -> String {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => format!(
                "{}://{}:{}@{}:{}",
                self.scheme.as_str(),
                login,
                password,
                self.host,
                self.port
            ),
            _ => format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port),
        }
    }

    /// Convert into a proxy usable by the HTTP client
    pub fn to_reqwest(&self) -> ProxyResult<reqwest::Proxy> {
        reqwest::Proxy::all(self.to_url()).map_err(ProxyError::ReqwestError)
    }
}

impl FromStr for Proxy {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (scheme.parse::<ProxyScheme>()?, rest),
            None => (ProxyScheme::Http, s),
        };

        let (credentials, address) = match rest.rsplit_once('@') {
            Some((credentials, address)) => (Some(credentials), address),
            None => (None, rest),
        };

        let (login, password) = match credentials {
            Some(credentials) => {
                let (login, password) = credentials
                    .split_once(':')
                    .ok_or(ProxyError::InvalidCredentials)?;
                if login.is_empty() {
                    return Err(ProxyError::InvalidCredentials);
                }
                (Some(login.to_string()), Some(password.to_string()))
            }
            None => (None, None),
        };

        let address = address.trim_end_matches('/');
        let (host, port) = address.rsplit_once(':').ok_or(ProxyError::MissingPort)?;
        if host.is_empty() {
            return Err(ProxyError::MissingHost);
        }
        let port = port.parse::<u16>().map_err(ProxyError::InvalidPort)?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            login,
            password,
        })
    }
}

/// Credentials are never displayed
impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}
