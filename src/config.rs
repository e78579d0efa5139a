use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_TARGET_USERNAME: &str = "codeok";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_JWT_BACKDATE_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read private key from {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a verified, actionable delivery is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Approve mentioned pull requests during the request itself.
    Inline,
    /// Enqueue a job and return immediately.
    Queued,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "queued" => Ok(DispatchMode::Queued),
            other => Err(format!("expected 'inline' or 'queued', got '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub app_id: u64,
    /// Raw key material; normalized when the identity is built.
    pub private_key: String,
    pub webhook_secret: String,
    pub target_username: String,
    pub dispatch_mode: DispatchMode,
    pub api_base: String,
    pub http_timeout: Duration,
    pub jwt_backdate_secs: i64,
    pub token_cache: bool,
    pub bind_addr: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("target_username", &self.target_username)
            .field("dispatch_mode", &self.dispatch_mode)
            .field("api_base", &self.api_base)
            .field("http_timeout", &self.http_timeout)
            .field("jwt_backdate_secs", &self.jwt_backdate_secs)
            .field("token_cache", &self.token_cache)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let app_id = parse("GITHUB_APP_ID", require("GITHUB_APP_ID")?)?;

        let private_key = match (get("GITHUB_PRIVATE_KEY"), get("GITHUB_PRIVATE_KEY_PATH")) {
            (Some(inline), _) => inline,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::KeyFile { path, source })?,
            (None, None) => return Err(ConfigError::Missing("GITHUB_PRIVATE_KEY")),
        };

        let jwt_backdate_secs = match get("JWT_BACKDATE_SECS") {
            Some(v) => parse("JWT_BACKDATE_SECS", v)?,
            None => DEFAULT_JWT_BACKDATE_SECS,
        };
        if !(0..=60).contains(&jwt_backdate_secs) {
            return Err(ConfigError::Invalid {
                name: "JWT_BACKDATE_SECS",
                value: jwt_backdate_secs.to_string(),
                reason: "must be between 0 and 60".into(),
            });
        }

        let http_timeout_secs: u64 = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => parse("HTTP_TIMEOUT_SECS", v)?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                value: http_timeout_secs.to_string(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Config {
            app_id,
            private_key,
            webhook_secret: require("GITHUB_WEBHOOK_SECRET")?,
            target_username: get("TARGET_USERNAME")
                .unwrap_or_else(|| DEFAULT_TARGET_USERNAME.to_string()),
            dispatch_mode: match get("DISPATCH_MODE") {
                Some(v) => parse("DISPATCH_MODE", v)?,
                None => DispatchMode::Queued,
            },
            api_base: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_timeout: Duration::from_secs(http_timeout_secs),
            jwt_backdate_secs,
            token_cache: match get("TOKEN_CACHE") {
                Some(v) => parse_bool("TOKEN_CACHE", v)?,
                None => true,
            },
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}
