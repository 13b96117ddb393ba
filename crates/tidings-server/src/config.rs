//! Server configuration, read from `TIDINGS_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tidings_auth::AuthConfig;
use tidings_push::PushConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Only development may fall back to a per-process signing key.
    pub fn allows_ephemeral_key(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Account created at startup so the server is usable without a database.
#[derive(Clone, PartialEq, Eq)]
pub struct DemoUser {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DemoUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoUser")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl FromStr for DemoUser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(DemoUser {
                    username: username.to_owned(),
                    password: password.to_owned(),
                })
            }
            _ => Err("expected username:password".into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub environment: Environment,
    pub jwt_secret: Option<String>,
    pub demo_user: Option<DemoUser>,
    pub auth: AuthConfig,
    pub push: PushConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            environment: Environment::Development,
            jwt_secret: None,
            demo_user: None,
            auth: AuthConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset and empty variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = parse(&get, "TIDINGS_BIND")? {
            config.bind = bind;
        }
        if let Some(environment) = parse(&get, "TIDINGS_ENV")? {
            config.environment = environment;
        }
        config.jwt_secret = get("TIDINGS_JWT_SECRET");
        config.demo_user = parse(&get, "TIDINGS_DEMO_USER")?;
        config.auth.pepper = get("TIDINGS_PEPPER");

        if let Some(secs) = parse(&get, "TIDINGS_ACCESS_TTL_SECS")? {
            config.auth.access_token_lifetime_secs = secs;
        }
        if let Some(secs) = parse(&get, "TIDINGS_REFRESH_TTL_SECS")? {
            config.auth.refresh_token_lifetime_secs = secs;
        }
        if let Some(threshold) = parse(&get, "TIDINGS_LOCK_THRESHOLD")? {
            config.auth.max_failed_login_attempts = threshold;
        }
        if let Some(secs) = parse(&get, "TIDINGS_LOCK_SECS")? {
            config.auth.lockout_duration_secs = secs;
        }
        config.push.idle_timeout_secs = parse(&get, "TIDINGS_PUSH_IDLE_SECS")?;

        Ok(config)
    }
}

fn parse<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}
