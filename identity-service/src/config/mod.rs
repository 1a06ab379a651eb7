use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::models::AssuranceLevel;
use crate::services::PasswordPolicy;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub http_request_logging: bool,
    pub request_timeout_seconds: u64,
    /// Public origin, used to build absolute return URLs.
    pub base_url: String,
    /// Absent in dev means in-memory credential and session registries.
    pub database: Option<DatabaseConfig>,
    pub token: TokenConfig,
    pub session: SessionConfig,
    pub step_up: StepUpConfig,
    pub authorization: AuthorizationConfig,
    pub otp: OtpConfig,
    pub password_policy: PasswordPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub public_key_path: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub inactivity_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct StepUpConfig {
    pub authorize_path: String,
    pub account_client_id: String,
    pub required_level: AssuranceLevel,
}

#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    pub admin_client_id: String,
    pub admin_scope: String,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub issuer: String,
}

/// Reads settings from a key lookup, with defaults that only apply outside prod.
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    is_prod: bool,
}

impl EnvReader<'_> {
    fn get_env(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match (self.lookup)(key) {
            Some(val) => Ok(val),
            None => {
                if self.is_prod {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required but not set",
                        key
                    )))
                }
            }
        }
    }

    fn parse<T>(&self, key: &str, default: Option<&str>) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get_env(key, default)?.parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
        })
    }

    /// Never required; an empty value counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, &|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(
        common: core_config::Config,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let env = EnvReader { lookup, is_prod };

        let database = match env.optional("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: env.parse("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                min_connections: env.parse("DATABASE_MIN_CONNECTIONS", Some("1"))?,
                run_migrations: env.parse("DATABASE_RUN_MIGRATIONS", Some("true"))?,
            }),
            None if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production but not set"
                )))
            }
            None => None,
        };

        let config = IdentityConfig {
            common,
            environment: environment.clone(),
            service_name: env.get_env("SERVICE_NAME", Some("identity-service"))?,
            service_version: env.get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: env.get_env("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: env.optional("OTLP_ENDPOINT"),
            http_request_logging: env.parse("HTTP_REQUEST_LOGGING", Some("true"))?,
            request_timeout_seconds: env.parse("REQUEST_TIMEOUT_SECONDS", Some("60"))?,
            base_url: env
                .get_env("BASE_URL", Some("http://localhost:8080"))?
                .trim_end_matches('/')
                .to_string(),
            database,
            token: TokenConfig {
                public_key_path: env.get_env("TOKEN_PUBLIC_KEY_PATH", Some("keys/public.pem"))?,
                issuer: env.optional("TOKEN_ISSUER"),
                audience: env.optional("TOKEN_AUDIENCE"),
            },
            session: SessionConfig {
                cookie_name: env.get_env("SESSION_COOKIE_NAME", Some("identity_session"))?,
                secure_cookie: env.parse("SESSION_SECURE_COOKIE", Some("false"))?,
                inactivity_minutes: env.parse("SESSION_INACTIVITY_MINUTES", Some("720"))?,
            },
            step_up: StepUpConfig {
                authorize_path: env.get_env("STEP_UP_AUTHORIZE_PATH", Some("/auth/authorize"))?,
                account_client_id: env
                    .get_env("STEP_UP_ACCOUNT_CLIENT_ID", Some("account-management"))?,
                required_level: env.parse(
                    "STEP_UP_REQUIRED_LEVEL",
                    Some("urn:identity:acr:pwd:otp_ifpossible"),
                )?,
            },
            authorization: AuthorizationConfig {
                admin_client_id: env.get_env("ADMIN_CLIENT_ID", Some("admin-console"))?,
                admin_scope: env.get_env("ADMIN_SCOPE", Some("identity:admin"))?,
            },
            otp: OtpConfig {
                issuer: env.get_env("OTP_ISSUER", Some("Identity"))?,
            },
            password_policy: env.parse("PASSWORD_POLICY", Some("low"))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REQUEST_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.session.inactivity_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_INACTIVITY_MINUTES must be positive"
            )));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BASE_URL must be an absolute http(s) URL"
            )));
        }

        if self.step_up.account_client_id.trim().is_empty()
            || self.authorization.admin_client_id.trim().is_empty()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Client identifiers must not be empty"
            )));
        }

        if self.authorization.admin_scope.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_SCOPE must not be empty"
            )));
        }

        if self.environment == Environment::Prod {
            if !self.session.secure_cookie {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SESSION_SECURE_COOKIE must be enabled in production"
                )));
            }

            if self.token.issuer.is_none() {
                tracing::warn!("TOKEN_ISSUER is not set; token issuer is not checked");
            }
        }

        Ok(())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
