use crate::authz::AuthzMode;
use crate::errors::AppError;
use crate::jwt::JwtConfig;

/// Runtime configuration, read from the environment (after `.env` loading).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt: JwtConfig,
    pub authz_mode: AuthzMode,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8000);

        let authz_mode = std::env::var("AUTHZ_MODE")
            .map(|value| AuthzMode::parse(&value))
            .unwrap_or_default();

        Ok(Self {
            port,
            jwt: JwtConfig::from_env()?,
            authz_mode,
        })
    }

    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            port: 8000,
            jwt,
            authz_mode: AuthzMode::default(),
        }
    }

    pub fn with_authz_mode(mut self, mode: AuthzMode) -> Self {
        self.authz_mode = mode;
        self
    }
}
