use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::StaticPrincipal;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn encode(&self, user_id: Uuid) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated caller, resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl AuthUser {
    pub fn from_headers(headers: &HeaderMap, jwt: &JwtConfig) -> Result<Self, AppError> {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = jwt.decode(token)?;

        Ok(AuthUser { user_id: claims.sub })
    }

    /// The caller as the authentication collaborator for the authz layer.
    pub fn principal(&self) -> StaticPrincipal {
        StaticPrincipal::new(self.user_id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers, &state.jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_round_trips_subject() {
        let jwt = JwtConfig::new("unit-secret", 1);
        let user_id = Uuid::new_v4();
        let token = jwt.encode(user_id).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(AuthUser::from_headers(&headers, &jwt).unwrap().user_id, user_id);
    }

    #[test]
    fn foreign_secret_and_missing_header_are_rejected() {
        let token = JwtConfig::new("one", 1).encode(Uuid::new_v4()).unwrap();
        assert!(matches!(JwtConfig::new("two", 1).decode(&token), Err(AppError::Token(_))));

        let jwt = JwtConfig::new("one", 1);
        assert!(matches!(
            AuthUser::from_headers(&HeaderMap::new(), &jwt),
            Err(AppError::Unauthorized(_))
        ));
    }
}
