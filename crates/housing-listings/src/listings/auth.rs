//! Role resolution: HS256 bearer tokens carrying the caller's role and, for moderators,
//! their moderator id.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ModeratorId, Role};
use crate::config::AuthConfig;

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller resolved from the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
    pub moderator_id: Option<ModeratorId>,
}

impl Caller {
    /// The moderator identity behind this caller, or `Forbidden` for clients.
    pub fn moderator(&self) -> Result<ModeratorId, AuthError> {
        match (self.role, self.moderator_id) {
            (Role::Moderator, Some(id)) => Ok(id),
            _ => Err(AuthError::Forbidden),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MissingToken,
    #[error("invalid authorization token")]
    InvalidToken,
    #[error("you are not a moderator")]
    Forbidden,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

static MODERATOR_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_moderator_id() -> ModeratorId {
    ModeratorId(MODERATOR_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Signs and verifies caller tokens.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_minutes)
    }

    /// Issues a token. Moderators without an explicit id get one from a process-wide
    /// sequence; client tokens never carry one.
    pub fn issue(
        &self,
        role: Role,
        moderator_id: Option<ModeratorId>,
    ) -> Result<(String, Caller), AuthError> {
        let moderator_id = match role {
            Role::Moderator => Some(moderator_id.unwrap_or_else(next_moderator_id)),
            Role::Client => None,
        };
        let now = Utc::now().timestamp();
        let exp = Some(self.ttl_minutes)
            .filter(|minutes| *minutes > 0)
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(|seconds| now.checked_add(seconds))
            .ok_or_else(|| {
                AuthError::Signing(format!("token lifetime of {} minutes", self.ttl_minutes))
            })?;
        let claims = Claims {
            role,
            moderator_id: moderator_id.map(|id| id.0),
            exp,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))?;
        Ok((token, Caller { role, moderator_id }))
    }

    pub fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;
        let claims = data.claims;

        match (claims.role, claims.moderator_id) {
            (Role::Moderator, None) => Err(AuthError::InvalidToken),
            (Role::Moderator, Some(id)) => Ok(Caller {
                role: Role::Moderator,
                moderator_id: Some(ModeratorId(id)),
            }),
            (Role::Client, _) => Ok(Caller {
                role: Role::Client,
                moderator_id: None,
            }),
        }
    }
}

#[axum::async_trait]
impl<St> FromRequestParts<St> for Caller
where
    Arc<TokenAuthority>: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = raw
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?
            .trim();

        let authority = Arc::<TokenAuthority>::from_ref(state);
        authority.verify(token)
    }
}
