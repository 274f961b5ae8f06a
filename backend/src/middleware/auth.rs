//! Authentication middleware
//!
//! Decodes the bearer token into the caller's actor context and gates
//! order actions by role

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{ActorRole, Order, OrderAction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: ActorRole,
    /// Client company the user orders for
    pub client_id: Option<Uuid>,
    /// Store the user works at
    pub store_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Check the role column of the transition table
    pub fn can(&self, action: OrderAction) -> bool {
        action.permits(self.role)
    }

    /// Whether the user may see or act on this order at all
    pub fn can_access_order(&self, order: &Order) -> bool {
        match self.role {
            ActorRole::Admin | ActorRole::Delivery => true,
            ActorRole::Client => self.client_id == Some(order.client_id),
            ActorRole::Store => self.store_id == Some(order.store_id),
        }
    }

    /// Whether the user may read or write stock of this store
    pub fn can_access_store(&self, store_id: Uuid) -> bool {
        match self.role {
            ActorRole::Admin => true,
            ActorRole::Store => self.store_id == Some(store_id),
            ActorRole::Client | ActorRole::Delivery => false,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &AuthUser, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.user_id.to_string(),
            role: user.role.as_str().to_string(),
            client_id: user.client_id.map(|id| id.to_string()),
            store_id: user.store_id.map(|id| id.to_string()),
            exp: now + ttl_seconds,
            iat: now,
        }
    }

    fn into_auth_user(self) -> AppResult<AuthUser> {
        let parse = |value: &str, what: &str| {
            Uuid::parse_str(value).map_err(|_| unauthorized(&format!("Invalid {} in token", what)))
        };

        Ok(AuthUser {
            user_id: parse(&self.sub, "user ID")?,
            role: ActorRole::from_str(&self.role).ok_or_else(|| unauthorized("Invalid role in token"))?,
            client_id: self.client_id.as_deref().map(|id| parse(id, "client ID")).transpose()?,
            store_id: self.store_id.as_deref().map(|id| parse(id, "store ID")).transpose()?,
        })
    }
}

/// Sign claims with the configured secret
pub fn encode_jwt(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

fn unauthorized(message: &str) -> AppError {
    AppError::Unauthorized {
        message: message.to_string(),
        message_fr: "Non autorisé".to_string(),
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return unauthorized("Missing or invalid Authorization header").into_response(),
    };

    let auth_user = match decode_jwt(token, &state.config.jwt.secret).and_then(Claims::into_auth_user) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    tracing::debug!(user_id = %auth_user.user_id, role = %auth_user.role, "Authenticated request");
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_fr: "Authentification requise".to_string(),
            })
    }
}

/// Role guard for order actions
pub fn require_action(user: &AuthUser, action: OrderAction) -> AppResult<()> {
    if user.can(action) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.user_id, role = %user.role, action = %action, "Action denied");
        Err(AppError::InsufficientPermissions)
    }
}

/// Scope guard for a loaded order
pub fn require_order_access(user: &AuthUser, order: &Order) -> AppResult<()> {
    if user.can_access_order(order) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

/// Scope guard for store stock
pub fn require_store_access(user: &AuthUser, store_id: Uuid) -> AppResult<()> {
    if user.can_access_store(store_id) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}
