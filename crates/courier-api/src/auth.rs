use axum::{Json, extract::State};
use jsonwebtoken::{EncodingKey, Header, encode};

use courier_db::StoreError;
use courier_types::api::{Claims, LoginRequest, LoginResponse};

use crate::{ApiError, ApiResult, AppState};

/// Identity issuance is deliberately thin: a nickname is exchanged for a
/// signed token, and that token's subject is the author identity every
/// write path consumes. No password, no account store.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let nickname = req.nickname.trim();
    if nickname.is_empty() {
        return Err(StoreError::InvalidInput("nickname required".into()).into());
    }

    let token = create_token(&state.jwt_secret, nickname)?;

    Ok(Json(LoginResponse {
        ok: true,
        token,
        user: nickname.to_string(),
    }))
}

pub fn create_token(secret: &str, user: &str) -> Result<String, ApiError> {
    let exp = (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize;
    let claims = Claims {
        sub: user.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}
