use anyhow::{Context, Result};
use chrono::Utc;
use contracts::system::auth::TokenClaims;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde_json::json;

use crate::shared::data::db::get_store;

const ACCESS_TOKEN_LIFETIME_HOURS: i64 = 24; // 24 hours for long lifetime
const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 90; // 90 days

const SETTINGS_COLLECTION: &str = "sys_settings";
const JWT_SECRET_KEY: &str = "jwt_secret";

/// Generate JWT access token with 24 hours lifetime
pub async fn generate_access_token(user_id: &str, username: &str, is_admin: bool) -> Result<String> {
    let now = Utc::now();
    let exp = (now + chrono::Duration::hours(ACCESS_TOKEN_LIFETIME_HOURS)).timestamp() as usize;
    let iat = now.timestamp() as usize;

    let claims = TokenClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        is_admin,
        exp,
        iat,
    };

    let secret = get_jwt_secret().await?;
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT token")?;

    Ok(token)
}

/// Validate JWT token and extract claims
pub async fn validate_token(token: &str) -> Result<TokenClaims> {
    let secret = get_jwt_secret().await?;

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT token")?;

    Ok(token_data.claims)
}

/// Generate refresh token (UUID-based)
pub fn generate_refresh_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Get or create JWT secret from the settings collection
pub async fn get_jwt_secret() -> Result<String> {
    match get_jwt_secret_from_store().await {
        Ok(Some(secret)) => Ok(secret),
        Ok(None) | Err(_) => {
            // Generate new secret and persist it
            let secret = generate_jwt_secret();
            let _ = save_jwt_secret_to_store(&secret).await;
            Ok(secret)
        }
    }
}

/// Generate a cryptographically secure JWT secret (256 bits)
fn generate_jwt_secret() -> String {
    use base64::{engine::general_purpose, Engine as _};
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen::<u8>()).collect();
    general_purpose::STANDARD.encode(&random_bytes)
}

/// Get JWT secret from the sys_settings collection
async fn get_jwt_secret_from_store() -> Result<Option<String>> {
    let doc = get_store().get(SETTINGS_COLLECTION, JWT_SECRET_KEY).await?;

    Ok(doc
        .as_ref()
        .and_then(|d| d.get("value"))
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

/// Save JWT secret to the sys_settings collection
async fn save_jwt_secret_to_store(secret: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    get_store()
        .set(
            SETTINGS_COLLECTION,
            JWT_SECRET_KEY,
            json!({
                "key": JWT_SECRET_KEY,
                "value": secret,
                "description": "Auto-generated JWT secret for authentication",
                "created_at": now,
                "updated_at": now,
            }),
        )
        .await?;

    Ok(())
}

/// Calculate refresh token expiration timestamp
pub fn calculate_refresh_token_expiration() -> String {
    let exp = Utc::now() + chrono::Duration::days(REFRESH_TOKEN_LIFETIME_DAYS);
    exp.to_rfc3339()
}
