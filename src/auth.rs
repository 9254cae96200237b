use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{SignInRequest, SignUpRequest, UserProfile};

const MIN_PASSWORD_LEN: usize = 8;

/// Profile plus the opaque bearer token issued for this session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: UserProfile,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

/// Accounts are restricted to the institutional email domain.
pub fn validate_email(email: &str, domain: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !email.to_lowercase().ends_with(&domain.to_lowercase()) {
        return Err(AppError::Validation(format!(
            "Only student emails ending in {} are allowed",
            domain
        )));
    }
    Ok(())
}

/// Salted SHA-256 digest, stored as `salt$digest` in base64.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let digest = digest_with_salt(&salt, password);
    format!("{}${}", BASE64.encode(salt), BASE64.encode(digest))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = BASE64.decode(salt) else {
        return false;
    };
    BASE64.encode(digest_with_salt(&salt, password)) == digest
}

fn digest_with_salt(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

pub async fn sign_up(state: &AppState, request: SignUpRequest) -> AppResult<AuthSession> {
    let first_name = request.first_name.as_deref().unwrap_or("").trim();
    if first_name.is_empty() {
        return Err(AppError::Validation("First name is required".to_string()));
    }
    let last_name = request.last_name.as_deref().unwrap_or("").trim();
    if last_name.is_empty() {
        return Err(AppError::Validation("Last name is required".to_string()));
    }

    let email = request.email.as_deref().unwrap_or("").trim().to_lowercase();
    validate_email(&email, &state.config.auth.email_domain)?;

    let password = request.password.as_deref().unwrap_or("");
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Validation(
            "An account with this email already exists".to_string(),
        ));
    }

    let user = UserProfile {
        id: Uuid::new_v4().to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        student_id: request.student_id.filter(|s| !s.trim().is_empty()),
        graduation_year: request.graduation_year.filter(|s| !s.trim().is_empty()),
        major: request.major.filter(|s| !s.trim().is_empty()),
        created_at: Utc::now().timestamp(),
    };
    state.db.insert_user(&user, &hash_password(password)).await?;
    tracing::info!("Created account {} for {}", user.id, user.email);

    issue_session(state, user).await
}

pub async fn sign_in(state: &AppState, request: SignInRequest) -> AppResult<AuthSession> {
    let email = request.email.as_deref().unwrap_or("").trim().to_lowercase();
    validate_email(&email, &state.config.auth.email_domain)?;

    let password = request.password.as_deref().unwrap_or("");
    let found = state.db.find_user_by_email(&email).await?;
    match found {
        Some((user, stored)) if verify_password(password, &stored) => {
            tracing::info!("User {} signed in", user.id);
            issue_session(state, user).await
        }
        _ => Err(AppError::Validation(
            "Invalid email or password".to_string(),
        )),
    }
}

async fn issue_session(state: &AppState, user: UserProfile) -> AppResult<AuthSession> {
    let token = Uuid::new_v4().to_string();
    state
        .db
        .insert_session(&token, &user.id, Utc::now().timestamp())
        .await?;
    Ok(AuthSession {
        user,
        access_token: token,
    })
}

/// Pull the opaque token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Auth gate for write endpoints: the bearer must resolve to a user.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<UserProfile> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    match state.db.user_for_token(token).await? {
        Some(user) => Ok(user),
        None => {
            tracing::warn!("Rejected request with unresolvable bearer token");
            Err(AppError::Unauthorized)
        }
    }
}

/// Auth gate for shared reads: the configured anon key is accepted in
/// place of a user token.
pub async fn require_reader(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    if !state.config.auth.anon_key.is_empty() && token == state.config.auth.anon_key {
        return Ok(());
    }
    match state.db.user_for_token(token).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn email_domain_is_enforced() {
        assert!(validate_email("jane@my.unt.edu", "@my.unt.edu").is_ok());
        assert!(validate_email("Jane@MY.UNT.EDU", "@my.unt.edu").is_ok());
        assert!(validate_email("jane@gmail.com", "@my.unt.edu").is_err());
        assert!(validate_email("", "@my.unt.edu").is_err());
        // The suffix must be the domain, not a lookalike.
        assert!(validate_email("jane@notmy.unt.edu.evil.com", "@my.unt.edu").is_err());
    }

    #[test]
    fn password_hash_round_trips() {
        let stored = hash_password("correct horse");
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
        assert!(!verify_password("correct horse", "garbage"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
