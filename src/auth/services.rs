pub(crate) use crate::auth::dto::{Claims, JwtKeys};
use crate::auth::repo_types::User;
use crate::config::{JwtConfig, MAX_JWT_TTL_MINUTES};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_token";
pub const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_minutes.clamp(1, MAX_JWT_TTL_MINUTES) as u64 * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Pure check of signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Validates and stores a new account. Returns the created user.
pub async fn register(state: &AppState, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);

    let mut fields = FieldErrors::new();
    if !is_valid_email(&email) {
        fields.insert("email", "Invalid email address".into());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        fields.insert(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        );
    }
    if !fields.is_empty() {
        warn!(email = %email, "registration rejected by validation");
        return Err(AppError::Validation(fields));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let hash = hash_password(password)?;

    let user = state
        .users
        .create(&email, &hash)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "email registered concurrently");
            AppError::Conflict("Email already exists".into())
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials and mints a session token. Unknown email and wrong
/// password fail with the same error.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> AppResult<(String, User)> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "sign-in unknown email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in invalid password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, "user signed in");
    Ok((token, user))
}

pub(crate) fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Bearer header first, then the session cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    bearer.or_else(|| get_cookie(headers, SESSION_COOKIE))
}

pub(crate) fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub(crate) fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

/// Extracts and verifies the session token, returning the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Missing session token"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser(claims.sub))
    }
}
