use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Session token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // user email at sign-in time
    pub exp: usize,    // expiration time
    pub iat: usize,    // issued at
    pub iss: String,   // issuer
    pub aud: String,   // audience
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

/// Request body for user registration. Missing fields arrive empty and are
/// reported by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for sign-in, as JSON or as a urlencoded page form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub message: &'static str,
}
