use serde::Deserialize;

/// Longest session a token may grant: one year.
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Poster bucket settings. `endpoint` is only set for S3-compatible
/// servers (MinIO); AWS itself is reached through the default resolver.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub s3: S3Config,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "movieshelf".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "movieshelf-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .map(|v| v.min(MAX_JWT_TTL_MINUTES))
                .unwrap_or(60 * 24 * 30),
        };
        let s3 = S3Config {
            bucket: std::env::var("S3_BUCKET")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint: optional_var("S3_ENDPOINT"),
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            public_base_url: optional_var("S3_PUBLIC_BASE_URL"),
        };
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Ok(Self {
            database_url,
            jwt,
            s3,
            cookie_secure,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
