//! In-memory stand-ins for the database and object store, used by
//! `AppState::fake()`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
};
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::{repo::UserRepo, repo_types::User};
use crate::movies::{
    repo::MovieRepo,
    repo_types::{Movie, MovieInput},
};
use crate::storage::StorageClient;

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for InMemoryUsers {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(Some(user))
    }
}

/// Movies with strictly increasing `created_at`, so insertion order is the
/// listing order.
pub struct InMemoryMovies {
    rows: Mutex<Vec<Movie>>,
    seq: AtomicI64,
    epoch: OffsetDateTime,
}

impl Default for InMemoryMovies {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            seq: AtomicI64::new(0),
            epoch: OffsetDateTime::now_utc(),
        }
    }
}

impl InMemoryMovies {
    fn tick(&self) -> OffsetDateTime {
        self.epoch + Duration::milliseconds(self.seq.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl MovieRepo for InMemoryMovies {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Movie>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Movie>> {
        Ok(self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn create(&self, input: &MovieInput) -> anyhow::Result<Movie> {
        let now = self.tick();
        let movie = Movie {
            id: Uuid::new_v4(),
            title: input.title.clone(),
            year: input.year,
            poster: input.poster.clone(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(movie.clone());
        Ok(movie)
    }

    async fn update(&self, id: Uuid, input: &MovieInput) -> anyhow::Result<Option<Movie>> {
        let now = self.tick();
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.iter_mut().find(|m| m.id == id).map(|m| {
            m.title = input.title.clone();
            m.year = input.year;
            m.poster = input.poster.clone();
            m.updated_at = now;
            m.clone()
        }))
    }

    async fn poster_in_use(&self, poster: &str, except: Uuid) -> anyhow::Result<bool> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().any(|m| m.poster == poster && m.id != except))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.id != id);
        Ok(rows.len() != before)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Put(String),
    Delete(String),
}

/// Records every call in order; puts and deletes can be made to fail.
#[derive(Default)]
pub struct RecordingStorage {
    ops: Mutex<Vec<StorageOp>>,
    fail_puts: bool,
    fail_deletes: bool,
}

impl RecordingStorage {
    pub fn with_failures(fail_puts: bool, fail_deletes: bool) -> Self {
        Self {
            fail_puts,
            fail_deletes,
            ..Self::default()
        }
    }

    pub fn ops(&self) -> Vec<StorageOp> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
        if self.fail_puts {
            anyhow::bail!("put refused");
        }
        self.ops.lock().unwrap().push(StorageOp::Put(key.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        if self.fail_deletes {
            anyhow::bail!("delete refused");
        }
        self.ops.lock().unwrap().push(StorageOp::Delete(key.to_string()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://fake.local/{}", key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        crate::storage::key_under_base("https://fake.local", url)
    }
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn read_body(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn read_json(res: Response) -> serde_json::Value {
    serde_json::from_str(&read_body(res).await).unwrap()
}
