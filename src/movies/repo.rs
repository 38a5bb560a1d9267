use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Movie, MovieInput};

#[async_trait]
pub trait MovieRepo: Send + Sync {
    /// Page of movies, oldest first.
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Movie>>;
    async fn count(&self) -> anyhow::Result<i64>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Movie>>;
    async fn create(&self, input: &MovieInput) -> anyhow::Result<Movie>;
    /// `None` when no movie has this id.
    async fn update(&self, id: Uuid, input: &MovieInput) -> anyhow::Result<Option<Movie>>;
    /// Whether a movie other than `except` points at `poster`.
    async fn poster_in_use(&self, poster: &str, except: Uuid) -> anyhow::Result<bool>;
    /// `false` when no movie has this id.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgMovieRepo {
    db: PgPool,
}

impl PgMovieRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MovieRepo for PgMovieRepo {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Movie>> {
        let rows = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, title, year, poster, created_at, updated_at
            FROM movies
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list movies")?;
        Ok(rows)
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM movies"#)
            .fetch_one(&self.db)
            .await
            .context("count movies")?;
        Ok(n)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Movie>> {
        let row = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, title, year, poster, created_at, updated_at
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get movie")?;
        Ok(row)
    }

    async fn create(&self, input: &MovieInput) -> anyhow::Result<Movie> {
        let row = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (title, year, poster)
            VALUES ($1, $2, $3)
            RETURNING id, title, year, poster, created_at, updated_at
            "#,
        )
        .bind(&input.title)
        .bind(input.year)
        .bind(&input.poster)
        .fetch_one(&self.db)
        .await
        .context("insert movie")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, input: &MovieInput) -> anyhow::Result<Option<Movie>> {
        let row = sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
               SET title = $2, year = $3, poster = $4, updated_at = now()
             WHERE id = $1
            RETURNING id, title, year, poster, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(input.year)
        .bind(&input.poster)
        .fetch_optional(&self.db)
        .await
        .context("update movie")?;
        Ok(row)
    }

    async fn poster_in_use(&self, poster: &str, except: Uuid) -> anyhow::Result<bool> {
        let (used,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(SELECT 1 FROM movies WHERE poster = $1 AND id <> $2)"#,
        )
        .bind(poster)
        .bind(except)
        .fetch_one(&self.db)
        .await
        .context("check poster use")?;
        Ok(used)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM movies WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete movie")?;
        Ok(res.rows_affected() > 0)
    }
}
