use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::movies::repo_types::{Movie, MovieInput};
use crate::movies::services::{self as movies, parse_poster_url, parse_title, parse_year};
use crate::state::AppState;

pub struct UploadItem {
    pub file_name: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Raw movie form fields. `file_url` is only honored on create; on edit the
/// stored poster is the current one.
#[derive(Default)]
pub struct MovieForm {
    pub title: String,
    pub year: String,
    pub file_url: Option<String>,
    pub file: Option<UploadItem>,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// `<unix-millis>_<file name>`, restricted to characters that survive a URL
/// path unescaped.
pub(crate) fn object_key(file_name: &str, content_type: &str, now_millis: i128) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    name = name.trim_start_matches('.').to_string();
    if name.is_empty() {
        name = "poster".into();
    }
    if !name.contains('.') {
        if let Some(ext) = ext_from_mime(content_type) {
            name = format!("{name}.{ext}");
        }
    }
    format!("{now_millis}_{name}")
}

/// Removes the movie's poster object unless it lives outside our store or
/// another movie still points at it.
async fn delete_poster_best_effort(st: &AppState, movie: &Movie) {
    let url = movie.poster.as_str();
    let Some(key) = st.storage.key_for_url(url) else {
        warn!(%url, "poster is not in our store; skipping delete");
        return;
    };
    match st.movies.poster_in_use(url, movie.id).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(%key, "poster shared with another movie; skipping delete");
            return;
        }
        Err(e) => {
            warn!(error = %e, %key, "poster use check failed; skipping delete");
            return;
        }
    }
    match st.storage.delete_object(&key).await {
        Ok(()) => info!(%key, "poster deleted"),
        Err(e) => warn!(error = %e, %key, "poster delete failed; object may be orphaned"),
    }
}

async fn upload_poster(st: &AppState, file: UploadItem) -> anyhow::Result<String> {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let key = object_key(&file.file_name, &file.content_type, millis);
    st.storage
        .put_object(&key, file.body, &file.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%key, "poster uploaded");
    Ok(st.storage.public_url(&key))
}

/// Validate, swap the poster if a new image came with the form, then
/// create or overwrite the record.
///
/// Nothing touches storage until title, year and poster presence check out.
/// Replacing deletes the old object before the upload; a failed upload
/// aborts with the record untouched but the old object already gone.
pub async fn submit_movie_form(
    st: &AppState,
    existing: Option<&Movie>,
    form: MovieForm,
) -> AppResult<Movie> {
    let mut fields = FieldErrors::new();
    let title = parse_title(&form.title)
        .map_err(|m| fields.insert("title", m))
        .ok();
    let year = parse_year(&form.year).map_err(|m| fields.insert("year", m)).ok();

    let current_url = match existing {
        Some(m) => Some(m.poster.clone()),
        None => form.file_url.filter(|u| !u.trim().is_empty()),
    };
    match &form.file {
        Some(f) if !f.content_type.starts_with("image/") => {
            fields.insert("file", "File must be an image".into());
        }
        None if current_url.is_none() => {
            fields.insert("file", "Poster image is required".into());
        }
        _ => {}
    }

    let (Some(title), Some(year)) = (title, year) else {
        return Err(AppError::Validation(fields));
    };
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }

    let poster = match (form.file, current_url) {
        (Some(file), _) => {
            if let Some(old) = existing {
                delete_poster_best_effort(st, old).await;
            }
            upload_poster(st, file).await?
        }
        (None, Some(url)) => parse_poster_url(&url).map_err(|m| {
            let mut fields = FieldErrors::new();
            fields.insert("file", m);
            AppError::Validation(fields)
        })?,
        (None, None) => {
            let mut fields = FieldErrors::new();
            fields.insert("file", "Poster image is required".into());
            return Err(AppError::Validation(fields));
        }
    };

    let input = MovieInput {
        title,
        year,
        poster,
    };
    match existing {
        Some(m) => movies::update_movie(st, m.id, input).await,
        None => movies::create_movie(st, input).await,
    }
}

/// Poster first (best effort), then the record.
pub async fn delete_movie_with_poster(st: &AppState, id: Uuid) -> AppResult<()> {
    let movie = movies::get_movie(st, id).await?;
    delete_poster_best_effort(st, &movie).await;
    movies::delete_movie(st, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageClient;
    use crate::testing::{RecordingStorage, StorageOp};
    use std::sync::Arc;

    fn image(name: &str) -> UploadItem {
        UploadItem {
            file_name: name.into(),
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
        }
    }

    fn form(title: &str, year: &str, file: Option<UploadItem>) -> MovieForm {
        MovieForm {
            title: title.into(),
            year: year.into(),
            file_url: None,
            file,
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn keys_are_url_safe_and_timestamped() {
        assert_eq!(object_key("poster.jpg", "image/jpeg", 42), "42_poster.jpg");
        assert_eq!(
            object_key("C:\\pics\\my poster (1).png", "image/png", 7),
            "7_my-poster--1-.png"
        );
        assert_eq!(object_key("noext", "image/webp", 1), "1_noext.webp");
        assert_eq!(object_key("", "image/png", 1), "1_poster.png");
        assert_eq!(object_key("../.hidden", "image/png", 1), "1_hidden.png");
    }

    #[tokio::test]
    async fn create_uploads_then_persists_public_url() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());

        let movie = submit_movie_form(&st, None, form("Heat", "1995", Some(image("heat.png"))))
            .await
            .unwrap();

        let ops = storage.ops();
        assert_eq!(ops.len(), 1);
        let StorageOp::Put(key) = &ops[0] else {
            panic!("expected put, got {ops:?}");
        };
        assert!(key.ends_with("_heat.png"));
        assert_eq!(movie.poster, format!("https://fake.local/{key}"));
        assert_eq!(movie.year, 1995);
    }

    #[tokio::test]
    async fn invalid_form_touches_no_storage() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());

        let err = submit_movie_form(&st, None, form("", "95", Some(image("a.png"))))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields["title"], "Title is required");
                assert_eq!(fields["year"], "Year must be a 4-digit number");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(storage.ops().is_empty());
    }

    #[tokio::test]
    async fn missing_poster_is_a_field_error() {
        let st = AppState::fake();
        match submit_movie_form(&st, None, form("Heat", "1995", None)).await {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields["file"], "Poster image is required")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let mut file = image("notes.txt");
        file.content_type = "text/plain".into();

        match submit_movie_form(&st, None, form("Heat", "1995", Some(file))).await {
            Err(AppError::Validation(fields)) => assert_eq!(fields["file"], "File must be an image"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(storage.ops().is_empty());
    }

    #[tokio::test]
    async fn create_with_existing_url_skips_upload() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let mut f = form("Heat", "1995", None);
        f.file_url = Some("https://fake.local/1_heat.png".into());

        let movie = submit_movie_form(&st, None, f).await.unwrap();
        assert_eq!(movie.poster, "https://fake.local/1_heat.png");
        assert!(storage.ops().is_empty());
    }

    #[tokio::test]
    async fn replacing_poster_deletes_old_before_upload() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let movie = submit_movie_form(&st, None, form("Heat", "1995", Some(image("old.png"))))
            .await
            .unwrap();
        let old_key = storage.key_for_url(&movie.poster).unwrap();

        let updated = submit_movie_form(
            &st,
            Some(&movie),
            form("Heat (Director's Cut)", "1995", Some(image("new.png"))),
        )
        .await
        .unwrap();

        let ops = storage.ops();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], StorageOp::Delete(old_key));
        assert!(matches!(&ops[2], StorageOp::Put(k) if k.ends_with("_new.png")));
        assert_eq!(updated.id, movie.id);
        assert!(updated.poster.ends_with("_new.png"));
        assert_eq!(updated.title, "Heat (Director's Cut)");
    }

    #[tokio::test]
    async fn edit_without_new_image_keeps_poster() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let movie = submit_movie_form(&st, None, form("Heat", "1995", Some(image("a.png"))))
            .await
            .unwrap();

        let mut f = form("Heat", "1996", None);
        f.file_url = Some("https://elsewhere.example/x.png".into());
        let updated = submit_movie_form(&st, Some(&movie), f).await.unwrap();
        assert_eq!(updated.poster, movie.poster);
        assert_eq!(updated.year, 1996);
        assert_eq!(storage.ops().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_leaves_record_unchanged() {
        let storage = Arc::new(RecordingStorage::with_failures(true, false));
        let st = AppState::fake_with_storage(storage);
        let movie = movies::create_movie(
            &st,
            MovieInput {
                title: "Heat".into(),
                year: 1995,
                poster: "https://fake.local/1_old.png".into(),
            },
        )
        .await
        .unwrap();

        let err = submit_movie_form(&st, Some(&movie), form("Ronin", "1998", Some(image("n.png"))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let stored = movies::get_movie(&st, movie.id).await.unwrap();
        assert_eq!(stored, movie);
    }

    #[tokio::test]
    async fn failed_old_delete_does_not_block_replace() {
        let storage = Arc::new(RecordingStorage::with_failures(false, true));
        let st = AppState::fake_with_storage(storage.clone());
        let movie = movies::create_movie(
            &st,
            MovieInput {
                title: "Heat".into(),
                year: 1995,
                poster: "https://fake.local/1_old.png".into(),
            },
        )
        .await
        .unwrap();

        let updated = submit_movie_form(&st, Some(&movie), form("Heat", "1995", Some(image("n.png"))))
            .await
            .unwrap();
        assert!(updated.poster.ends_with("_n.png"));
    }

    #[tokio::test]
    async fn delete_removes_poster_then_record() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let movie = submit_movie_form(&st, None, form("Heat", "1995", Some(image("a.png"))))
            .await
            .unwrap();

        delete_movie_with_poster(&st, movie.id).await.unwrap();

        let key = storage.key_for_url(&movie.poster).unwrap();
        assert_eq!(storage.ops().last(), Some(&StorageOp::Delete(key)));
        assert!(matches!(
            movies::get_movie(&st, movie.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_movie_with_poster(&st, movie.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn foreign_poster_url_is_never_deleted() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let first = submit_movie_form(&st, None, form("Heat", "1995", Some(image("a.png"))))
            .await
            .unwrap();
        let key = storage.key_for_url(&first.poster).unwrap();
        let other = movies::create_movie(
            &st,
            MovieInput {
                title: "Ronin".into(),
                year: 1998,
                poster: format!("https://images.other-site.example/{key}"),
            },
        )
        .await
        .unwrap();

        delete_movie_with_poster(&st, other.id).await.unwrap();
        submit_movie_form(&st, Some(&first), form("Heat", "1995", None))
            .await
            .unwrap();

        assert_eq!(storage.ops(), vec![StorageOp::Put(key)]);
        assert!(matches!(
            movies::get_movie(&st, other.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shared_poster_survives_deleting_one_movie() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let first = submit_movie_form(&st, None, form("Heat", "1995", Some(image("a.png"))))
            .await
            .unwrap();
        let mut f = form("Heat (copy)", "1995", None);
        f.file_url = Some(first.poster.clone());
        let copy = submit_movie_form(&st, None, f).await.unwrap();

        delete_movie_with_poster(&st, copy.id).await.unwrap();
        assert_eq!(storage.ops().len(), 1);

        delete_movie_with_poster(&st, first.id).await.unwrap();
        let key = storage.key_for_url(&first.poster).unwrap();
        assert_eq!(storage.ops().last(), Some(&StorageOp::Delete(key)));
    }
}
