//! HTTP boundary: the thin JSON surface around the store and the hub's
//! presence snapshot. No template engine and no HTML admin UI -- every
//! route returns JSON (or, for `/`, a single static HTML shell) and calls
//! only into [`crate::store::Store`] plus [`crate::hub::HubState`]
//! read-only snapshots, never inventing extra signaling semantics.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::store::{Store, StoreError};
use crate::turn;

const SHELL_HTML: &str = include_str!("../static/shell.html");

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "avi", "mov", "wmv", "flv", "mkv"];
const AVATAR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const MAX_AVATAR_BYTES: usize = 10 * 1024 * 1024;
const AVATAR_SIDE: u32 = 256;

/// `user=<uuid>` query, reused by every route that identifies its caller
/// this way.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"status": "error", "error": message.into()}))).into_response()
}

fn store_error_response(err: StoreError) -> Response {
    tracing::error!(%err, "store error handling request");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// `GET /` -- 404 unless `user` resolves to a known account; otherwise a
/// static HTML shell (the real asset pipeline is an external collaborator).
pub async fn index(State(app): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    match app.hub.store.get_user_by_uuid(&query.user) {
        Ok(Some(_)) => Html(SHELL_HTML).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "unknown user").into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    20
}

/// `GET /api/messages?limit=N` -- recent messages, newest first, plus the
/// total persisted count.
pub async fn get_messages(State(app): State<AppState>, Query(query): Query<MessagesQuery>) -> Response {
    let messages = match app.hub.store.get_recent_messages(query.limit) {
        Ok(m) => m,
        Err(err) => return store_error_response(err),
    };
    let total = match app.hub.store.get_message_count() {
        Ok(t) => t,
        Err(err) => return store_error_response(err),
    };
    Json(json!({"status": "ok", "messages": messages, "total": total})).into_response()
}

/// `GET /api/user?user=<uuid>` -- the caller's own record.
pub async fn get_user(State(app): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    match app.hub.store.get_user_by_uuid(&query.user) {
        Ok(Some(user)) => Json(json!({"status": "ok", "user": user})).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "unknown user").into_response(),
        Err(err) => store_error_response(err),
    }
}

/// `GET /api/rooms` -- every registered voice room.
pub async fn get_rooms(State(app): State<AppState>) -> Response {
    match app.hub.store.get_voice_rooms() {
        Ok(rooms) => Json(json!({"status": "ok", "rooms": rooms})).into_response(),
        Err(err) => store_error_response(err),
    }
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// `POST /api/upload?user=<uuid>` -- multipart media upload. Enforces the
/// extension whitelist and the 50 MiB cap while streaming (a field that
/// overflows the cap is aborted and its partial file unlinked), writes
/// under the configured media directory, and records a `media` chat
/// message referencing the new URL.
pub async fn upload_media(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
    mut multipart: Multipart,
) -> Response {
    let user = match app.hub.store.get_user_by_uuid(&query.user) {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown user").into_response(),
        Err(err) => return store_error_response(err),
    };

    let field = match multipart.next_field().await {
        Ok(Some(field)) if field.name() == Some("file") => field,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "no file provided"),
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let Some(filename) = field.file_name().map(str::to_string) else {
        return error_response(StatusCode::BAD_REQUEST, "no filename provided");
    };
    let ext = extension_of(&filename);
    let is_image = IMAGE_EXTENSIONS.contains(&ext.as_str());
    let is_video = VIDEO_EXTENSIONS.contains(&ext.as_str());
    if !is_image && !is_video {
        return error_response(StatusCode::BAD_REQUEST, "unsupported file type");
    }

    let unique_name = format!("{}_{filename}", uuid::Uuid::new_v4().simple());
    let path = app.config.media_dir.join(&unique_name);

    match write_field_capped(field, &path, MAX_UPLOAD_BYTES).await {
        Ok(size) => {
            let url = format!("/media/{unique_name}");
            match app
                .hub
                .store
                .add_message(voxrelay_proto::MessageKind::Media, &url, &user.uuid)
            {
                Ok(message) => Json(json!({
                    "status": "ok",
                    "message": "file uploaded successfully",
                    "file": {
                        "id": message.id,
                        "filename": unique_name,
                        "original_name": filename,
                        "url": url,
                        "kind": if is_image { "image" } else { "video" },
                        "size": size,
                        "user_uuid": user.uuid,
                        "username": user.username,
                        "datetime": message.datetime,
                    }
                }))
                .into_response(),
                Err(err) => store_error_response(err),
            }
        }
        Err(UploadError::TooLarge) => {
            error_response(StatusCode::BAD_REQUEST, "file too large (max 50MB)")
        }
        Err(UploadError::Io(message)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

/// `POST /api/upload_avatar?user=<uuid>` -- single image (jpg/jpeg/png),
/// 10 MiB cap, resized to 256x256 with Lanczos3 and saved as
/// `<user_uuid>_avatar.jpg`.
pub async fn upload_avatar(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
    mut multipart: Multipart,
) -> Response {
    let user = match app.hub.store.get_user_by_uuid(&query.user) {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown user").into_response(),
        Err(err) => return store_error_response(err),
    };

    let field = match multipart.next_field().await {
        Ok(Some(field)) if field.name() == Some("file") => field,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "no file provided"),
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let Some(filename) = field.file_name().map(str::to_string) else {
        return error_response(StatusCode::BAD_REQUEST, "no filename provided");
    };
    let ext = extension_of(&filename);
    if !AVATAR_EXTENSIONS.contains(&ext.as_str()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "unsupported file type, only images are allowed",
        );
    }

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };
    if bytes.len() > MAX_AVATAR_BYTES {
        return error_response(StatusCode::BAD_REQUEST, "file too large (max 10MB)");
    }

    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let resized = image.resize_exact(AVATAR_SIDE, AVATAR_SIDE, image::imageops::FilterType::Lanczos3);

    let new_filename = format!("{}_avatar.jpg", user.uuid);
    let path = app.config.media_dir.join("avatars").join(&new_filename);
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    }
    if let Err(err) = resized.to_rgb8().save_with_format(&path, image::ImageFormat::Jpeg) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    }

    let avatar_url = format!("/media/avatars/{new_filename}");
    Json(json!({
        "status": "ok",
        "message": "avatar uploaded successfully",
        "avatar": {
            "url": avatar_url,
            "filename": new_filename,
            "original_name": filename,
        }
    }))
    .into_response()
}

enum UploadError {
    TooLarge,
    Io(String),
}

/// Streams a multipart field to `path`, aborting and unlinking the partial
/// file if the cumulative size exceeds `cap` before the field is drained.
async fn write_field_capped(
    mut field: axum::extract::multipart::Field<'_>,
    path: &PathBuf,
    cap: usize,
) -> Result<usize, UploadError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?;
    let mut size = 0usize;

    loop {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| UploadError::Io(e.to_string()))?;
        let Some(chunk) = chunk else { break };
        size += chunk.len();
        if size > cap {
            drop(file);
            let _ = tokio::fs::remove_file(path).await;
            return Err(UploadError::TooLarge);
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| UploadError::Io(e.to_string()))?;
    }

    Ok(size)
}

/// `GET /api/get_turn_creds?user=<uuid>` -- mints an ephemeral relay-server
/// credential pair.
pub async fn get_turn_creds(State(app): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    if app.config.turn_secret_key.is_empty() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TURN secret key is not configured",
        );
    }
    #[allow(clippy::cast_possible_truncation)]
    let now_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    match turn::mint(&app.config.turn_secret_key, &query.user, now_unix) {
        Ok(creds) => Json(creds).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Admin surface -- gated by the caller's `is_admin` flag, JSON only.
// ---------------------------------------------------------------------------

async fn require_admin(app: &AppState, uuid: &str) -> Result<(), Response> {
    match app.hub.store.get_user_by_uuid(uuid) {
        Ok(Some(user)) if user.is_admin => Ok(()),
        Ok(Some(_)) => Err(error_response(StatusCode::FORBIDDEN, "admin access required")),
        Ok(None) => Err((StatusCode::NOT_FOUND, "unknown user").into_response()),
        Err(err) => Err(store_error_response(err)),
    }
}

/// `GET /admin/panel?user=<uuid>` -- JSON listing of every account. No
/// HTML admin UI is rendered; the endpoint itself still exists.
pub async fn admin_panel(State(app): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    admin_list_users(State(app), Query(query)).await
}

/// `GET /admin/api/users?user=<uuid>` -- list every account.
pub async fn admin_list_users(State(app): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    if let Err(resp) = require_admin(&app, &query.user).await {
        return resp;
    }
    match app.hub.store.list_users() {
        Ok(users) => Json(json!({"status": "ok", "users": users})).into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub uuid: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// `POST /admin/api/users?user=<admin_uuid>` -- create a new account.
pub async fn admin_create_user(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(body): Json<CreateUserBody>,
) -> Response {
    if let Err(resp) = require_admin(&app, &query.user).await {
        return resp;
    }
    if body.username.trim().is_empty() || body.uuid.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "username and uuid are required");
    }
    match app
        .hub
        .store
        .add_user(&body.uuid, &body.username, body.is_admin)
    {
        Ok(user) => Json(json!({"status": "ok", "message": "user created successfully", "user": user}))
            .into_response(),
        Err(StoreError::UsernameTaken(name)) => {
            error_response(StatusCode::BAD_REQUEST, format!("user already exists: {name}"))
        }
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserQuery {
    pub user: String,
    pub uuid: String,
}

/// `DELETE /admin/api/users?user=<admin_uuid>&uuid=<target>` -- remove an
/// account. Refuses self-deletion.
pub async fn admin_delete_user(State(app): State<AppState>, Query(query): Query<DeleteUserQuery>) -> Response {
    if let Err(resp) = require_admin(
        &app,
        &query.user,
    )
    .await
    {
        return resp;
    }
    if query.uuid == query.user {
        return error_response(StatusCode::BAD_REQUEST, "cannot delete yourself");
    }
    match app.hub.store.delete_user(&query.uuid) {
        Ok(true) => Json(json!({"status": "ok", "message": "user deleted successfully"})).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "user not found").into_response(),
        Err(err) => store_error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_lowercases_and_strips_dot() {
        assert_eq!(extension_of("photo.PNG"), "png");
        assert_eq!(extension_of("clip.mp4"), "mp4");
        assert_eq!(extension_of("noext"), "noext");
    }
}
