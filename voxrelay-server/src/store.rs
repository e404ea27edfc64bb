//! Persistence store for users, chat history, and voice room definitions.
//!
//! The hub only ever sees the [`Store`] trait (mirroring the opaque
//! interface the signaling core is specified against); [`SqliteStore`] is
//! the production backend and [`InMemoryStore`] exists for tests and
//! embedding without a filesystem. Both are blocking — callers on the async
//! side bridge with `tokio::task::spawn_blocking`, matching how a
//! `Mutex<rusqlite::Connection>` is used elsewhere in the surrounding
//! ecosystem.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use voxrelay_proto::MessageKind;

/// Errors a [`Store`] implementation can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite engine reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// A username that must be unique was already taken.
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    /// A voice room name that must be unique already exists.
    #[error("room already exists: {0}")]
    RoomExists(String),
}

/// A registered user account. Opaque to the signaling core beyond
/// `uuid`/`username`/`is_admin`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct User {
    /// Stable identity, asserted by clients on WebSocket connect.
    pub uuid: String,
    /// Unique display name.
    pub username: String,
    /// Grants access to the `/admin` HTTP surface.
    pub is_admin: bool,
}

/// A named voice room persisted so it survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VoiceRoom {
    /// Row id.
    pub id: i64,
    /// Unique room name, referenced by `join`/`leave` frames.
    pub name: String,
}

/// A persisted chat message, as returned by [`Store::get_recent_messages`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChatMessage {
    /// Row id.
    pub id: i64,
    /// Whether `content` is inline text or a media URL.
    pub kind: MessageKind,
    /// Text payload or media URL.
    pub content: String,
    /// ISO-8601 timestamp assigned at insert time.
    pub datetime: String,
    /// Author's `user_uuid`, if the author's account still exists.
    pub user_uuid: Option<String>,
}

/// Room name every fresh deployment is seeded with.
pub const DEFAULT_ROOM: &str = "General";

/// Opaque persistence interface consumed by the signaling hub and the HTTP
/// boundary. All methods are blocking.
pub trait Store: Send + Sync {
    /// Looks up a user by identity.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError>;

    /// Looks up a user by display name.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Creates a new user account.
    ///
    /// # Errors
    /// Returns [`StoreError::UsernameTaken`] if `username` is already in
    /// use, or [`StoreError::Database`] on any other database failure.
    fn add_user(&self, uuid: &str, username: &str, is_admin: bool) -> Result<User, StoreError>;

    /// Deletes a user account. Returns `true` if a row was removed.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError>;

    /// Lists every user account.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Persists a chat message, evicting the oldest rows (and their
    /// referenced media files) if the configured maximum is exceeded.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn add_message(
        &self,
        kind: MessageKind,
        content: &str,
        user_uuid: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// Returns the `limit` most recent messages, newest first.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn get_recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;

    /// Returns the total number of persisted messages.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn get_message_count(&self) -> Result<usize, StoreError>;

    /// Reports whether a voice room with this name exists.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn voice_room_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Lists every registered voice room.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn get_voice_rooms(&self) -> Result<Vec<VoiceRoom>, StoreError>;

    /// Registers a new voice room.
    ///
    /// # Errors
    /// Returns [`StoreError::RoomExists`] if the name is taken, or
    /// [`StoreError::Database`] on any other database failure.
    fn add_voice_room(&self, name: &str) -> Result<VoiceRoom, StoreError>;

    /// Ensures [`DEFAULT_ROOM`] exists.
    ///
    /// # Errors
    /// Returns [`StoreError`] on a database failure.
    fn init_default_rooms(&self) -> Result<(), StoreError> {
        if !self.voice_room_exists(DEFAULT_ROOM)? {
            self.add_voice_room(DEFAULT_ROOM)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

/// SQLite-backed [`Store`] implementation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_messages: usize,
    media_dir: PathBuf,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and runs
    /// migrations.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    pub fn open(
        path: impl AsRef<Path>,
        max_messages: usize,
        media_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
            max_messages,
            media_dir: media_dir.into(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                uuid TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                is_admin INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                datetime TEXT NOT NULL,
                user_uuid TEXT REFERENCES users(uuid) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_datetime ON messages(datetime);

            CREATE TABLE IF NOT EXISTS voice_rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );",
        )?;
        Ok(())
    }

    /// Deletes oldest rows beyond `max_messages`, unlinking any referenced
    /// media file along the way.
    fn enforce_message_limit(&self, conn: &Connection) -> Result<(), StoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = self.max_messages as i64;
        let mut stmt = conn.prepare(
            "SELECT id, type, content FROM messages ORDER BY id DESC LIMIT -1 OFFSET ?1",
        )?;
        let overflow = stmt.query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut to_delete = Vec::new();
        for row in overflow {
            let (id, kind, content) = row?;
            if kind == MessageKind::Media.as_str() {
                self.delete_media_file(&content);
            }
            to_delete.push(id);
        }
        drop(stmt);

        for id in to_delete {
            conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
        }
        Ok(())
    }

    fn delete_media_file(&self, url: &str) {
        let relative = url.trim_start_matches('/').trim_start_matches("media/");
        let path = self.media_dir.join(relative);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove evicted media file");
        }
    }
}

impl Store for SqliteStore {
    fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT uuid, username, is_admin FROM users WHERE uuid = ?1",
            [uuid],
            |row| {
                Ok(User {
                    uuid: row.get(0)?,
                    username: row.get(1)?,
                    is_admin: row.get(2)?,
                })
            },
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT uuid, username, is_admin FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(User {
                    uuid: row.get(0)?,
                    username: row.get(1)?,
                    is_admin: row.get(2)?,
                })
            },
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn add_user(&self, uuid: &str, username: &str, is_admin: bool) -> Result<User, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO users (uuid, username, is_admin) VALUES (?1, ?2, ?3)",
            rusqlite::params![uuid, username, is_admin],
        );
        match result {
            Ok(_) => Ok(User {
                uuid: uuid.to_string(),
                username: username.to_string(),
                is_admin,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::UsernameTaken(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM users WHERE uuid = ?1", [uuid])?;
        Ok(affected > 0)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT uuid, username, is_admin FROM users")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                uuid: row.get(0)?,
                username: row.get(1)?,
                is_admin: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn add_message(
        &self,
        kind: MessageKind,
        content: &str,
        user_uuid: &str,
    ) -> Result<ChatMessage, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let datetime = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO messages (type, content, datetime, user_uuid) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![kind.as_str(), content, datetime, user_uuid],
        )?;
        let id = conn.last_insert_rowid();
        self.enforce_message_limit(&conn)?;
        Ok(ChatMessage {
            id,
            kind,
            content: content.to_string(),
            datetime,
            user_uuid: Some(user_uuid.to_string()),
        })
    }

    fn get_recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        #[allow(clippy::unwrap_used, clippy::cast_possible_wrap)]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, type, content, datetime, user_uuid FROM messages
             ORDER BY datetime DESC LIMIT ?1",
        )?;
        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map([limit as i64], |row| {
            let kind_str: String = row.get(1)?;
            Ok(ChatMessage {
                id: row.get(0)?,
                kind: kind_str.parse().unwrap_or(MessageKind::Text),
                content: row.get(2)?,
                datetime: row.get(3)?,
                user_uuid: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn get_message_count(&self) -> Result<usize, StoreError> {
        #[allow(clippy::unwrap_used, clippy::cast_sign_loss)]
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn voice_room_exists(&self, name: &str) -> Result<bool, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM voice_rooms WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_voice_rooms(&self) -> Result<Vec<VoiceRoom>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name FROM voice_rooms")?;
        let rows = stmt.query_map([], |row| {
            Ok(VoiceRoom {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn add_voice_room(&self, name: &str) -> Result<VoiceRoom, StoreError> {
        #[allow(clippy::unwrap_used)]
        let conn = self.conn.lock().unwrap();
        let result = conn.execute("INSERT INTO voice_rooms (name) VALUES (?1)", [name]);
        match result {
            Ok(_) => Ok(VoiceRoom {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::RoomExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store (tests / embedding without a filesystem)
// ---------------------------------------------------------------------------

struct InMemoryInner {
    users: Vec<User>,
    messages: VecDeque<ChatMessage>,
    rooms: Vec<VoiceRoom>,
    next_message_id: i64,
    next_room_id: i64,
}

/// In-memory [`Store`] implementation for tests and embedding.
pub struct InMemoryStore {
    inner: Mutex<InMemoryInner>,
    max_messages: usize,
}

impl InMemoryStore {
    /// Creates an empty store with the given maximum message count.
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            inner: Mutex::new(InMemoryInner {
                users: Vec::new(),
                messages: VecDeque::new(),
                rooms: Vec::new(),
                next_message_id: 1,
                next_room_id: 1,
            }),
            max_messages,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Store for InMemoryStore {
    fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.uuid == uuid).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    fn add_user(&self, uuid: &str, username: &str, is_admin: bool) -> Result<User, StoreError> {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        let user = User {
            uuid: uuid.to_string(),
            username: username.to_string(),
            is_admin,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError> {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.uuid != uuid);
        Ok(inner.users.len() != before)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.clone())
    }

    fn add_message(
        &self,
        kind: MessageKind,
        content: &str,
        user_uuid: &str,
    ) -> Result<ChatMessage, StoreError> {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_message_id;
        inner.next_message_id += 1;
        let message = ChatMessage {
            id,
            kind,
            content: content.to_string(),
            datetime: chrono::Utc::now().to_rfc3339(),
            user_uuid: Some(user_uuid.to_string()),
        };
        inner.messages.push_back(message.clone());
        while inner.messages.len() > self.max_messages {
            inner.messages.pop_front();
        }
        Ok(message)
    }

    fn get_recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.iter().rev().take(limit).cloned().collect())
    }

    fn get_message_count(&self) -> Result<usize, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.len())
    }

    fn voice_room_exists(&self, name: &str) -> Result<bool, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.rooms.iter().any(|r| r.name == name))
    }

    fn get_voice_rooms(&self) -> Result<Vec<VoiceRoom>, StoreError> {
        #[allow(clippy::unwrap_used)]
        let inner = self.inner.lock().unwrap();
        Ok(inner.rooms.clone())
    }

    fn add_voice_room(&self, name: &str) -> Result<VoiceRoom, StoreError> {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        if inner.rooms.iter().any(|r| r.name == name) {
            return Err(StoreError::RoomExists(name.to_string()));
        }
        let room = VoiceRoom {
            id: inner.next_room_id,
            name: name.to_string(),
        };
        inner.next_room_id += 1;
        inner.rooms.push(room.clone());
        Ok(room)
    }
}
