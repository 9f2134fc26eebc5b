//! Database row types and staged inserts. Rows map directly to SQLite
//! columns; `into_*` converts them to the `warbler-types` models.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use uuid::Uuid;
use warbler_auth::CredentialHasher;
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MAX_MESSAGE_LEN};
use warbler_types::{Like, Message, User};

use crate::error::{Error, Result};

/// Fixed-width so lexical order in SQLite is chronological order. Staged
/// timestamps are truncated to the same microsecond precision.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    /// PHC hash string for users created through signup.
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str =
        "id, username, email, password, image_url, header_image_url, bio, location, created_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            image_url: row.get(4)?,
            header_image_url: row.get(5)?,
            bio: row.get(6)?,
            location: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username,
            email: self.email,
            image_url: self.image_url,
            header_image_url: self.header_image_url,
            bio: self.bio,
            location: self.location,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub timestamp: String,
    pub user_id: String,
}

impl MessageRow {
    pub(crate) const COLUMNS: &'static str = "id, text, timestamp, user_id";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(MessageRow {
            id: row.get(0)?,
            text: row.get(1)?,
            timestamp: row.get(2)?,
            user_id: row.get(3)?,
        })
    }

    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            user_id: parse_id(&self.user_id)?,
            text: self.text,
        })
    }
}

pub struct LikeRow {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
}

impl LikeRow {
    pub fn into_like(self) -> Result<Like> {
        Ok(Like {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            message_id: parse_id(&self.message_id)?,
        })
    }
}

/// A user staged for insertion. The id is assigned up front so other staged
/// rows can reference it before commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Stored verbatim. `signup` puts a hash here; direct construction does not.
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl NewUser {
    /// Build a user without hashing anything. Meant for seeding and tests.
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password: password.into(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
            header_image_url: DEFAULT_HEADER_IMAGE_URL.to_string(),
            bio: None,
            location: None,
        }
    }

    /// Validate and hash the password, then build the user. A missing or
    /// empty password fails here, before anything is staged.
    pub fn signup(
        hasher: &dyn CredentialHasher,
        username: &str,
        email: &str,
        password: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<Self> {
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Validation("password must not be empty".into()))?;

        let hashed = hasher.hash(password)?;

        let mut user = Self::new(username, email, hashed);
        if let Some(url) = image_url.filter(|u| !u.is_empty()) {
            user.image_url = url.to_string();
        }
        Ok(user)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            image_url: self.image_url.clone(),
            header_image_url: self.header_image_url.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
}

impl NewMessage {
    /// Unvalidated; the schema still rejects empty or overlong text at commit.
    pub fn new(user_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            timestamp: Utc::now().trunc_subsecs(6),
            user_id,
        }
    }

    /// Like `new`, but rejects bad text up front.
    pub fn validated(user_id: Uuid, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation("message text must not be empty".into()));
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(Error::Validation(format!(
                "message text is {} characters, limit is {}",
                len, MAX_MESSAGE_LEN
            )));
        }
        Ok(Self::new(user_id, text))
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(6);
        self
    }

    pub fn to_message(&self) -> Message {
        Message {
            id: self.id,
            text: self.text.clone(),
            timestamp: self.timestamp,
            user_id: self.user_id,
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|e| Error::Corrupt(format!("bad id '{}': {}", raw, e)))
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// SQLite writes "YYYY-MM-DD HH:MM:SS[.fff]" without a zone; read it as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .map_err(|e| Error::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}
