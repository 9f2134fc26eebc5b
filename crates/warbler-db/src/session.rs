use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;
use warbler_types::api::ProfileUpdate;

use crate::Database;
use crate::error::{Error, Result};
use crate::models::{NewMessage, NewUser, format_timestamp};

/// A staged write.
#[derive(Debug, Clone)]
enum Pending {
    User(NewUser),
    Message(NewMessage),
    Follow { follower: Uuid, followee: Uuid },
    Unfollow { follower: Uuid, followee: Uuid },
    Like { id: Uuid, user_id: Uuid, message_id: Uuid },
    Unlike { user_id: Uuid, message_id: Uuid },
    UpdateProfile { user_id: Uuid, update: ProfileUpdate },
    DeleteUser(Uuid),
    DeleteMessage(Uuid),
}

/// Unit of work over a `Database`.
///
/// Writes are queued in memory and applied in order inside one transaction
/// by `commit`. Foreign keys are deferred, so staging order does not matter
/// for references. A constraint failure anywhere rolls back everything the
/// session staged. Dropping a session without committing discards it.
pub struct Session<'db> {
    db: &'db Database,
    pending: Vec<Pending>,
}

impl<'db> Session<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    // -- Users --

    /// Hash the password and stage a new user. Fails with
    /// `Error::Validation` when the password is missing or empty; uniqueness
    /// and emptiness of username/email are only checked at commit.
    pub fn signup(
        &mut self,
        username: &str,
        email: &str,
        password: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<NewUser> {
        let user = NewUser::signup(self.db.hasher(), username, email, password, image_url)?;
        self.add_user(user.clone());
        Ok(user)
    }

    /// Stage a user exactly as given, password included.
    pub fn add_user(&mut self, user: NewUser) -> &mut Self {
        self.pending.push(Pending::User(user));
        self
    }

    pub fn update_profile(&mut self, user_id: Uuid, update: ProfileUpdate) -> &mut Self {
        self.pending.push(Pending::UpdateProfile { user_id, update });
        self
    }

    /// Cascades to the user's messages, follows and likes.
    pub fn delete_user(&mut self, user_id: Uuid) -> &mut Self {
        self.pending.push(Pending::DeleteUser(user_id));
        self
    }

    // -- Messages --

    pub fn add_message(&mut self, message: NewMessage) -> &mut Self {
        self.pending.push(Pending::Message(message));
        self
    }

    /// Validate and stage a message authored by `user_id`.
    pub fn post_message(&mut self, user_id: Uuid, text: &str) -> Result<NewMessage> {
        let message = NewMessage::validated(user_id, text)?;
        self.add_message(message.clone());
        Ok(message)
    }

    /// Cascades to the message's likes.
    pub fn delete_message(&mut self, message_id: Uuid) -> &mut Self {
        self.pending.push(Pending::DeleteMessage(message_id));
        self
    }

    // -- Follows --

    /// `follower` starts following `followee`.
    pub fn follow(&mut self, follower: Uuid, followee: Uuid) -> &mut Self {
        self.pending.push(Pending::Follow { follower, followee });
        self
    }

    pub fn unfollow(&mut self, follower: Uuid, followee: Uuid) -> &mut Self {
        self.pending.push(Pending::Unfollow { follower, followee });
        self
    }

    // -- Likes --

    /// Stage a like and return its id.
    pub fn like(&mut self, user_id: Uuid, message_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.pending.push(Pending::Like {
            id,
            user_id,
            message_id,
        });
        id
    }

    pub fn unlike(&mut self, user_id: Uuid, message_id: Uuid) -> &mut Self {
        self.pending.push(Pending::Unlike { user_id, message_id });
        self
    }

    // -- Lifecycle --

    /// Apply every staged write atomically.
    pub fn commit(self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let count = self.pending.len();
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for op in &self.pending {
                apply(&tx, op)?;
            }
            tx.commit()?;
            Ok(())
        })?;

        debug!(writes = count, "Session committed");
        Ok(())
    }

    /// Discard everything staged so far.
    pub fn rollback(mut self) {
        debug!(writes = self.pending.len(), "Session rolled back");
        self.pending.clear();
    }
}

fn apply(conn: &Connection, op: &Pending) -> Result<()> {
    match op {
        Pending::User(user) => {
            conn.execute(
                "INSERT INTO users (id, username, email, password, image_url, header_image_url, bio, location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password,
                    user.image_url,
                    user.header_image_url,
                    user.bio,
                    user.location,
                ],
            )?;
        }
        Pending::Message(message) => {
            conn.execute(
                "INSERT INTO messages (id, text, timestamp, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![
                    message.id.to_string(),
                    message.text,
                    format_timestamp(&message.timestamp),
                    message.user_id.to_string(),
                ],
            )?;
        }
        Pending::Follow { follower, followee } => {
            conn.execute(
                "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?1, ?2)",
                params![followee.to_string(), follower.to_string()],
            )?;
        }
        Pending::Unfollow { follower, followee } => {
            conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followee.to_string(), follower.to_string()],
            )?;
        }
        Pending::Like {
            id,
            user_id,
            message_id,
        } => {
            conn.execute(
                "INSERT INTO likes (id, user_id, message_id) VALUES (?1, ?2, ?3)",
                params![id.to_string(), user_id.to_string(), message_id.to_string()],
            )?;
        }
        Pending::Unlike { user_id, message_id } => {
            conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id.to_string(), message_id.to_string()],
            )?;
        }
        Pending::UpdateProfile { user_id, update } => {
            let changed = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    image_url = COALESCE(?4, image_url),
                    header_image_url = COALESCE(?5, header_image_url),
                    bio = CASE WHEN ?6 IS NULL THEN bio ELSE NULLIF(?6, '') END,
                    location = CASE WHEN ?7 IS NULL THEN location ELSE NULLIF(?7, '') END
                 WHERE id = ?1",
                params![
                    user_id.to_string(),
                    update.username,
                    update.email,
                    update.image_url,
                    update.header_image_url,
                    update.bio,
                    update.location,
                ],
            )?;
            if changed == 0 {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
        }
        Pending::DeleteUser(id) => {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            if changed == 0 {
                return Err(Error::NotFound(format!("user {}", id)));
            }
        }
        Pending::DeleteMessage(id) => {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
            if changed == 0 {
                return Err(Error::NotFound(format!("message {}", id)));
            }
        }
    }
    Ok(())
}
