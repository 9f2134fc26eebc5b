use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};
use uuid::Uuid;
use warbler_types::api::ProfileUpdate;
use warbler_types::{Like, Message, ProfileStats, User, UserProfile};

use crate::Database;
use crate::error::{Error, Result};
use crate::models::{LikeRow, MessageRow, UserRow};

impl Database {
    // -- Users --

    /// Stage and commit a signup in one step.
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<User> {
        let mut session = self.session();
        let user = session.signup(username, email, password, image_url)?;
        session.commit()?;

        debug!(user_id = %user.id, "Signed up {}", user.username);
        Ok(user.to_user())
    }

    /// Returns `None` for an unknown username and for a wrong password alike.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let row = self.get_user_row_by_username(username)?;

        let verified = match &row {
            Some(row) => self.hasher().verify(&row.password, password),
            None => {
                if let Some(decoy) = self.decoy_hash() {
                    let _ = self.hasher().verify(decoy, password);
                }
                false
            }
        };

        match row {
            Some(row) if verified => Ok(Some(row.into_user()?)),
            _ => {
                warn!("Failed login attempt for '{}'", username);
                Ok(None)
            }
        }
    }

    /// Hash of a throwaway password, made with the store's own hasher on
    /// first use.
    fn decoy_hash(&self) -> Option<&str> {
        if let Some(hash) = self.decoy_hash.get() {
            return Some(hash);
        }
        match self.hasher().hash("warbler-decoy-password") {
            Ok(hash) => Some(self.decoy_hash.get_or_init(|| hash).as_str()),
            Err(e) => {
                warn!("Could not build decoy hash: {}", e);
                None
            }
        }
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_row(id)?.map(UserRow::into_user).transpose()
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.get_user_row_by_username(username)?
            .map(UserRow::into_user)
            .transpose()
    }

    /// Raw row, password hash included.
    pub fn get_user_row(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_row_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    /// All users ordered by username; with `search`, only usernames that
    /// contain it.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| match search.filter(|s| !s.is_empty()) {
            Some(term) => query_users(
                conn,
                "WHERE instr(username, ?1) > 0 ORDER BY username",
                params![term],
            ),
            None => query_users(conn, "ORDER BY username", params![]),
        })?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Re-check the current password, then apply `update`. `None` when the
    /// password is wrong.
    pub fn update_profile(
        &self,
        user_id: Uuid,
        password: &str,
        update: ProfileUpdate,
    ) -> Result<Option<User>> {
        let row = self
            .get_user_row(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        if !self.hasher().verify(&row.password, password) {
            warn!(user_id = %user_id, "Profile edit rejected: bad password");
            return Ok(None);
        }

        if !update.is_empty() {
            let mut session = self.session();
            session.update_profile(user_id, update);
            session.commit()?;
        }

        self.get_user(user_id)
    }

    pub fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let mut session = self.session();
        session.delete_user(user_id);
        session.commit()
    }

    // -- Follows --

    /// Whether `user` follows `other`.
    pub fn is_following(&self, user: Uuid, other: Uuid) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, user, other))
    }

    /// Whether `user` is followed by `other`.
    pub fn is_followed_by(&self, user: Uuid, other: Uuid) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, other, user))
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: Uuid) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| {
            query_users(
                conn,
                "WHERE id IN (SELECT user_following_id FROM follows WHERE user_being_followed_id = ?1)
                 ORDER BY username",
                [user_id.to_string()],
            )
        })?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: Uuid) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| {
            query_users(
                conn,
                "WHERE id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
                 ORDER BY username",
                [user_id.to_string()],
            )
        })?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    // -- Messages --

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let row = self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MessageRow::COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], MessageRow::from_row)
                .optional()?;
            Ok(row)
        })?;
        row.map(MessageRow::into_message).transpose()
    }

    /// A user's messages, newest first.
    pub fn messages_for_user(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let rows = self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE user_id = ?1 ORDER BY timestamp DESC, rowid DESC",
                params![user_id.to_string()],
            )
        })?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Most recent messages by `user_id` and everyone they follow.
    pub fn timeline(&self, user_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let rows = self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE user_id = ?1
                    OR user_id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?2",
                params![user_id.to_string(), limit],
            )
        })?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    // -- Likes --

    pub fn likes_for_user(&self, user_id: Uuid) -> Result<Vec<Like>> {
        let rows = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, user_id, message_id FROM likes WHERE user_id = ?1")?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(LikeRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(LikeRow::into_like).collect()
    }

    /// Messages `user_id` has liked, newest first.
    pub fn liked_messages(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let rows = self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE id IN (SELECT message_id FROM likes WHERE user_id = ?1)
                 ORDER BY timestamp DESC, rowid DESC",
                params![user_id.to_string()],
            )
        })?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Like the message if not yet liked, otherwise remove the like.
    /// Returns whether the message is liked afterwards. Users cannot like
    /// their own messages.
    pub fn toggle_like(&self, user_id: Uuid, message_id: Uuid) -> Result<bool> {
        let liked = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let author: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM messages WHERE id = ?1",
                    [message_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let author = author.ok_or_else(|| Error::NotFound(format!("message {}", message_id)))?;
            if author == user_id.to_string() {
                return Err(Error::Validation("users cannot like their own messages".into()));
            }

            let removed = tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id.to_string(), message_id.to_string()],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO likes (id, user_id, message_id) VALUES (?1, ?2, ?3)",
                    params![
                        Uuid::new_v4().to_string(),
                        user_id.to_string(),
                        message_id.to_string()
                    ],
                )?;
            }

            tx.commit()?;
            Ok(removed == 0)
        })?;

        debug!(user_id = %user_id, message_id = %message_id, liked, "Toggled like");
        Ok(liked)
    }

    // -- Profiles --

    pub fn profile_stats(&self, user_id: Uuid) -> Result<ProfileStats> {
        self.with_conn(|conn| {
            let counts: (i64, i64, i64, i64) = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [user_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            Ok(ProfileStats {
                messages: counts.0 as u64,
                followers: counts.1 as u64,
                following: counts.2 as u64,
                likes: counts.3 as u64,
            })
        })
    }

    /// User plus the counters shown on their profile page.
    pub fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let Some(user) = self.get_user(user_id)? else {
            return Ok(None);
        };
        let stats = self.profile_stats(user_id)?;
        Ok(Some(UserProfile { user, stats }))
    }
}

/// `column` is always a literal from this module, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", UserRow::COLUMNS, column);
    let row = conn.query_row(&sql, [value], UserRow::from_row).optional()?;
    Ok(row)
}

fn query_users<P: rusqlite::Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<UserRow>> {
    let sql = format!("SELECT {} FROM users {}", UserRow::COLUMNS, tail);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, UserRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_messages<P: rusqlite::Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<MessageRow>> {
    let sql = format!("SELECT {} FROM messages {}", MessageRow::COLUMNS, tail);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn follow_exists(conn: &Connection, follower: Uuid, followee: Uuid) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM follows WHERE user_following_id = ?1 AND user_being_followed_id = ?2
        )",
        [follower.to_string(), followee.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}
