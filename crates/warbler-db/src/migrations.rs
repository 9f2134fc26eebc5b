use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Latest schema version this build knows how to create.
pub const SCHEMA_VERSION: i64 = 1;

/// Bring the schema up to `SCHEMA_VERSION`. Idempotent.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Foreign keys are deferred so a session may stage rows in any order;
        // they are checked when its transaction commits.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE CHECK (username <> ''),
                email               TEXT NOT NULL UNIQUE CHECK (email <> ''),
                password            TEXT NOT NULL CHECK (password <> ''),
                image_url           TEXT NOT NULL DEFAULT '/static/images/default-pic.png',
                header_image_url    TEXT NOT NULL DEFAULT '/static/images/warbler-hero.jpg',
                bio                 TEXT,
                location            TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                text        TEXT NOT NULL CHECK (length(text) BETWEEN 1 AND 140),
                timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                user_id     TEXT NOT NULL
                    REFERENCES users(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED
            );

            CREATE INDEX idx_messages_user
                ON messages(user_id, timestamp);

            CREATE TABLE follows (
                user_being_followed_id  TEXT NOT NULL
                    REFERENCES users(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
                user_following_id       TEXT NOT NULL
                    REFERENCES users(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
                PRIMARY KEY (user_being_followed_id, user_following_id),
                CHECK (user_being_followed_id <> user_following_id)
            );

            CREATE INDEX idx_follows_follower
                ON follows(user_following_id);

            CREATE TABLE likes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL
                    REFERENCES users(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
                message_id  TEXT NOT NULL
                    REFERENCES messages(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
                UNIQUE(user_id, message_id)
            );

            CREATE INDEX idx_likes_message
                ON likes(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}

/// Drop every Warbler table, children first.
pub fn drop_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS likes;
        DROP TABLE IF EXISTS follows;
        DROP TABLE IF EXISTS messages;
        DROP TABLE IF EXISTS users;
        DROP TABLE IF EXISTS schema_version;
        ",
    )?;

    info!("Dropped all tables");
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn creates_all_tables_once() {
        let conn = Connection::open_in_memory().unwrap();

        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(
            table_names(&conn),
            vec!["follows", "likes", "messages", "schema_version", "users"]
        );
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn drop_all_then_run_recreates_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        drop_all(&conn).unwrap();
        assert!(table_names(&conn).is_empty());

        run(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
