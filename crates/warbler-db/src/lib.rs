pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod session;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::info;
use warbler_auth::CredentialHasher;

pub use error::{Error, Result};
pub use models::{NewMessage, NewUser};
pub use session::Session;

/// Default number of messages on a home timeline.
pub const DEFAULT_TIMELINE_LIMIT: u32 = 100;

/// The social graph store: users, messages, follows and likes.
pub struct Database {
    conn: Mutex<Connection>,
    hasher: Arc<dyn CredentialHasher>,
    /// Verified against when a login names an unknown user, so that path
    /// costs the same as a wrong password.
    decoy_hash: OnceLock<String>,
}

impl Database {
    pub fn open(path: &Path, hasher: Arc<dyn CredentialHasher>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, hasher)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, gone when the handle is dropped.
    pub fn open_in_memory(hasher: Arc<dyn CredentialHasher>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, hasher)
    }

    fn init(conn: Connection, hasher: Arc<dyn CredentialHasher>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
            decoy_hash: OnceLock::new(),
        })
    }

    pub fn hasher(&self) -> &dyn CredentialHasher {
        self.hasher.as_ref()
    }

    /// Start a unit of work. Nothing it stages is visible until `commit`.
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    pub fn create_all(&self) -> Result<()> {
        self.with_conn(migrations::run)
    }

    pub fn drop_all(&self) -> Result<()> {
        self.with_conn(migrations::drop_all)
    }

    /// Drop and recreate every table, leaving an empty store.
    pub fn reset(&self) -> Result<()> {
        self.with_conn(|conn| {
            migrations::drop_all(conn)?;
            migrations::run(conn)
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| Error::LockPoisoned)?;
        conn.close().map_err(|(_, e)| Error::from(e))?;
        info!("Database closed");
        Ok(())
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        f(&conn)
    }

    /// Exclusive access, needed to open a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        f(&mut conn)
    }
}
