use rusqlite::ErrorCode;
use thiserror::Error;
use warbler_auth::HashError;

#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching the database.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A unique, not-null, check or foreign-key constraint failed. The
    /// enclosing transaction has been rolled back.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Hash(HashError),

    #[error(transparent)]
    Sqlite(rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
                Error::Integrity(msg.unwrap_or_else(|| err.to_string()))
            }
            other => Error::Sqlite(other),
        }
    }
}

impl From<HashError> for Error {
    fn from(e: HashError) -> Self {
        match e {
            HashError::EmptyPassword => Error::Validation("password must not be empty".into()),
            other => Error::Hash(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_becomes_validation_error() {
        let err: Error = HashError::EmptyPassword.into();
        assert!(err.is_validation());
    }

    #[test]
    fn hashing_failure_keeps_its_source() {
        let err: Error = HashError::Hash("bad params".into()).into();
        assert!(matches!(err, Error::Hash(HashError::Hash(ref msg)) if msg == "bad params"));
        assert_eq!(err.to_string(), "password hashing failed: bad params");
    }

    #[test]
    fn other_sqlite_errors_pass_through() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Sqlite(rusqlite::Error::QueryReturnedNoRows)));
    }
}
