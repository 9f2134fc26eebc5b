use std::sync::Arc;

use warbler_auth::Argon2Hasher;
use warbler_db::Database;
use warbler_types::User;

/// Argon2id at the lowest cost the crate accepts.
#[allow(dead_code)]
pub fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::with_cost(1024, 1).expect("valid argon2 params")
}

/// Fresh in-memory store with cheap Argon2 costs.
pub fn fresh_db() -> Database {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    Database::open_in_memory(Arc::new(cheap_hasher())).expect("open in-memory db")
}

/// Sign up `testuser{n}` / `test{n}@test.com` with password `HASHED_PASSWORD`.
#[allow(dead_code)]
pub fn signup_n(db: &Database, n: u32) -> User {
    db.signup(
        &format!("testuser{n}"),
        &format!("test{n}@test.com"),
        Some("HASHED_PASSWORD"),
        None,
    )
    .expect("signup")
}
