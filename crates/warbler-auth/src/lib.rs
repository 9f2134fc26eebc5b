/// Warbler credential hashing.
///
/// The store never sees plaintext passwords past signup/login: it is handed a
/// `CredentialHasher` and only keeps the opaque strings it produces. The
/// default implementation is Argon2id; swapping algorithms only requires a
/// new implementation of the trait.

pub mod password;

pub use password::{Argon2Hasher, CredentialHasher, HashError};
