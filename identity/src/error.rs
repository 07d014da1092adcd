use thiserror::Error;

/// Errors surfaced by identity operations. These are all caller/input errors:
/// they never mutate state and never cross a network boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid Ed25519 public key encoding")]
    BadKey,
    #[error("invalid base58btc encoding")]
    BadBase58,
}
