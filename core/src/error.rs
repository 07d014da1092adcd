use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed multiaddr: {0}")]
    BadAddr(String),
}
