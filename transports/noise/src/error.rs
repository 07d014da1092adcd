use thiserror::Error;

/// Protocol errors close exactly the offending connection; they never
/// propagate as exceptions out of the core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("noise message sent or read out of turn")]
    NoiseOutOfTurn,
    #[error("noise AEAD authentication failed")]
    NoiseAuthFail,
    #[error("noise cipher nonce space exhausted")]
    NonceOverflow,
    #[error("malformed noise record")]
    MalformedFrame,
}
