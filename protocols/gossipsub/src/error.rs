use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not subscribed to this topic")]
    NotSubscribed,
    #[error("malformed gossipsub RPC frame")]
    MalformedFrame,
    #[error("message cache is full for this window")]
    McacheFull,
}
