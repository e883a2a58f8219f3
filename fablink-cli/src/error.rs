//! Error taxonomy for the bootstrap flow.
//!
//! Every fallible operation returns one of these variants; the mapping to a
//! process exit code happens once, in `main`.

use fablink_core::ProfileError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A remote endpoint could not be reached, or answered outside 2xx.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A required resource does not exist (empty candidate list, or an
    /// override that matched nothing).
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote service understood the request and refused it.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Interactive or environmental input could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Local configuration is incomplete.
    #[error("configuration: {0}")]
    Config(String),

    /// Key or certificate material could not be produced.
    #[error("identity material: {0}")]
    Identity(String),

    /// The on-disk wallet is unreadable or holds a corrupt entry.
    #[error("wallet: {0}")]
    Wallet(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl Error {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Transport(_) => 2,
            Error::NotFound(_) => 3,
            Error::Rejected(_) => 4,
            Error::MalformedInput(_) | Error::Config(_) => 5,
            _ => 1,
        }
    }
}
