use std::fmt::{Display, Formatter};
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

// All except Internal are considered user-facing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    Internal(String),
    /// The frame id is outside the replacer capacity.
    InvalidFrame(usize),
    /// Removal targeted a tracked frame that is not evictable.
    RemoveNonEvictable(usize),
}

impl Error {
    pub fn internal<E: ToString>(msg: E) -> Error {
        Error::Internal(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(s) => write!(f, "{}", s),
            Error::InvalidFrame(frame_id) => write!(f, "invalid frame id {}", frame_id),
            Error::RemoveNonEvictable(frame_id) => {
                write!(f, "cannot remove non-evictable frame {}", frame_id)
            }
        }
    }
}

impl std::error::Error for Error {}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::internal(err)
    }
}
