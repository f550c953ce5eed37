//! Error taxonomy for the sync engine.

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::model::IdError;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Timeout, connection failure or non-success status. Recoverable: the
    /// pass is abandoned and retried on the next poll.
    #[error("remote request failed ({context}): {message}")]
    Transport { context: String, message: String },

    /// The remote answered but the payload was not what we expected.
    #[error("unexpected remote response ({context}): {message}")]
    Parse { context: String, message: String },

    /// A constraint in the local store rejected a write. Indicates a bug in
    /// the reconciler.
    #[error("local store integrity violation: {0}")]
    Integrity(#[source] sqlx::Error),

    #[error("local store error: {0}")]
    Store(#[source] sqlx::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl SyncError {
    pub fn transport(context: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Transport {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Errors that must stop the current pass outright rather than being
    /// logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Integrity(_) | SyncError::Store(_))
    }

    /// Errors that mean the remote as a whole is unusable right now.
    pub fn aborts_pass(&self) -> bool {
        self.is_fatal() || matches!(self, SyncError::Transport { .. })
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        let constraint = match &err {
            sqlx::Error::Database(db) => matches!(
                db.kind(),
                ErrorKind::ForeignKeyViolation
                    | ErrorKind::UniqueViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            _ => false,
        };
        if constraint {
            SyncError::Integrity(err)
        } else {
            SyncError::Store(err)
        }
    }
}
