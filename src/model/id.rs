//! Typed identities for items and folders.
//!
//! Remote identities arrive as strings, sometimes composite (`"1:1234"`).
//! They are parsed once here; nothing past the remote boundary carries the
//! raw string around.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("empty identifier")]
    Empty,
    #[error("identifier '{0}' has no numeric component")]
    NotNumeric(String),
    #[error("folder identifier '{0}' contains whitespace")]
    Whitespace(String),
    #[error("identifier '{0}' is out of range")]
    OutOfRange(String),
}

/// Identity of a note or deviation.
///
/// The remote assigns these in creation order, so ordering by `ItemId` is
/// ordering by creation time. This is what the frontier relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    /// Sentinel frontier for a folder that has never been synced.
    pub const ZERO: ItemId = ItemId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parse a plain (`"1234"`) or composite (`"<opaque>:1234"`) identifier.
    /// Only the trailing component counts; it must be numeric.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        let tail = raw.rsplit(':').next().unwrap_or(raw).trim();
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::NotNumeric(raw.to_string()));
        }
        let n = tail
            .parse::<u64>()
            .map_err(|_| IdError::OutOfRange(raw.to_string()))?;
        Self::try_from(n).map_err(|_| IdError::OutOfRange(raw.to_string()))
    }

    /// Value as stored in SQLite (INTEGER is signed 64-bit). Construction
    /// through `parse` or `try_from` keeps it in range.
    pub fn as_db(self) -> i64 {
        self.0 as i64
    }

    pub fn from_db(raw: i64) -> Self {
        Self(raw as u64)
    }
}

impl FromStr for ItemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ids the store can hold: at most `i64::MAX`.
impl TryFrom<u64> for ItemId {
    type Error = IdError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if i64::try_from(raw).is_err() {
            return Err(IdError::OutOfRange(raw.to_string()));
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a folder: numeric, or a reserved symbolic token such as
/// `"unread"`.
///
/// Both forms share one text key (see [`FolderId::key`]), which is what the
/// store persists and what equality is based on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FolderId {
    Numeric(u64),
    Symbolic(String),
}

impl FolderId {
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(IdError::Whitespace(raw.to_string()));
        }
        // "007" stays symbolic so that the key round-trips unchanged
        let canonical_number = raw.bytes().all(|b| b.is_ascii_digit())
            && (raw == "0" || !raw.starts_with('0'));
        if canonical_number && let Ok(n) = raw.parse::<u64>() {
            return Ok(Self::Numeric(n));
        }
        Ok(Self::Symbolic(raw.to_string()))
    }

    pub fn symbolic(token: &str) -> Self {
        Self::Symbolic(token.to_string())
    }

    /// Text key used for persistence and comparison.
    pub fn key(&self) -> String {
        match self {
            Self::Numeric(n) => n.to_string(),
            Self::Symbolic(s) => s.clone(),
        }
    }
}

impl FromStr for FolderId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for FolderId {
    fn from(raw: u64) -> Self {
        Self::Numeric(raw)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Symbolic(s) => f.write_str(s),
        }
    }
}
