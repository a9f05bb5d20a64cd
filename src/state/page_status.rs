/// Page status definitions for the harvest queue
///
/// A page enters the queue as `Ready` and leaves it as `Finished`. The
/// transition happens once and never reverses.
use std::fmt;

/// Represents the queue status of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Page was discovered and its images have not all been handled yet
    Ready,

    /// Every image of the page was saved or skipped
    Finished,
}

impl PageStatus {
    /// Converts the status to its database representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Finished => "FINISHED",
        }
    }

    /// Parses a status from its database representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "FINISHED" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all_statuses() -> [Self; 2] {
        [Self::Ready, Self::Finished]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
