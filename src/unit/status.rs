//! Lifecycle status and terminal outcome of an execution unit.

use core::fmt;

use crate::error::Error;

/// Lifecycle status of a unit, as observed from another unit.
///
/// `Indeterminate` is transient: the body has returned but the unit has not
/// published its outcome yet. Observers should look again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Executing (or ready to execute) its body.
    Runnable,
    /// Parked in [`sleep`](super::sleep) or another harness wait.
    Suspended,
    /// Ended without error (including being killed).
    TerminatedNormally,
    /// Ended with an error; see [`Unit::failure`](super::Unit::failure).
    TerminatedWithError,
    /// Mid-termination.
    Indeterminate,
}

impl Status {
    /// Returns true for either terminated status.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::TerminatedNormally | Self::TerminatedWithError)
    }

    /// Returns a short lowercase label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Runnable => "run",
            Self::Suspended => "sleep",
            Self::TerminatedNormally => "dead",
            Self::TerminatedWithError => "failed",
            Self::Indeterminate => "aborting",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a unit ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The body returned `Ok(())`.
    Completed,
    /// The unit was killed and unwound.
    Killed,
    /// The body returned an error or panicked.
    Failed(Error),
}

impl Outcome {
    /// Classifies the value a body returned.
    #[must_use]
    pub fn from_result(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(err) if err.is_killed() => Self::Killed,
            Err(err) => Self::Failed(err),
        }
    }

    /// Maps the outcome to the status observers see.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Completed | Self::Killed => Status::TerminatedNormally,
            Self::Failed(_) => Status::TerminatedWithError,
        }
    }

    /// Returns the failure, if the unit failed.
    #[must_use]
    pub fn failure(&self) -> Option<&Error> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Completed | Self::Killed => None,
        }
    }
}
