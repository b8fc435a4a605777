//! Options of a handoff and of shutdown.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle event of the spawned unit that resumes the caller of
/// [`pass_to`](crate::Handle::pass_to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeEvent {
    /// The unit started running its body.
    Run,
    /// The unit suspended itself.
    Sleep,
    /// The unit terminated.
    Exit,
}

impl ResumeEvent {
    /// Returns the lowercase option value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Sleep => "sleep",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for ResumeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResumeEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(':') {
            "run" => Ok(Self::Run),
            "sleep" => Ok(Self::Sleep),
            "exit" => Ok(Self::Exit),
            other => Err(OptionError::UnknownEvent(other.to_string()).into()),
        }
    }
}

/// Misuse of the string form of the options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    /// The key is not a known option.
    #[error("unknown option: {0:?}")]
    UnknownKey(String),
    /// The resume event is not one of run, sleep, exit.
    #[error("unknown resume event: {0:?}")]
    UnknownEvent(String),
    /// A `key=value` pair without the `=`.
    #[error("malformed option: {0:?}")]
    Malformed(String),
}

impl From<OptionError> for Error {
    fn from(e: OptionError) -> Self {
        Self::invalid_option(e.to_string()).with_source(e)
    }
}

/// Options of [`pass_to`](crate::Handle::pass_to).
///
/// Without a resume event the caller sleeps until something wakes it
/// explicitly, usually the spawned body through the handle it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassOptions {
    /// Event that resumes the caller.
    #[serde(default)]
    pub resume_on: Option<ResumeEvent>,
}

impl PassOptions {
    /// Options that resume the caller on `event`.
    #[must_use]
    pub const fn resume_on(event: ResumeEvent) -> Self {
        Self {
            resume_on: Some(event),
        }
    }

    /// Options that leave waking the caller to the spawned unit.
    #[must_use]
    pub const fn manual() -> Self {
        Self { resume_on: None }
    }

    /// Builds options from `key, value` pairs.
    ///
    /// The only key is `resume_on`, with `run`, `sleep`, `exit` or `none`.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::manual();
        for (key, value) in pairs {
            match key.as_ref().trim().trim_start_matches(':') {
                "resume_on" => {
                    options.resume_on = match value.as_ref().trim() {
                        "none" | "" => None,
                        event => Some(event.parse()?),
                    };
                }
                other => return Err(OptionError::UnknownKey(other.to_string()).into()),
            }
        }
        Ok(options)
    }
}

impl From<ResumeEvent> for PassOptions {
    fn from(event: ResumeEvent) -> Self {
        Self::resume_on(event)
    }
}

impl From<Option<ResumeEvent>> for PassOptions {
    fn from(resume_on: Option<ResumeEvent>) -> Self {
        Self { resume_on }
    }
}

/// Parses `key=value` pairs separated by commas, e.g. `"resume_on=exit"`.
impl FromStr for PassOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pairs = s
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                pair.split_once('=')
                    .ok_or_else(|| OptionError::Malformed(pair.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pairs(pairs)
    }
}

/// What shutdown does to every unit on the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminateMethod {
    /// Kill each unit; it ends at its next suspension or checkpoint.
    #[default]
    Kill,
    /// Wait for each unit to end on its own.
    Join,
}

impl FromStr for TerminateMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kill" => Ok(Self::Kill),
            "join" => Ok(Self::Join),
            other => Err(Error::invalid_option(format!(
                "unknown terminate method: {other:?}"
            ))),
        }
    }
}
