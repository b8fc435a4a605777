//! Error types and error handling strategy for Baton.
//!
//! Every failure the harness reports is an [`Error`]. Error handling follows
//! these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Misuse is reported synchronously, at the call that caused it
//! - A failure inside a spawned unit is carried to the unit that is waiting
//!   on it, so a test never completes silently while a child failed
//! - Panics inside units are caught and converted to [`ErrorKind::Panicked`]
//!
//! # Error Categories
//!
//! - **Misuse**: unknown option key or value, unknown registered name, calling
//!   a blocking operation from the worker
//! - **Protocol**: the awaited lifecycle event can no longer happen
//! - **Propagated**: a failure raised inside a spawned unit (or raised into a
//!   unit by another one)
//! - **Lifecycle**: the unit or the coordinator is being torn down
//! - **Internal**: configuration and OS-level failures
//!
//! `Error` is `Clone`: the same failure is kept by the terminated unit (for
//! [`Unit::join`](crate::unit::Unit::join)) and re-raised in its caller.

use core::fmt;
use std::sync::Arc;

use crate::registry::Name;
use crate::unit::UnitId;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Misuse ===
    /// Unknown option key or unknown resume event.
    InvalidOption,
    /// No body has been declared under the requested name.
    UnknownName,
    /// The call would block the current unit forever: a blocking operation
    /// issued from the worker itself, or a unit joining itself.
    WouldDeadlock,

    // === Protocol ===
    /// The awaited suspension can no longer happen: the target terminated.
    CannotResume,

    // === Propagated ===
    /// Error raised into a unit through [`Unit::raise`](crate::unit::Unit::raise).
    Raised,
    /// The unit's body panicked.
    Panicked,
    /// Failure returned by a unit's body.
    User,

    // === Lifecycle ===
    /// The unit was terminated by [`Unit::kill`](crate::unit::Unit::kill).
    Killed,
    /// The coordinator has shut down and no longer accepts work.
    Shutdown,

    // === Internal ===
    /// The OS refused to create a thread for a unit.
    Spawn,
    /// Invalid configuration value.
    Config,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidOption | Self::UnknownName | Self::WouldDeadlock => ErrorCategory::Misuse,
            Self::CannotResume => ErrorCategory::Protocol,
            Self::Raised | Self::Panicked | Self::User => ErrorCategory::Propagated,
            Self::Killed | Self::Shutdown => ErrorCategory::Lifecycle,
            Self::Spawn | Self::Config => ErrorCategory::Internal,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The harness was used incorrectly; raised at the offending call.
    Misuse,
    /// The awaited lifecycle event became impossible.
    Protocol,
    /// A failure that originated inside a unit.
    Propagated,
    /// Teardown of a unit or of the coordinator.
    Lifecycle,
    /// Configuration or OS failures.
    Internal,
}

/// Diagnostic context for an error: the unit where it originated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The unit where the error originated.
    pub unit: Option<UnitId>,
    /// The name the originating unit was spawned under.
    pub name: Option<Name>,
}

/// The main error type for Baton operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                unit: None,
                name: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error reports a protocol violation.
    #[must_use]
    pub const fn is_cannot_resume(&self) -> bool {
        matches!(self.kind, ErrorKind::CannotResume)
    }

    /// Returns true if this error reports that the unit was killed.
    ///
    /// A unit that ends with such an error counts as terminated normally.
    #[must_use]
    pub const fn is_killed(&self) -> bool {
        matches!(self.kind, ErrorKind::Killed)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Creates a body failure with the given message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Creates an error suitable for [`Unit::raise`](crate::unit::Unit::raise).
    #[must_use]
    pub fn raised(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Raised).with_message(msg)
    }

    /// Creates the protocol violation reported when a unit that was expected
    /// to suspend terminated instead.
    #[must_use]
    pub fn cannot_resume(name: &Name) -> Self {
        Self::new(ErrorKind::CannotResume)
            .with_message(format!("{name} exited instead of sleeping"))
    }

    /// Creates an unknown-name error.
    #[must_use]
    pub fn unknown_name(name: &Name) -> Self {
        Self::new(ErrorKind::UnknownName).with_message(format!("unknown name: {name}"))
    }

    /// Creates an invalid-option error.
    #[must_use]
    pub fn invalid_option(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOption).with_message(detail)
    }

    /// Creates a panicked error from a caught panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Creates the error delivered to a unit terminated by `kill`.
    #[must_use]
    pub fn killed() -> Self {
        Self::new(ErrorKind::Killed)
    }

    /// Creates the error returned when the coordinator no longer accepts work.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::new(ErrorKind::Shutdown).with_message("coordinator has shut down")
    }

    /// Creates a would-deadlock error.
    #[must_use]
    pub fn would_deadlock(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::WouldDeadlock).with_message(detail)
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Spawn)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for Baton operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
