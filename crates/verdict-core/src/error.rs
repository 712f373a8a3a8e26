//! Kinded errors shared by every verdict crate.
//!
//! Operations fail with an [`Error`] carrying a [`Kind`]. Kinds survive
//! wrapping: [`Error::wrap`] composes a new message around a cause while
//! keeping the cause's kind, so a storage `NotFound` is still `NotFound`
//! after the service layer has annotated it. The transport maps the
//! outermost kind to an HTTP status code.

use std::fmt;

/// Classification of an error, translated to a status code at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The addressed entity does not exist.
    NotFound,
    /// The entity being created already exists.
    Exist,
    /// The request is malformed or violates a precondition.
    BadRequest,
    /// The operation is not allowed in the current state.
    Forbidden,
    /// A collaborator is temporarily unreachable; retrying may help.
    ServiceUnavailable,
    /// An unexpected internal failure.
    Internal,
    /// A failure that does not fit any other kind.
    Unknown,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Exist => write!(f, "exist"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::Internal => write!(f, "internal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An error with a kind and a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: Kind,
    message: String,
}

impl Error {
    /// Creates a new error with an explicit kind.
    #[must_use]
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Kind::NotFound, message)
    }

    /// Creates a new `Exist` error.
    #[must_use]
    pub fn exist(message: impl Into<String>) -> Self {
        Self::new(Kind::Exist, message)
    }

    /// Creates a new `BadRequest` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Kind::BadRequest, message)
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(Kind::Forbidden, message)
    }

    /// Creates a new `ServiceUnavailable` error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(Kind::ServiceUnavailable, message)
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Kind::Internal, message)
    }

    /// Creates a new `Unknown` error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Kind::Unknown, message)
    }

    /// Wraps a cause in a new message, preserving the cause's kind.
    #[must_use]
    pub fn wrap(message: impl Into<String>, cause: &Error) -> Self {
        Self {
            kind: cause.kind,
            message: format!("{}: {}", message.into(), cause.message),
        }
    }

    /// Wraps an arbitrary cause in a new message with an explicit kind.
    #[must_use]
    pub fn wrap_with(kind: Kind, message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            kind,
            message: format!("{}: {cause}", message.into()),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns the message without the kind.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == Kind::NotFound
    }

    /// Returns `true` if this is an `Exist` error.
    #[must_use]
    pub fn is_exist(&self) -> bool {
        self.kind == Kind::Exist
    }

    /// Returns `true` if this is a `Forbidden` error.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.kind == Kind::Forbidden
    }

    /// Returns `true` if this is a `ServiceUnavailable` error.
    #[must_use]
    pub fn is_service_unavailable(&self) -> bool {
        self.kind == Kind::ServiceUnavailable
    }
}

/// Type alias for results carrying a kinded [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
