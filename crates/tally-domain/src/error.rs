use uuid::Uuid;

use crate::actor::Role;
use crate::status::TransitionError;

/// Typed outcome taxonomy for every core operation.
///
/// The first four variants are *expected* outcomes surfaced directly to the
/// calling boundary; `Internal` is the generic wrapper for anything else
/// (logged at the point of failure, entity state left unmodified).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Precondition, state, or input violation the caller can fix.
    Validation(String),
    /// Entity absent, or outside the actor's firm scope.
    NotFound { entity: &'static str, id: Uuid },
    /// Concurrent duplicate creation or a lost version race.
    Conflict(String),
    /// The actor's role lacks the capability.
    Permission { role: Role, action: &'static str },
    /// Unexpected failure (artifact store IO, audit bootstrap, ...).
    Internal(String),
}

/// Coarse kind for transport mapping (400/404/409/403/500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Permission,
    Internal,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        DomainError::NotFound { entity, id }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }

    pub fn permission(role: Role, action: &'static str) -> Self {
        DomainError::Permission { role, action }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DomainError::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Permission { .. } => ErrorKind::Permission,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status the transport edge maps this error to.
    pub fn transport_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Permission => 403,
            ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::Validation(msg) => write!(f, "validation error: {msg}"),
            DomainError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            DomainError::Conflict(msg) => write!(f, "conflict: {msg}"),
            DomainError::Permission { role, action } => {
                write!(f, "role {} may not {}", role.as_str(), action)
            }
            DomainError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<TransitionError> for DomainError {
    fn from(e: TransitionError) -> Self {
        DomainError::Validation(e.to_string())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_mapping_matches_kind() {
        assert_eq!(DomainError::validation("x").transport_status(), 400);
        assert_eq!(
            DomainError::not_found("pay_run", Uuid::nil()).transport_status(),
            404
        );
        assert_eq!(DomainError::conflict("x").transport_status(), 409);
        assert_eq!(
            DomainError::permission(Role::Preparer, "approve").transport_status(),
            403
        );
    }
}
