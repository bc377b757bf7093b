//! Error types for registry lifecycle transitions and allocation requests.

use thiserror::Error;

/// Rejected lifecycle transition.
///
/// A rejected transition never mutates the registry: the state and the
/// installed capabilities are exactly what they were before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// A configuration is already active; `cleanup` must run first.
    #[error("allocator registry is already initialized")]
    AlreadyInitialized,
    /// No configuration is active.
    #[error("allocator registry is not initialized")]
    NotInitialized,
}

/// Failed allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The active allocator returned no block for a nonzero request.
    /// Any block passed to a failed reallocation is still valid.
    #[error("allocation of {requested} bytes failed")]
    Exhausted { requested: usize },
    /// The registry was reconfigured after the block was obtained, so the
    /// block can no longer be handed back to the allocator that owns it.
    #[error("allocator configuration changed while the block was live")]
    StaleConfiguration,
}

impl AllocError {
    /// Requested size for exhaustion failures.
    #[must_use]
    pub const fn requested(self) -> Option<usize> {
        match self {
            Self::Exhausted { requested } => Some(requested),
            Self::StaleConfiguration => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_render_readable_messages() {
        assert_eq!(
            LifecycleError::AlreadyInitialized.to_string(),
            "allocator registry is already initialized"
        );
        assert_eq!(
            LifecycleError::NotInitialized.to_string(),
            "allocator registry is not initialized"
        );
    }

    #[test]
    fn exhausted_carries_requested_size() {
        let err = AllocError::Exhausted { requested: 64 };
        assert_eq!(err.requested(), Some(64));
        assert_eq!(err.to_string(), "allocation of 64 bytes failed");
        assert_eq!(AllocError::StaleConfiguration.requested(), None);
    }
}
