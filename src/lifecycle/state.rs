//! Lifecycle states.

use std::fmt;

/// Where an orchestrator is in its one-way lifecycle.
///
/// ```text
/// Uninitialized → Initialized → Active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Uninitialized,
    /// Pipeline built, loaders initialized.
    Initialized,
    /// `start` has run; configuration callbacks are refused.
    Active,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Active => "active",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(LifecycleState::Uninitialized < LifecycleState::Initialized);
        assert!(LifecycleState::Initialized < LifecycleState::Active);
        assert_eq!(LifecycleState::Active.to_string(), "active");
    }
}
