#![forbid(unsafe_code)]

/// Lifecycle of one user-triggered request: idle, then pending, then either
/// succeeded or failed. Only `Pending` blocks a new attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActionState<T> {
    #[default]
    Idle,
    Pending,
    Succeeded(T),
    Failed(String),
}

impl<T> ActionState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        !self.is_pending()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ActionState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionState::Failed(message) => Some(message),
            _ => None,
        }
    }
}
