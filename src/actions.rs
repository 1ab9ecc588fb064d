use crate::DeviceMediator;
use serde::{Deserialize, Serialize};

/// Cached list of action names advertised by a driver, in driver order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedActions(Vec<String>);

impl SupportedActions {
    /// Re-read the list from `mediator`.
    ///
    /// A disconnected mediator leaves the cached list untouched.
    pub fn refresh(&mut self, mediator: &dyn DeviceMediator) -> &[String] {
        let info = mediator.info();
        if info.connected {
            self.0 = info.supported_actions;
        } else {
            tracing::debug!(
                category = %mediator.category(),
                cached = self.0.len(),
                "Device is disconnected, keeping cached actions",
            );
        }
        &self.0
    }

    /// Forget all cached actions.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Whether `action` is in the list.
    pub fn contains(&self, action: &str) -> bool {
        self.0.iter().any(|candidate| candidate == action)
    }

    /// Position of `action` in the list, for display purposes.
    pub fn position(&self, action: &str) -> Option<usize> {
        self.0.iter().position(|candidate| candidate == action)
    }

    /// Action at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Cached action names.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of cached actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no actions are cached.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for SupportedActions {
    fn from(actions: Vec<String>) -> Self {
        Self(actions)
    }
}

/// Pick the action to show after the list of actions changed.
///
/// Keeps `current` while it's still advertised, otherwise falls back to the first action.
pub fn select_action(current: &str, actions: &SupportedActions) -> Option<String> {
    if actions.contains(current) {
        Some(current.to_owned())
    } else {
        actions.get(0).map(str::to_owned)
    }
}
