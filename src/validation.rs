use crate::{DeviceCategory, DeviceMediator, ResponseMode};
use thiserror::Error;

/// A problem that prevents an action or command from being run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// The device for the selected category isn't connected.
    #[error("{0} not connected")]
    NotConnected(DeviceCategory),
    /// The selected action isn't advertised by the driver.
    #[error("{0} is not an available driver action")]
    UnknownAction(String),
    /// The driver doesn't advertise any actions.
    #[error("No actions available")]
    NoActionsAvailable,
    /// Actions exist but none is selected.
    #[error("The action name to use is not selected")]
    ActionNotSelected,
    /// The raw command text is empty.
    #[error("No command has been provided")]
    EmptyCommand,
    /// No (or an unrecognised) response mode is set for a raw command.
    #[error("Response mode is not set")]
    ResponseModeUnset,
}

/// Result of validating an action or a raw command against the live device state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Problems in the order they were found; empty when ready to run.
    pub issues: Vec<ValidationIssue>,
    /// Whether the driver currently advertises any actions.
    pub has_actions: bool,
    /// Whether the action list can be refreshed, i.e. the device is connected.
    pub refresh_enabled: bool,
}

impl Validation {
    /// Whether there are no issues.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Coarse validation state for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// Nothing has been validated yet.
    #[default]
    Unvalidated,
    /// The last validation found no issues.
    Valid,
    /// The last validation found at least one issue.
    Invalid,
}

impl From<Option<&Validation>> for ValidationState {
    fn from(validation: Option<&Validation>) -> Self {
        match validation {
            None => Self::Unvalidated,
            Some(validation) if validation.is_valid() => Self::Valid,
            Some(_) => Self::Invalid,
        }
    }
}

/// Validate running `action` on `mediator`.
///
/// Checks stop at the first failing rule: connection, then action availability,
/// then selection, then membership.
pub fn validate_action(mediator: &dyn DeviceMediator, action: &str) -> Validation {
    let info = mediator.info();
    let mut validation = Validation {
        issues: Vec::new(),
        has_actions: !info.supported_actions.is_empty(),
        refresh_enabled: info.connected,
    };

    let issue = if !info.connected {
        Some(ValidationIssue::NotConnected(mediator.category()))
    } else if info.supported_actions.is_empty() {
        Some(ValidationIssue::NoActionsAvailable)
    } else if action.is_empty() {
        Some(ValidationIssue::ActionNotSelected)
    } else if !info.supported_actions.iter().any(|supported| supported == action) {
        Some(ValidationIssue::UnknownAction(action.to_owned()))
    } else {
        None
    };

    validation.issues.extend(issue);
    validation
}

/// Validate sending `command` to `mediator` with the given response mode.
///
/// Every applicable issue is reported.
pub fn validate_command(
    mediator: &dyn DeviceMediator,
    command: &str,
    mode: Option<ResponseMode>,
) -> Validation {
    let info = mediator.info();
    let mut issues = Vec::new();

    if command.trim().is_empty() {
        issues.push(ValidationIssue::EmptyCommand);
    }
    if !info.connected {
        issues.push(ValidationIssue::NotConnected(mediator.category()));
    }
    if mode.is_none() {
        issues.push(ValidationIssue::ResponseModeUnset);
    }

    Validation {
        issues,
        has_actions: !info.supported_actions.is_empty(),
        refresh_enabled: info.connected,
    }
}
