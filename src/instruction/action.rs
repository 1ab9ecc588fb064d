use crate::macros::lock;
use crate::mediator::{ConnectionChange, ConnectivityObserver, Subscriptions};
use crate::validation::validate_action;
use crate::{
    ActionRequest, DeviceCategory, Dispatcher, Error, SupportedActions, Validation,
    ValidationIssue, ValidationState, select_action,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Persisted fields of a [`DeviceActionInstruction`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceActionSettings {
    /// Category whose driver runs the action.
    pub device_type: DeviceCategory,
    /// Selected action, by name. Empty when nothing is selected.
    pub action_name: String,
    /// Free-form parameters passed to the action.
    pub action_parameters: String,
    /// Actions advertised when the list was last resolved.
    pub supported_actions: SupportedActions,
    /// Selection stored by position in older documents.
    #[serde(skip_serializing)]
    action_index: Option<usize>,
}

impl DeviceActionSettings {
    /// Turn a position-based selection from an older document into a name.
    ///
    /// Positions are only meaningful against the list saved with them, so the
    /// lookup happens once, before the list can be refreshed.
    fn migrate_action_index(&mut self) {
        if let Some(index) = self.action_index.take() {
            if self.action_name.is_empty() {
                match self.supported_actions.get(index) {
                    Some(name) => self.action_name = name.to_owned(),
                    None => tracing::warn!(index, "Saved action index is out of range"),
                }
            }
        }
    }
}

#[derive(Debug)]
struct ActionState {
    settings: DeviceActionSettings,
    validation: Option<Validation>,
    output: Option<String>,
}

#[derive(Debug)]
struct Shared {
    dispatcher: Dispatcher,
    state: Mutex<ActionState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl Shared {
    fn validate(&self, state: &mut ActionState) -> bool {
        let mediator = self.dispatcher.registry().get(state.settings.device_type);
        let validation = validate_action(&**mediator, &state.settings.action_name);
        let valid = validation.is_valid();
        state.validation = Some(validation);
        valid
    }

    /// Re-read the supported actions and re-derive the selection.
    ///
    /// Returns whether the selected action changed.
    fn resolve_actions(&self, state: &mut ActionState) -> bool {
        let settings = &mut state.settings;
        let mediator = self.dispatcher.registry().get(settings.device_type);
        let _ = settings.supported_actions.refresh(&**mediator);

        let selected =
            select_action(&settings.action_name, &settings.supported_actions).unwrap_or_default();
        if selected == settings.action_name {
            false
        } else {
            settings.action_name = selected;
            true
        }
    }
}

impl ConnectivityObserver for Shared {
    fn connection_changed(&self, category: DeviceCategory, change: ConnectionChange) {
        let mut state = lock(&self.state);
        if category == state.settings.device_type {
            tracing::debug!(%category, %change, "Selected device changed connection state");
            let _ = self.resolve_actions(&mut state);
        }
        let _ = self.validate(&mut state);
    }
}

/// Sequence instruction that runs one driver-advertised action.
///
/// The instruction follows connectivity of every device while it exists; dropping it
/// releases those registrations.
#[derive(Debug)]
pub struct DeviceActionInstruction {
    shared: Arc<Shared>,
    _subscriptions: Subscriptions,
}

impl DeviceActionInstruction {
    /// Create an instruction with default settings.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::from_settings(dispatcher, DeviceActionSettings::default())
    }

    /// Restore an instruction from persisted settings.
    pub fn from_settings(dispatcher: Dispatcher, mut settings: DeviceActionSettings) -> Self {
        settings.migrate_action_index();

        let shared = Arc::new(Shared {
            state: Mutex::new(ActionState {
                settings,
                validation: None,
                output: None,
            }),
            in_flight: tokio::sync::Mutex::new(()),
            dispatcher,
        });
        let observer: Arc<dyn ConnectivityObserver> = Arc::<Shared>::clone(&shared);
        let subscriptions = shared.dispatcher.registry().observe(&observer);

        Self {
            shared,
            _subscriptions: subscriptions,
        }
    }

    /// Snapshot of the fields to persist.
    pub fn settings(&self) -> DeviceActionSettings {
        lock(&self.shared.state).settings.clone()
    }

    /// Selected device category.
    pub fn device_type(&self) -> DeviceCategory {
        lock(&self.shared.state).settings.device_type
    }

    /// Select another device category.
    ///
    /// Supported actions are resolved again; the selected action is kept if the new
    /// device advertises it, otherwise the first advertised action is selected.
    ///
    /// A disconnected device leaves the previous list in place until it connects.
    pub fn set_device_type(&self, category: DeviceCategory) {
        let mut state = lock(&self.shared.state);
        state.settings.device_type = category;
        let _ = self.shared.resolve_actions(&mut state);
        let _ = self.shared.validate(&mut state);
    }

    /// Selected action name; empty if none.
    pub fn action_name(&self) -> String {
        lock(&self.shared.state).settings.action_name.clone()
    }

    /// Select an action by name. Empty names are ignored.
    pub fn set_action_name(&self, name: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        let mut state = lock(&self.shared.state);
        state.settings.action_name = name;
        let _ = self.shared.validate(&mut state);
    }

    /// Position of the selected action in the supported list, for display.
    pub fn selected_index(&self) -> Option<usize> {
        let state = lock(&self.shared.state);
        state
            .settings
            .supported_actions
            .position(&state.settings.action_name)
    }

    /// Parameters passed to the action.
    pub fn action_parameters(&self) -> String {
        lock(&self.shared.state).settings.action_parameters.clone()
    }

    /// Change the parameters passed to the action.
    pub fn set_action_parameters(&self, parameters: impl Into<String>) {
        lock(&self.shared.state).settings.action_parameters = parameters.into();
    }

    /// Actions advertised when the list was last resolved.
    pub fn supported_actions(&self) -> SupportedActions {
        lock(&self.shared.state).settings.supported_actions.clone()
    }

    /// Resolve supported actions from the selected device again.
    ///
    /// If the selection had to change, the parameters are cleared since they
    /// belonged to the previous action.
    pub fn refresh_actions(&self) {
        let mut state = lock(&self.shared.state);
        if self.shared.resolve_actions(&mut state) {
            state.settings.action_parameters.clear();
        }
        let _ = self.shared.validate(&mut state);
    }

    /// Validate against the live device state; returns whether it's ready to run.
    pub fn validate(&self) -> bool {
        self.shared.validate(&mut lock(&self.shared.state))
    }

    /// Issues found by the last validation.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        lock(&self.shared.state)
            .validation
            .as_ref()
            .map(|validation| validation.issues.clone())
            .unwrap_or_default()
    }

    /// Result of the last validation.
    pub fn validation(&self) -> Option<Validation> {
        lock(&self.shared.state).validation.clone()
    }

    /// Coarse validation state.
    pub fn validation_state(&self) -> ValidationState {
        lock(&self.shared.state).validation.as_ref().into()
    }

    /// Output of the last successful run.
    pub fn output(&self) -> Option<String> {
        lock(&self.shared.state).output.clone()
    }

    /// Validate and run the selected action.
    ///
    /// An invalid instruction fails with [`Error::Invalid`] without contacting the driver.
    #[tracing::instrument(level = "debug", skip(self), fields(instruction = %self))]
    pub async fn execute(&self) -> Result<(), Error> {
        let _in_flight = self
            .shared
            .in_flight
            .try_lock()
            .map_err(|_busy| Error::Busy)?;

        let request = {
            let mut state = lock(&self.shared.state);
            if !self.shared.validate(&mut state) {
                let issues = state
                    .validation
                    .as_ref()
                    .map(|validation| validation.issues.clone())
                    .unwrap_or_default();
                return Err(Error::Invalid(issues));
            }
            ActionRequest {
                category: state.settings.device_type,
                action: state.settings.action_name.clone(),
                parameters: state.settings.action_parameters.clone(),
            }
        };

        let output = self.shared.dispatcher.run_action(&request).await?;
        lock(&self.shared.state).output = Some(output);
        Ok(())
    }
}

impl Clone for DeviceActionInstruction {
    /// Copies the persisted fields into a new instruction with its own registrations.
    fn clone(&self) -> Self {
        Self::from_settings(self.shared.dispatcher.clone(), self.settings())
    }
}

impl fmt::Display for DeviceActionInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings();
        write!(
            f,
            "Device Action, Device Type: {}, Action: {}, ActionParameters: {}",
            settings.device_type, settings.action_name, settings.action_parameters
        )
    }
}
