use crate::macros::lock;
use crate::mediator::{ConnectionChange, ConnectivityObserver, Subscriptions};
use crate::validation::{validate_action, validate_command};
use crate::{
    ActionRequest, CommandOutput, CommandRequest, DeviceCategory, Dispatcher, Error,
    ResponseMode, SupportedActions, Validation, select_action,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ActionSide {
    device_type: DeviceCategory,
    connected: bool,
    supported_actions: SupportedActions,
    action_name: String,
    parameters: String,
    output: String,
    validation: Validation,
}

#[derive(Debug)]
struct CommandSide {
    device_type: DeviceCategory,
    connected: bool,
    mode: ResponseMode,
    command: String,
    raw: bool,
    output: String,
    validation: Validation,
}

impl Default for CommandSide {
    fn default() -> Self {
        Self {
            device_type: DeviceCategory::default(),
            connected: false,
            mode: ResponseMode::default(),
            command: String::new(),
            raw: true,
            output: String::new(),
            validation: Validation::default(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    dispatcher: Dispatcher,
    actions: Mutex<ActionSide>,
    commands: Mutex<CommandSide>,
    action_in_flight: tokio::sync::Mutex<()>,
    command_in_flight: tokio::sync::Mutex<()>,
}

impl Shared {
    fn refresh_action_side(&self, side: &mut ActionSide) {
        let mediator = self.dispatcher.registry().get(side.device_type);
        if mediator.info().connected {
            let _ = side.supported_actions.refresh(&**mediator);
        } else {
            side.supported_actions.clear();
        }
        side.action_name =
            select_action(&side.action_name, &side.supported_actions).unwrap_or_default();
        self.validate_action_side(side);
    }

    fn validate_action_side(&self, side: &mut ActionSide) {
        let mediator = self.dispatcher.registry().get(side.device_type);
        side.validation = validate_action(&**mediator, &side.action_name);
        side.connected = side.validation.refresh_enabled;
    }

    fn validate_command_side(&self, side: &mut CommandSide) {
        let mediator = self.dispatcher.registry().get(side.device_type);
        side.validation = validate_command(&**mediator, &side.command, Some(side.mode));
        side.connected = side.validation.refresh_enabled;
    }
}

impl ConnectivityObserver for Shared {
    fn connection_changed(&self, category: DeviceCategory, change: ConnectionChange) {
        {
            let mut side = lock(&self.actions);
            if category == side.device_type {
                match change {
                    ConnectionChange::Connected => self.refresh_action_side(&mut side),
                    ConnectionChange::Disconnected => {
                        side.supported_actions.clear();
                        self.validate_action_side(&mut side);
                    }
                }
            } else {
                self.validate_action_side(&mut side);
            }
        }
        self.validate_command_side(&mut lock(&self.commands));
    }
}

/// State behind the "Device Actions and Commands" panel.
///
/// The panel has two independent sides: one runs a driver-advertised action, the other
/// sends a raw command. Each side has its own device selection and output, and at most
/// one call in flight.
///
/// Unlike the sequence instructions, the panel forgets the advertised actions as soon as
/// the device it shows disconnects.
#[derive(Debug)]
pub struct DeviceActionsPanel {
    shared: Arc<Shared>,
    _subscriptions: Subscriptions,
}

impl DeviceActionsPanel {
    /// Title shown above the panel.
    pub const TITLE: &'static str = "Device Actions and Commands";

    /// Create the panel and start following device connectivity.
    pub fn new(dispatcher: Dispatcher) -> Self {
        let shared = Arc::new(Shared {
            dispatcher,
            actions: Mutex::default(),
            commands: Mutex::default(),
            action_in_flight: tokio::sync::Mutex::new(()),
            command_in_flight: tokio::sync::Mutex::new(()),
        });
        shared.refresh_action_side(&mut lock(&shared.actions));
        shared.validate_command_side(&mut lock(&shared.commands));

        let observer: Arc<dyn ConnectivityObserver> = Arc::<Shared>::clone(&shared);
        let subscriptions = shared.dispatcher.registry().observe(&observer);

        Self {
            shared,
            _subscriptions: subscriptions,
        }
    }

    /// Whether the device of `category` reports a connection right now.
    pub fn device_status(&self, category: DeviceCategory) -> bool {
        self.shared.dispatcher.registry().is_connected(category)
    }

    /// Device the action side runs actions on.
    pub fn action_device_type(&self) -> DeviceCategory {
        lock(&self.shared.actions).device_type
    }

    /// Switch the action side to another device and resolve its actions.
    pub fn set_action_device_type(&self, category: DeviceCategory) {
        let mut side = lock(&self.shared.actions);
        side.device_type = category;
        self.shared.refresh_action_side(&mut side);
    }

    /// Whether the action side's device is connected, as of the last update.
    pub fn action_device_connected(&self) -> bool {
        lock(&self.shared.actions).connected
    }

    /// Actions advertised by the action side's device.
    pub fn supported_actions(&self) -> SupportedActions {
        lock(&self.shared.actions).supported_actions.clone()
    }

    /// Selected action; empty if none.
    pub fn action_name(&self) -> String {
        lock(&self.shared.actions).action_name.clone()
    }

    /// Select an action by name.
    pub fn set_action_name(&self, name: impl Into<String>) {
        let mut side = lock(&self.shared.actions);
        side.action_name = name.into();
        self.shared.validate_action_side(&mut side);
    }

    /// Parameters passed to the action.
    pub fn action_parameters(&self) -> String {
        lock(&self.shared.actions).parameters.clone()
    }

    /// Change the parameters passed to the action.
    pub fn set_action_parameters(&self, parameters: impl Into<String>) {
        lock(&self.shared.actions).parameters = parameters.into();
    }

    /// Output of the last successful action.
    pub fn action_output(&self) -> String {
        lock(&self.shared.actions).output.clone()
    }

    /// Result of the last validation of the action side.
    pub fn action_validation(&self) -> Validation {
        lock(&self.shared.actions).validation.clone()
    }

    /// Resolve the action side's supported actions again.
    pub fn refresh_actions(&self) {
        self.shared.refresh_action_side(&mut lock(&self.shared.actions));
    }

    /// Run the selected action on the action side's device.
    pub async fn run_action(&self) -> Result<String, Error> {
        let _in_flight = self
            .shared
            .action_in_flight
            .try_lock()
            .map_err(|_busy| Error::Busy)?;

        let request = {
            let mut side = lock(&self.shared.actions);
            self.shared.validate_action_side(&mut side);
            if !side.validation.is_valid() {
                return Err(Error::Invalid(side.validation.issues.clone()));
            }
            ActionRequest {
                category: side.device_type,
                action: side.action_name.clone(),
                parameters: side.parameters.clone(),
            }
        };

        let output = self.shared.dispatcher.run_action(&request).await?;
        lock(&self.shared.actions).output.clone_from(&output);
        Ok(output)
    }

    /// Device the command side sends commands to.
    pub fn command_device_type(&self) -> DeviceCategory {
        lock(&self.shared.commands).device_type
    }

    /// Switch the command side to another device.
    pub fn set_command_device_type(&self, category: DeviceCategory) {
        let mut side = lock(&self.shared.commands);
        side.device_type = category;
        self.shared.validate_command_side(&mut side);
    }

    /// Whether the command side's device is connected, as of the last update.
    pub fn command_device_connected(&self) -> bool {
        lock(&self.shared.commands).connected
    }

    /// Entry point used to send commands.
    pub fn send_command_type(&self) -> ResponseMode {
        lock(&self.shared.commands).mode
    }

    /// Select the entry point used to send commands.
    pub fn set_send_command_type(&self, mode: ResponseMode) {
        lock(&self.shared.commands).mode = mode;
    }

    /// Command text.
    pub fn command(&self) -> String {
        lock(&self.shared.commands).command.clone()
    }

    /// Change the command text.
    pub fn set_command(&self, command: impl Into<String>) {
        let mut side = lock(&self.shared.commands);
        side.command = command.into();
        self.shared.validate_command_side(&mut side);
    }

    /// Whether commands are sent without protocol framing.
    pub fn raw(&self) -> bool {
        lock(&self.shared.commands).raw
    }

    /// Send commands with or without protocol framing.
    pub fn set_raw(&self, raw: bool) {
        lock(&self.shared.commands).raw = raw;
    }

    /// Response of the last successful `String` or `Boolean` command.
    pub fn command_output(&self) -> String {
        lock(&self.shared.commands).output.clone()
    }

    /// Result of the last validation of the command side.
    pub fn command_validation(&self) -> Validation {
        lock(&self.shared.commands).validation.clone()
    }

    /// Send the command on the command side's device.
    ///
    /// A blind command leaves the displayed output untouched.
    pub async fn run_command(&self) -> Result<CommandOutput, Error> {
        let _in_flight = self
            .shared
            .command_in_flight
            .try_lock()
            .map_err(|_busy| Error::Busy)?;

        let request = {
            let mut side = lock(&self.shared.commands);
            self.shared.validate_command_side(&mut side);
            if !side.validation.is_valid() {
                return Err(Error::Invalid(side.validation.issues.clone()));
            }
            CommandRequest {
                category: side.device_type,
                mode: side.mode,
                command: side.command.clone(),
                raw: side.raw,
            }
        };

        let output = self.shared.dispatcher.run_command(&request).await?;
        if let Some(text) = output.display_text() {
            lock(&self.shared.commands).output = text;
        }
        Ok(output)
    }
}
