use crate::macros::lock;
use crate::mediator::{ConnectionChange, ConnectivityObserver, Subscriptions};
use crate::validation::validate_command;
use crate::{
    CommandOutput, CommandRequest, DeviceCategory, Dispatcher, Error, ResponseMode, Validation,
    ValidationIssue, ValidationState,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Persisted fields of a [`SendCommandInstruction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SendCommandSettings {
    /// Category whose driver receives the command.
    pub device_type: DeviceCategory,
    /// Entry point to use. `None` when the stored value wasn't recognised.
    #[serde(deserialize_with = "lenient_response_mode")]
    pub send_command_type: Option<ResponseMode>,
    /// Command text.
    pub command: String,
    /// Send the text without protocol framing.
    pub raw: bool,
}

impl Default for SendCommandSettings {
    fn default() -> Self {
        Self {
            device_type: DeviceCategory::default(),
            send_command_type: Some(ResponseMode::default()),
            command: String::new(),
            raw: true,
        }
    }
}

/// Accept a response mode stored either as its discriminant or by name.
///
/// Anything else loads as `None` so the instruction reports it instead of failing to load.
fn lenient_response_mode<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ResponseMode>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Index(u64),
        Name(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Stored::deserialize(deserializer)? {
        Stored::Index(index) => u8::try_from(index)
            .ok()
            .and_then(|index| ResponseMode::try_from(index).ok()),
        Stored::Name(name) => ResponseMode::from_name(&name),
        Stored::Other(_) => None,
    })
}

#[derive(Debug)]
struct CommandState {
    settings: SendCommandSettings,
    validation: Option<Validation>,
    output: Option<String>,
}

#[derive(Debug)]
struct Shared {
    dispatcher: Dispatcher,
    state: Mutex<CommandState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl Shared {
    fn validate(&self, state: &mut CommandState) -> bool {
        let settings = &state.settings;
        let mediator = self.dispatcher.registry().get(settings.device_type);
        let validation =
            validate_command(&**mediator, &settings.command, settings.send_command_type);
        let valid = validation.is_valid();
        state.validation = Some(validation);
        valid
    }
}

impl ConnectivityObserver for Shared {
    fn connection_changed(&self, category: DeviceCategory, change: ConnectionChange) {
        tracing::trace!(%category, %change, "Revalidating raw command");
        let _ = self.validate(&mut lock(&self.state));
    }
}

/// Sequence instruction that sends one raw command to a device.
#[derive(Debug)]
pub struct SendCommandInstruction {
    shared: Arc<Shared>,
    _subscriptions: Subscriptions,
}

impl SendCommandInstruction {
    /// Create an instruction with default settings.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::from_settings(dispatcher, SendCommandSettings::default())
    }

    /// Restore an instruction from persisted settings.
    pub fn from_settings(dispatcher: Dispatcher, settings: SendCommandSettings) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(CommandState {
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
    pub fn settings(&self) -> SendCommandSettings {
        lock(&self.shared.state).settings.clone()
    }

    /// Selected device category.
    pub fn device_type(&self) -> DeviceCategory {
        lock(&self.shared.state).settings.device_type
    }

    /// Select another device category and revalidate.
    pub fn set_device_type(&self, category: DeviceCategory) {
        let mut state = lock(&self.shared.state);
        state.settings.device_type = category;
        let _ = self.shared.validate(&mut state);
    }

    /// Selected response mode.
    pub fn send_command_type(&self) -> Option<ResponseMode> {
        lock(&self.shared.state).settings.send_command_type
    }

    /// Select the entry point used to send the command.
    pub fn set_send_command_type(&self, mode: ResponseMode) {
        let mut state = lock(&self.shared.state);
        state.settings.send_command_type = Some(mode);
        let _ = self.shared.validate(&mut state);
    }

    /// Command text.
    pub fn command(&self) -> String {
        lock(&self.shared.state).settings.command.clone()
    }

    /// Change the command text.
    pub fn set_command(&self, command: impl Into<String>) {
        let mut state = lock(&self.shared.state);
        state.settings.command = command.into();
        let _ = self.shared.validate(&mut state);
    }

    /// Whether the command is sent without protocol framing.
    pub fn raw(&self) -> bool {
        lock(&self.shared.state).settings.raw
    }

    /// Send the command with or without protocol framing.
    pub fn set_raw(&self, raw: bool) {
        lock(&self.shared.state).settings.raw = raw;
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

    /// Coarse validation state.
    pub fn validation_state(&self) -> ValidationState {
        lock(&self.shared.state).validation.as_ref().into()
    }

    /// Response of the last successful `String` or `Boolean` command.
    ///
    /// A successful blind command clears it.
    pub fn output(&self) -> Option<String> {
        lock(&self.shared.state).output.clone()
    }

    /// Validate and send the command.
    #[tracing::instrument(level = "debug", skip(self), fields(instruction = %self))]
    pub async fn execute(&self) -> Result<CommandOutput, Error> {
        let _in_flight = self
            .shared
            .in_flight
            .try_lock()
            .map_err(|_busy| Error::Busy)?;

        let request = {
            let mut state = lock(&self.shared.state);
            let valid = self.shared.validate(&mut state);
            match state.settings.send_command_type {
                Some(mode) if valid => CommandRequest {
                    category: state.settings.device_type,
                    mode,
                    command: state.settings.command.clone(),
                    raw: state.settings.raw,
                },
                _ => {
                    let issues = state
                        .validation
                        .as_ref()
                        .map(|validation| validation.issues.clone())
                        .unwrap_or_default();
                    return Err(Error::Invalid(issues));
                }
            }
        };

        let output = self.shared.dispatcher.run_command(&request).await?;
        lock(&self.shared.state).output = output.display_text();
        Ok(output)
    }
}

impl Clone for SendCommandInstruction {
    /// Copies the persisted fields into a new instruction with its own registrations.
    fn clone(&self) -> Self {
        Self::from_settings(self.shared.dispatcher.clone(), self.settings())
    }
}

impl fmt::Display for SendCommandInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings();
        write!(f, "Send Command, Device Type: {}, SendCommand Type: ", settings.device_type)?;
        match settings.send_command_type {
            Some(mode) => write!(f, "{mode}")?,
            None => f.write_str("<unset>")?,
        }
        write!(f, ", Command: {}, Raw: {}", settings.command, settings.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ASCOMError;
    use crate::test_utils::{MockRegistry, RecordedCall};

    fn settings(category: DeviceCategory, mode: ResponseMode, command: &str) -> SendCommandSettings {
        SendCommandSettings {
            device_type: category,
            send_command_type: Some(mode),
            command: command.to_owned(),
            ..SendCommandSettings::default()
        }
    }

    #[test]
    fn defaults() {
        let defaults = SendCommandSettings::default();
        assert_eq!(defaults.device_type, DeviceCategory::Telescope);
        assert_eq!(defaults.send_command_type, Some(ResponseMode::String));
        assert!(defaults.raw);
        assert!(defaults.command.is_empty());
    }

    #[tokio::test]
    async fn string_command_stores_response() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let telescope = env.mock(DeviceCategory::Telescope);
        telescope.set_connected(true);
        telescope.set_string_result(Ok("12:34:56#".to_owned()));

        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            settings(DeviceCategory::Telescope, ResponseMode::String, ":GR#"),
        );
        let output = instruction.execute().await?;

        assert_eq!(output, CommandOutput::Text("12:34:56#".to_owned()));
        assert_eq!(instruction.output().as_deref(), Some("12:34:56#"));
        assert_eq!(
            telescope.calls(),
            [RecordedCall::String {
                command: ":GR#".to_owned(),
                raw: true
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn blind_command_clears_output() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let dome = env.mock(DeviceCategory::Dome);
        dome.set_connected(true);
        dome.set_bool_result(Ok(false));

        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            settings(DeviceCategory::Dome, ResponseMode::Boolean, "SHUTTER?"),
        );
        let _ = instruction.execute().await?;
        assert_eq!(instruction.output().as_deref(), Some("false"));

        instruction.set_send_command_type(ResponseMode::Blind);
        instruction.set_raw(false);
        assert_eq!(instruction.execute().await?, CommandOutput::Sent);
        assert_eq!(instruction.output(), None);
        assert_eq!(
            dome.calls().last(),
            Some(&RecordedCall::Blind {
                command: "SHUTTER?".to_owned(),
                raw: false
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_command_is_not_sent() {
        let env = MockRegistry::new();
        let focuser = env.mock(DeviceCategory::Focuser);

        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            SendCommandSettings {
                device_type: DeviceCategory::Focuser,
                send_command_type: None,
                ..SendCommandSettings::default()
            },
        );
        let err = instruction
            .execute()
            .await
            .expect_err("invalid command must not be sent");

        assert!(
            matches!(&err, Error::Invalid(issues) if issues.len() == 3),
            "{err:?}"
        );
        assert!(focuser.calls().is_empty());
        assert_eq!(instruction.validation_state(), ValidationState::Invalid);
    }

    #[tokio::test]
    async fn driver_failure_is_returned() {
        let env = MockRegistry::new();
        let switch = env.mock(DeviceCategory::Switch);
        switch.set_connected(true);
        switch.set_string_result(Err(ASCOMError::NOT_IMPLEMENTED));

        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            settings(DeviceCategory::Switch, ResponseMode::String, "PING"),
        );
        assert!(matches!(
            instruction.execute().await,
            Err(Error::Driver {
                category: DeviceCategory::Switch,
                ..
            })
        ));
        assert_eq!(instruction.output(), None);
        assert_eq!(env.notifications.errors().len(), 1);
    }

    #[test]
    fn revalidates_on_connectivity_change() {
        let env = MockRegistry::new();
        let weather = env.mock(DeviceCategory::WeatherData);
        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            settings(DeviceCategory::WeatherData, ResponseMode::String, "RAIN?"),
        );
        assert_eq!(instruction.validation_state(), ValidationState::Unvalidated);

        weather.set_connected(true);
        assert_eq!(instruction.validation_state(), ValidationState::Valid);

        weather.set_connected(false);
        assert_eq!(
            instruction.issues(),
            [ValidationIssue::NotConnected(DeviceCategory::WeatherData)]
        );
    }

    #[test]
    fn persisted_format() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let instruction = SendCommandInstruction::from_settings(
            env.dispatcher(),
            settings(DeviceCategory::FlatDevice, ResponseMode::Blind, "LIGHT ON"),
        );

        assert_eq!(
            serde_json::to_value(instruction.settings())?,
            serde_json::json!({
                "DeviceType": 3,
                "SendCommandType": 2,
                "Command": "LIGHT ON",
                "Raw": true,
            })
        );
        assert_eq!(
            instruction.to_string(),
            "Send Command, Device Type: Flat panel, SendCommand Type: Blind, Command: LIGHT ON, Raw: true"
        );
        Ok(())
    }

    #[test]
    fn response_mode_loads_leniently() -> eyre::Result<()> {
        let load = |json: &str| -> eyre::Result<Option<ResponseMode>> {
            Ok(serde_json::from_str::<SendCommandSettings>(json)?.send_command_type)
        };

        assert_eq!(load(r#"{"SendCommandType": 1}"#)?, Some(ResponseMode::Boolean));
        assert_eq!(load(r#"{"SendCommandType": "Blind"}"#)?, Some(ResponseMode::Blind));
        assert_eq!(load(r#"{"SendCommandType": 7}"#)?, None);
        assert_eq!(load(r#"{"SendCommandType": "Loud"}"#)?, None);
        assert_eq!(load(r#"{"SendCommandType": null}"#)?, None);
        assert_eq!(load("{}")?, Some(ResponseMode::String));
        Ok(())
    }

    #[test]
    fn clone_has_independent_settings() {
        let env = MockRegistry::new();
        let original = SendCommandInstruction::new(env.dispatcher());
        original.set_command("A");

        let copy = original.clone();
        copy.set_command("B");
        assert_eq!(original.command(), "A");
        assert_eq!(copy.command(), "B");
        assert_eq!(
            env.mock(DeviceCategory::Camera).connectivity_observers(),
            2
        );
    }
}
