use crate::{ASCOMError, ASCOMResult, DeviceCategory, DeviceRegistry, Error, NotificationSink};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::future::Future;
use std::sync::Arc;

/// Source label attached to notifications about failed driver calls.
pub(crate) const DRIVER_SOURCE: &str = "ASCOM driver";

/// Which of the three raw command entry points to use.
///
/// Persisted as its integer discriminant.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize_repr,
    Deserialize_repr,
    IntoPrimitive,
    TryFromPrimitive,
    derive_more::Display,
)]
#[repr(u8)]
pub enum ResponseMode {
    /// `CommandString`: wait for a string response.
    #[default]
    String = 0,
    /// `CommandBool`: wait for a boolean response.
    Boolean = 1,
    /// `CommandBlind`: don't wait for a response.
    Blind = 2,
}

impl ResponseMode {
    /// All modes in their persisted order.
    pub const ALL: [Self; 3] = [Self::String, Self::Boolean, Self::Blind];

    /// Parse a mode name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_string().eq_ignore_ascii_case(name))
    }
}

/// Invocation of a driver-advertised action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Category whose mediator receives the call.
    pub category: DeviceCategory,
    /// Action name, as advertised by the driver.
    pub action: String,
    /// Free-form parameter string; may be empty.
    pub parameters: String,
}

/// A raw command sent through one of the `Command*` entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Category whose mediator receives the call.
    pub category: DeviceCategory,
    /// Response mode selecting the entry point.
    pub mode: ResponseMode,
    /// Command text.
    pub command: String,
    /// Whether the driver should send the text without adding protocol framing.
    pub raw: bool,
}

/// Outcome of a successful raw command.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CommandOutput {
    /// Response of `CommandString`.
    #[display("{_0}")]
    Text(String),
    /// Response of `CommandBool`.
    #[display("{_0}")]
    Bool(bool),
    /// `CommandBlind` completed; there's nothing to show.
    #[display("")]
    Sent,
}

impl CommandOutput {
    /// Text to display, or `None` for a blind command.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Self::Sent => None,
            output => Some(output.to_string()),
        }
    }
}

/// Routes actions and raw commands to the mediator of the requested category.
///
/// Each call runs on its own background task; the returned future completes when
/// the driver call does. Failures are logged, reported through the notification
/// sink and returned as [`Error::Driver`]; they're never retried.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: DeviceRegistry,
    notifications: Arc<dyn NotificationSink>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: DeviceRegistry, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            registry,
            notifications,
        }
    }

    /// Registry used to resolve categories.
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Invoke an action and return its textual result.
    #[tracing::instrument(level = "debug", skip_all, fields(category = %request.category, action = %request.action))]
    pub async fn run_action(&self, request: &ActionRequest) -> Result<String, Error> {
        let ActionRequest {
            category,
            action,
            parameters,
        } = request.clone();
        let mediator = Arc::clone(self.registry.get(category));
        let operation = format!("Action {action}({parameters})");

        match background(async move { mediator.action(action, parameters).await }).await {
            Ok(output) => {
                tracing::info!("{category} {operation} returned: {output}");
                Ok(output)
            }
            Err(err) => Err(self.report(category, operation, err)),
        }
    }

    /// Send a raw command through the entry point matching its response mode.
    #[tracing::instrument(level = "debug", skip_all, fields(category = %request.category, mode = %request.mode))]
    pub async fn run_command(&self, request: &CommandRequest) -> Result<CommandOutput, Error> {
        let CommandRequest {
            category,
            mode,
            command,
            raw,
        } = request.clone();
        let mediator = Arc::clone(self.registry.get(category));
        let operation = format!("SendCommand{mode}({command}, raw={raw})");

        let result = background(async move {
            Ok::<_, ASCOMError>(match mode {
                ResponseMode::String => {
                    CommandOutput::Text(mediator.command_string(command, raw).await?)
                }
                ResponseMode::Boolean => {
                    CommandOutput::Bool(mediator.command_bool(command, raw).await?)
                }
                ResponseMode::Blind => {
                    mediator.command_blind(command, raw).await?;
                    CommandOutput::Sent
                }
            })
        })
        .await;

        match result {
            Ok(CommandOutput::Sent) => {
                tracing::debug!("{category} {operation} sent");
                Ok(CommandOutput::Sent)
            }
            Ok(output) => {
                tracing::info!("{category} {operation} returned: {output}");
                Ok(output)
            }
            Err(err) => Err(self.report(category, operation, err)),
        }
    }

    fn report(&self, category: DeviceCategory, operation: String, source: ASCOMError) -> Error {
        tracing::error!(code = %source.code, "{category} {operation} failed: {}", source.message);
        self.notifications.show_error(&source.message, DRIVER_SOURCE);
        Error::Driver {
            category,
            operation,
            source,
        }
    }
}

/// Run a driver call on its own task so a slow driver never stalls the caller's executor.
async fn background<T: Send + 'static>(
    call: impl Future<Output = ASCOMResult<T>> + Send + 'static,
) -> ASCOMResult<T> {
    tokio::spawn(call)
        .await
        .unwrap_or_else(|err| Err(ASCOMError::unspecified(format_args!("Driver call aborted: {err}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CapturedLogs, MockRegistry, RecordedCall};
    use tracing::Level;
    use tracing::instrument::WithSubscriber;

    #[tokio::test]
    async fn action_returns_driver_output() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let telescope = env.mock(DeviceCategory::Telescope);
        telescope.set_connected(true);
        telescope.set_action_result(Ok("OK".to_owned()));

        let logs = CapturedLogs::default();
        let output = env
            .dispatcher()
            .run_action(&ActionRequest {
                category: DeviceCategory::Telescope,
                action: "Park".to_owned(),
                parameters: String::new(),
            })
            .with_subscriber(logs.subscriber())
            .await?;

        assert_eq!(output, "OK");
        assert_eq!(
            telescope.calls(),
            [RecordedCall::Action {
                action: "Park".to_owned(),
                parameters: String::new()
            }]
        );
        assert_eq!(
            logs.messages(Level::INFO),
            ["Telescope Action Park() returned: OK"]
        );
        assert!(logs.messages(Level::ERROR).is_empty());
        assert!(env.notifications.errors().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn driver_failure_is_logged_and_notified() {
        let env = MockRegistry::new();
        let camera = env.mock(DeviceCategory::Camera);
        camera.set_connected(true);
        camera.set_action_result(Err(ASCOMError::unspecified("timeout")));

        let logs = CapturedLogs::default();
        let err = env
            .dispatcher()
            .run_action(&ActionRequest {
                category: DeviceCategory::Camera,
                action: "Cool".to_owned(),
                parameters: "-10".to_owned(),
            })
            .with_subscriber(logs.subscriber())
            .await
            .expect_err("a failing driver must fail the dispatch");

        assert!(
            matches!(&err, Error::Driver { category: DeviceCategory::Camera, source, .. } if source.message == "timeout"),
            "{err:?}"
        );
        let errors = logs.messages(Level::ERROR);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("timeout"), "{errors:?}");
        assert!(logs.messages(Level::INFO).is_empty());
        assert_eq!(
            env.notifications.errors(),
            [("timeout".to_owned(), DRIVER_SOURCE.to_owned())]
        );
    }

    #[tokio::test]
    async fn blind_command_reports_nothing() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let dome = env.mock(DeviceCategory::Dome);
        dome.set_connected(true);

        let logs = CapturedLogs::default();
        let output = env
            .dispatcher()
            .run_command(&CommandRequest {
                category: DeviceCategory::Dome,
                mode: ResponseMode::Blind,
                command: "OPEN".to_owned(),
                raw: true,
            })
            .with_subscriber(logs.subscriber())
            .await?;

        assert_eq!(output, CommandOutput::Sent);
        assert_eq!(output.display_text(), None);
        assert_eq!(
            dome.calls(),
            [RecordedCall::Blind {
                command: "OPEN".to_owned(),
                raw: true
            }]
        );
        assert!(logs.messages(Level::INFO).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn command_modes_use_matching_entry_point() -> eyre::Result<()> {
        let env = MockRegistry::new();
        let focuser = env.mock(DeviceCategory::Focuser);
        focuser.set_connected(true);
        focuser.set_string_result(Ok("1234".to_owned()));
        focuser.set_bool_result(Ok(true));
        let dispatcher = env.dispatcher();

        let mut request = CommandRequest {
            category: DeviceCategory::Focuser,
            mode: ResponseMode::String,
            command: "POS?".to_owned(),
            raw: false,
        };
        assert_eq!(
            dispatcher.run_command(&request).await?,
            CommandOutput::Text("1234".to_owned())
        );

        request.mode = ResponseMode::Boolean;
        let output = dispatcher.run_command(&request).await?;
        assert_eq!(output.display_text().as_deref(), Some("true"));

        assert_eq!(
            focuser.calls(),
            [
                RecordedCall::String {
                    command: "POS?".to_owned(),
                    raw: false
                },
                RecordedCall::Bool {
                    command: "POS?".to_owned(),
                    raw: false
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn response_mode_names() {
        assert_eq!(ResponseMode::from_name("boolean"), Some(ResponseMode::Boolean));
        assert_eq!(ResponseMode::from_name("BLIND"), Some(ResponseMode::Blind));
        assert_eq!(ResponseMode::from_name("Bool"), None);
    }
}
