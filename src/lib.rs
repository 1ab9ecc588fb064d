/*!
Run driver-advertised ASCOM actions and raw commands across astronomy device categories.

Every supported [`DeviceCategory`] is bound to exactly one [`DeviceMediator`] in a
[`DeviceRegistry`]. On top of it this crate provides:

* a [`Dispatcher`] that routes `Action` and `CommandBlind` / `CommandBool` / `CommandString`
  calls to the right mediator on a background task, logging and reporting failures;
* two persisted sequence instructions, [`DeviceActionInstruction`] and
  [`SendCommandInstruction`], with validation that tracks device connectivity;
* a [`DeviceActionsPanel`] state object for interactive use.

With the `client` feature (enabled by default) devices can be reached over ASCOM Alpaca via
[`AlpacaMediator`](client::AlpacaMediator), configured through [`Config`].
*/

mod actions;
mod category;
#[cfg(feature = "client")]
pub mod client;
mod config;
mod dispatch;
mod errors;
mod instruction;
mod macros;
/// Types related to the [`DeviceMediator`] capability.
pub mod mediator;
mod notification;
mod panel;
mod registry;
#[cfg(test)]
mod test_utils;
mod validation;

pub use actions::{SupportedActions, select_action};
pub use category::{DeviceCategory, UnknownCategory};
pub use config::{Config, ConfigError, DeviceEndpoint};
pub use dispatch::{ActionRequest, CommandOutput, CommandRequest, Dispatcher, ResponseMode};
pub use errors::{ASCOMError, ASCOMErrorCode, ASCOMResult, Error};
pub use instruction::{
    DeviceActionInstruction, DeviceActionSettings, SendCommandInstruction, SendCommandSettings,
};
pub use mediator::{DeviceInfo, DeviceMediator};
pub use notification::{LogNotifications, NotificationSink};
pub use panel::DeviceActionsPanel;
pub use registry::{DeviceRegistry, RegistryBuilder};
pub use validation::{
    Validation, ValidationIssue, ValidationState, validate_action, validate_command,
};
