mod connectivity;
pub use connectivity::{
    ConnectionChange, ConnectivityNotifier, ConnectivityObserver, Subscription, Subscriptions,
};

mod offline;
pub use offline::OfflineMediator;

use crate::{ASCOMError, ASCOMResult, DeviceCategory};
use async_trait::async_trait;
use std::fmt::Debug;

/// Snapshot of a device's connection state and advertised actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Whether the driver currently reports a connection.
    pub connected: bool,
    /// Action names advertised by the driver, in driver order.
    pub supported_actions: Vec<String>,
}

/// Uniform capability through which actions and raw commands reach a device driver.
///
/// One mediator exists per [`DeviceCategory`]; it's owned by whoever manages the
/// device connection and only borrowed (as an `Arc`) by dispatchers and instructions.
///
/// [`info`](Self::info) must be cheap and non-blocking: it's called from validation
/// and from connectivity callbacks. Driver calls are async and may take as long as
/// the driver needs.
#[async_trait]
pub trait DeviceMediator: Debug + Send + Sync {
    /// Category this mediator serves.
    fn category(&self) -> DeviceCategory;

    /// Current connection state and advertised actions.
    fn info(&self) -> DeviceInfo;

    /// Connect / disconnect notifications for this device.
    fn connectivity(&self) -> &ConnectivityNotifier;

    /// Invoke a driver-advertised action with free-form parameters.
    ///
    /// The list of actions supported by a driver can be discovered through
    /// [`DeviceInfo::supported_actions`].
    async fn action(&self, action: String, parameters: String) -> ASCOMResult<String> {
        let _ = (action, parameters);
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Transmit an arbitrary string to the device and don't wait for a response.
    ///
    /// `raw` disables the protocol framing characters the driver would otherwise add.
    async fn command_blind(&self, command: String, raw: bool) -> ASCOMResult<()> {
        let _ = (command, raw);
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Transmit an arbitrary string to the device and wait for a boolean response.
    async fn command_bool(&self, command: String, raw: bool) -> ASCOMResult<bool> {
        let _ = (command, raw);
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Transmit an arbitrary string to the device and wait for a string response.
    async fn command_string(&self, command: String, raw: bool) -> ASCOMResult<String> {
        let _ = (command, raw);
        Err(ASCOMError::NOT_IMPLEMENTED)
    }
}
