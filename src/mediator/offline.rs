use super::{ConnectivityNotifier, DeviceInfo, DeviceMediator};
use crate::{ASCOMError, ASCOMErrorCode, ASCOMResult, DeviceCategory};
use async_trait::async_trait;

/// Placeholder for a category that has no device configured.
///
/// Always reports disconnected; every call fails with `NOT_CONNECTED`.
#[derive(Debug)]
pub struct OfflineMediator {
    category: DeviceCategory,
    connectivity: ConnectivityNotifier,
}

impl OfflineMediator {
    /// Create a placeholder for `category`.
    pub fn new(category: DeviceCategory) -> Self {
        Self {
            category,
            connectivity: ConnectivityNotifier::new(),
        }
    }

    fn not_configured(&self) -> ASCOMError {
        ASCOMError::new(
            ASCOMErrorCode::NOT_CONNECTED,
            format_args!("No {} is configured", self.category),
        )
    }
}

#[async_trait]
impl DeviceMediator for OfflineMediator {
    fn category(&self) -> DeviceCategory {
        self.category
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::default()
    }

    fn connectivity(&self) -> &ConnectivityNotifier {
        &self.connectivity
    }

    async fn action(&self, _action: String, _parameters: String) -> ASCOMResult<String> {
        Err(self.not_configured())
    }

    async fn command_blind(&self, _command: String, _raw: bool) -> ASCOMResult<()> {
        Err(self.not_configured())
    }

    async fn command_bool(&self, _command: String, _raw: bool) -> ASCOMResult<bool> {
        Err(self.not_configured())
    }

    async fn command_string(&self, _command: String, _raw: bool) -> ASCOMResult<String> {
        Err(self.not_configured())
    }
}
