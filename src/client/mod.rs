//! Devices reached over the ASCOM Alpaca HTTP API.

mod transaction;
pub(crate) use transaction::*;

mod params;
pub(crate) use params::{ActionParams, opaque_params};

mod response;
pub(crate) use response::Response;

use crate::macros::lock;
use crate::mediator::{ConnectionChange, ConnectivityNotifier};
use crate::{
    ASCOMError, ASCOMResult, Config, DeviceCategory, DeviceEndpoint, DeviceInfo, DeviceMediator,
    DeviceRegistry,
};
use async_trait::async_trait;
use eyre::{ContextCompat, WrapErr};
use futures::TryFutureExt;
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::IntoUrl;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Instrument;

#[derive(Debug)]
pub(crate) struct RawClient {
    pub(crate) inner: reqwest::Client,
    pub(crate) base_url: reqwest::Url,
    pub(crate) client_id: u32,
}

impl RawClient {
    pub(crate) fn new(base_url: reqwest::Url) -> eyre::Result<Self> {
        eyre::ensure!(
            !base_url.cannot_be_a_base(),
            "{base_url} is not a valid base URL"
        );
        Ok(Self {
            inner: reqwest::Client::new(),
            base_url,
            client_id: rand::random(),
        })
    }

    pub(crate) fn join_url(&self, path: &str) -> eyre::Result<Self> {
        Ok(Self {
            inner: self.inner.clone(),
            base_url: self.base_url.join(path)?,
            client_id: self.client_id,
        })
    }

    pub(crate) async fn request<Resp: Response>(
        &self,
        path: &str,
        params: ActionParams<impl Debug + Serialize + Send + Sync>,
    ) -> eyre::Result<Resp> {
        let request_transaction = RequestTransaction::new(self.client_id);

        let span = tracing::debug_span!(
            "Alpaca transaction",
            path,
            ?params,
            client_transaction_id = request_transaction.client_transaction_id,
            client_id = request_transaction.client_id,
        );

        async move {
            let url = self.base_url.join(path)?;
            let request = match &params {
                ActionParams::Get(params) => self.inner.get(url).query(&RequestWithTransaction {
                    transaction: request_transaction,
                    params,
                }),
                ActionParams::Put(params) => self.inner.put(url).form(&RequestWithTransaction {
                    transaction: request_transaction,
                    params,
                }),
            };

            let response = request.send().await?.error_for_status()?;
            let mime_type = response
                .headers()
                .get(CONTENT_TYPE)
                .context("Missing Content-Type header")?
                .to_str()?
                .parse::<Mime>()?;
            let bytes = response.bytes().await?;
            let ResponseWithTransaction {
                transaction: response_transaction,
                response,
            } = Resp::from_reqwest(&mime_type, &bytes)?;

            tracing::debug!(
                server_transaction_id = response_transaction.server_transaction_id,
                "Received response",
            );

            match response_transaction.client_transaction_id {
                Some(received_client_transaction_id)
                    if received_client_transaction_id
                        != request_transaction.client_transaction_id =>
                {
                    tracing::warn!(
                        sent = request_transaction.client_transaction_id,
                        received = received_client_transaction_id,
                        "ClientTransactionID mismatch",
                    );
                }
                _ => {}
            }

            Ok::<_, eyre::Error>(response)
        }
        .map_err(|err| {
            tracing::error!(%err, "Alpaca request failed");
            err.wrap_err(format!("Failed to send Alpaca request to {path}"))
        })
        .instrument(span)
        .await
    }

    /// Request that reports transport failures as ASCOM errors.
    async fn exec<T: 'static + serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: ActionParams<impl Debug + Serialize + Send + Sync>,
    ) -> ASCOMResult<T> {
        self.request::<ASCOMResult<T>>(path, params)
            .await
            .unwrap_or_else(|err| Err(ASCOMError::unspecified(format_args!("{err:#}"))))
    }
}

/// A single device on an Alpaca server, adapted to [`DeviceMediator`].
///
/// Connection state and advertised actions are cached; call [`poll`](Self::poll) or
/// [`spawn_polling`](Self::spawn_polling) to keep them current. Observers are notified
/// whenever a poll sees the connection state flip.
#[derive(Debug)]
pub struct AlpacaMediator {
    category: DeviceCategory,
    client: RawClient,
    info: Mutex<DeviceInfo>,
    connectivity: ConnectivityNotifier,
}

impl AlpacaMediator {
    /// Shortest interval [`spawn_polling`](Self::spawn_polling) polls at.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Create a mediator for device `device_number` of `category` on the server at `base_url`.
    pub fn new(
        category: DeviceCategory,
        base_url: impl IntoUrl,
        device_number: usize,
    ) -> eyre::Result<Self> {
        let device_type = category
            .alpaca_path()
            .with_context(|| format!("{category} devices have no Alpaca device type"))?;
        let client = RawClient::new(base_url.into_url()?)?
            .join_url(&format!("api/v1/{device_type}/{device_number}/"))?;

        Ok(Self {
            category,
            client,
            info: Mutex::default(),
            connectivity: ConnectivityNotifier::new(),
        })
    }

    /// Create a mediator from a configured endpoint.
    pub fn from_endpoint(category: DeviceCategory, endpoint: &DeviceEndpoint) -> eyre::Result<Self> {
        Self::new(category, endpoint.url.as_str(), endpoint.device_number)
            .wrap_err_with(|| format!("Invalid {category} endpoint {}", endpoint.url))
    }

    /// Re-read the connection state and, when connected, the advertised actions.
    ///
    /// An unreachable device counts as disconnected.
    #[tracing::instrument(level = "debug", skip(self), fields(category = %self.category))]
    pub async fn poll(&self) -> DeviceInfo {
        let connected = self
            .client
            .exec::<bool>("connected", ActionParams::Get(opaque_params! {}))
            .await
            .unwrap_or_else(|err| {
                tracing::debug!(%err, "Couldn't read connection state");
                false
            });

        let supported_actions = if connected {
            match self
                .client
                .exec::<Vec<String>>("supportedactions", ActionParams::Get(opaque_params! {}))
                .await
            {
                Ok(actions) => actions,
                Err(err) => {
                    tracing::warn!(%err, "Couldn't read supported actions");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let info = DeviceInfo {
            connected,
            supported_actions,
        };
        let was_connected = {
            let mut cached = lock(&self.info);
            std::mem::replace(&mut *cached, info.clone()).connected
        };
        if was_connected != connected {
            let change = ConnectionChange::to(connected);
            tracing::info!(category = %self.category, %change, "Connection state changed");
            self.connectivity.notify(self.category, change);
        }
        info
    }

    /// Ask the driver to connect, then refresh the cached state.
    pub async fn connect(&self) -> ASCOMResult<()> {
        self.set_connected(true).await
    }

    /// Ask the driver to disconnect, then refresh the cached state.
    pub async fn disconnect(&self) -> ASCOMResult<()> {
        self.set_connected(false).await
    }

    async fn set_connected(&self, connected: bool) -> ASCOMResult<()> {
        let result = self
            .client
            .exec::<()>(
                "connected",
                ActionParams::Put(opaque_params! { Connected: connected }),
            )
            .await;
        let _ = self.poll().await;
        result
    }

    /// Poll every `interval` on a background task until the mediator is dropped.
    ///
    /// Intervals shorter than [`MIN_POLL_INTERVAL`](Self::MIN_POLL_INTERVAL) are raised to it.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let interval = interval.max(Self::MIN_POLL_INTERVAL);
        let mediator = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let _ = ticks.tick().await;
                let Some(mediator) = mediator.upgrade() else {
                    break;
                };
                let _ = mediator.poll().await;
            }
        })
    }
}

#[async_trait]
impl DeviceMediator for AlpacaMediator {
    fn category(&self) -> DeviceCategory {
        self.category
    }

    fn info(&self) -> DeviceInfo {
        lock(&self.info).clone()
    }

    fn connectivity(&self) -> &ConnectivityNotifier {
        &self.connectivity
    }

    async fn action(&self, action: String, parameters: String) -> ASCOMResult<String> {
        self.client
            .exec(
                "action",
                ActionParams::Put(opaque_params! { Action: action, Parameters: parameters }),
            )
            .await
    }

    async fn command_blind(&self, command: String, raw: bool) -> ASCOMResult<()> {
        self.client
            .exec(
                "commandblind",
                ActionParams::Put(opaque_params! { Command: command, Raw: raw }),
            )
            .await
    }

    async fn command_bool(&self, command: String, raw: bool) -> ASCOMResult<bool> {
        self.client
            .exec(
                "commandbool",
                ActionParams::Put(opaque_params! { Command: command, Raw: raw }),
            )
            .await
    }

    async fn command_string(&self, command: String, raw: bool) -> ASCOMResult<String> {
        self.client
            .exec(
                "commandstring",
                ActionParams::Put(opaque_params! { Command: command, Raw: raw }),
            )
            .await
    }
}

impl DeviceRegistry {
    /// Build a registry with an [`AlpacaMediator`] for every configured device.
    ///
    /// Categories without configuration get an [`OfflineMediator`](crate::mediator::OfflineMediator).
    /// Polling starts on the current Tokio runtime and stops once the registry and every
    /// clone of it are dropped.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .wrap_err("Alpaca devices must be created inside a Tokio runtime")?;
        let _guard = runtime.enter();

        config
            .endpoints()?
            .into_iter()
            .try_fold(Self::builder(), |builder, (category, endpoint)| {
                let mediator = Arc::new(AlpacaMediator::from_endpoint(category, endpoint)?);
                drop(mediator.spawn_polling(config.poll_interval()));
                builder.with(mediator)
            })?
            .with_offline_defaults()
            .build()
    }
}
