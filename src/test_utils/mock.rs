use crate::macros::lock;
use crate::mediator::{ConnectionChange, ConnectivityNotifier};
use crate::{
    ASCOMResult, DeviceCategory, DeviceInfo, DeviceMediator, DeviceRegistry, Dispatcher,
    NotificationSink,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCall {
    Action { action: String, parameters: String },
    Blind { command: String, raw: bool },
    Bool { command: String, raw: bool },
    String { command: String, raw: bool },
}

#[derive(Debug)]
struct Responses {
    action: ASCOMResult<String>,
    string: ASCOMResult<String>,
    bool: ASCOMResult<bool>,
    blind: ASCOMResult<()>,
}

/// In-memory mediator with scripted responses and a call log.
#[derive(Debug)]
pub(crate) struct MockMediator {
    category: DeviceCategory,
    info: Mutex<DeviceInfo>,
    responses: Mutex<Responses>,
    calls: Mutex<Vec<RecordedCall>>,
    connectivity: ConnectivityNotifier,
    /// Held by tests to keep driver calls from completing.
    pub(crate) gate: tokio::sync::Mutex<()>,
}

impl MockMediator {
    pub(crate) fn new(category: DeviceCategory) -> Arc<Self> {
        Arc::new(Self {
            category,
            info: Mutex::default(),
            responses: Mutex::new(Responses {
                action: Ok(String::new()),
                string: Ok(String::new()),
                bool: Ok(false),
                blind: Ok(()),
            }),
            calls: Mutex::default(),
            connectivity: ConnectivityNotifier::new(),
            gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Change the connection state and notify observers if it flipped.
    pub(crate) fn set_connected(&self, connected: bool) {
        let changed = {
            let mut info = lock(&self.info);
            std::mem::replace(&mut info.connected, connected) != connected
        };
        if changed {
            self.connectivity
                .notify(self.category, ConnectionChange::to(connected));
        }
    }

    pub(crate) fn set_actions(&self, actions: &[&str]) {
        lock(&self.info).supported_actions = actions.iter().map(|&a| a.to_owned()).collect();
    }

    pub(crate) fn set_action_result(&self, result: ASCOMResult<String>) {
        lock(&self.responses).action = result;
    }

    pub(crate) fn set_string_result(&self, result: ASCOMResult<String>) {
        lock(&self.responses).string = result;
    }

    pub(crate) fn set_bool_result(&self, result: ASCOMResult<bool>) {
        lock(&self.responses).bool = result;
    }

    pub(crate) fn connectivity_observers(&self) -> usize {
        self.connectivity.observer_count()
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    async fn record(&self, call: RecordedCall) {
        let _gate = self.gate.lock().await;
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl DeviceMediator for MockMediator {
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
        self.record(RecordedCall::Action { action, parameters }).await;
        lock(&self.responses).action.clone()
    }

    async fn command_blind(&self, command: String, raw: bool) -> ASCOMResult<()> {
        self.record(RecordedCall::Blind { command, raw }).await;
        lock(&self.responses).blind.clone()
    }

    async fn command_bool(&self, command: String, raw: bool) -> ASCOMResult<bool> {
        self.record(RecordedCall::Bool { command, raw }).await;
        lock(&self.responses).bool.clone()
    }

    async fn command_string(&self, command: String, raw: bool) -> ASCOMResult<String> {
        self.record(RecordedCall::String { command, raw }).await;
        lock(&self.responses).string.clone()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNotifications(Mutex<Vec<(String, String)>>);

impl RecordingNotifications {
    pub(crate) fn errors(&self) -> Vec<(String, String)> {
        lock(&self.0).clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn show_error(&self, message: &str, source: &str) {
        lock(&self.0).push((message.to_owned(), source.to_owned()));
    }
}

/// A registry where every category is backed by a [`MockMediator`].
#[derive(Debug)]
pub(crate) struct MockRegistry {
    mocks: Vec<Arc<MockMediator>>,
    pub(crate) registry: DeviceRegistry,
    pub(crate) notifications: Arc<RecordingNotifications>,
}

impl MockRegistry {
    pub(crate) fn new() -> Self {
        let mocks = DeviceCategory::ALL
            .into_iter()
            .map(MockMediator::new)
            .collect::<Vec<_>>();

        let registry = mocks
            .iter()
            .try_fold(DeviceRegistry::builder(), |builder, mock| {
                builder.with(Arc::<MockMediator>::clone(mock))
            })
            .and_then(crate::RegistryBuilder::build)
            .expect("every category has a mock");

        Self {
            mocks,
            registry,
            notifications: Arc::default(),
        }
    }

    pub(crate) fn mock(&self, category: DeviceCategory) -> Arc<MockMediator> {
        Arc::clone(&self.mocks[category.index()])
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.registry.clone(),
            Arc::<RecordingNotifications>::clone(&self.notifications),
        )
    }
}
