use crate::DeviceCategory;
use crate::mediator::{ConnectivityObserver, DeviceMediator, OfflineMediator, Subscriptions};
use std::sync::Arc;

/// Exactly one mediator per [`DeviceCategory`], fixed at construction.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    // Indexed by `DeviceCategory::index`.
    mediators: Vec<Arc<dyn DeviceMediator>>,
}

impl DeviceRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Mediator serving `category`.
    pub fn get(&self, category: DeviceCategory) -> &Arc<dyn DeviceMediator> {
        &self.mediators[category.index()]
    }

    /// Whether the mediator for `category` currently reports a connection.
    pub fn is_connected(&self, category: DeviceCategory) -> bool {
        self.get(category).info().connected
    }

    /// Iterate over all categories with their mediators.
    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = (DeviceCategory, &Arc<dyn DeviceMediator>)> {
        DeviceCategory::ALL.into_iter().zip(&self.mediators)
    }

    /// Register `observer` with every mediator.
    ///
    /// All registrations are released together when the returned guard is dropped.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn observe(&self, observer: &Arc<dyn ConnectivityObserver>) -> Subscriptions {
        self.mediators
            .iter()
            .map(|mediator| mediator.connectivity().subscribe(observer))
            .collect()
    }
}

/// Builder for [`DeviceRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    slots: [Option<Arc<dyn DeviceMediator>>; 11],
}

impl RegistryBuilder {
    /// Bind a mediator to the category it reports.
    ///
    /// Fails if that category already has a mediator.
    pub fn with(mut self, mediator: Arc<dyn DeviceMediator>) -> eyre::Result<Self> {
        let category = mediator.category();
        let slot = &mut self.slots[category.index()];
        eyre::ensure!(slot.is_none(), "{category} mediator is already registered");
        tracing::debug!(%category, ?mediator, "Registering mediator");
        *slot = Some(mediator);
        Ok(self)
    }

    /// Fill every category without a mediator with an [`OfflineMediator`].
    pub fn with_offline_defaults(mut self) -> Self {
        for (category, slot) in DeviceCategory::ALL.into_iter().zip(&mut self.slots) {
            if slot.is_none() {
                *slot = Some(Arc::new(OfflineMediator::new(category)));
            }
        }
        self
    }

    /// Finish the registry; every category must have a mediator.
    pub fn build(self) -> eyre::Result<DeviceRegistry> {
        let mediators = DeviceCategory::ALL
            .into_iter()
            .zip(self.slots)
            .map(|(category, slot)| {
                slot.ok_or_else(|| eyre::eyre!("No mediator registered for {category}"))
            })
            .collect::<eyre::Result<_>>()?;

        Ok(DeviceRegistry { mediators })
    }
}
