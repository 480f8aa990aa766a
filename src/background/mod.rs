//! The extension's background context: message router, settings cache and
//! change propagation to every open tab.

pub mod handlers;
pub mod link;
pub mod messaging;
pub mod propagator;
pub mod router;
pub mod services;
pub mod tab_registry;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::assets::ExtensionAssets;
use crate::config::AppConfig;
use crate::settings::controllers;
use crate::settings::models::{SettingsCache, SharedSettingsCache};
use crate::settings::repositories::SettingsStore;

pub use link::BackgroundLink;
pub use messaging::{
    ContextError, MessageSender, RuntimeMessenger, TabEndpoint, TabId, TabInfo, TabMessenger,
    TabQuery,
};
pub use propagator::ChangePropagator;
pub use router::{Dispatch, Router};
pub use services::{BackendClient, BackendError};
pub use tab_registry::TabRegistry;

/// Everything a background handler may touch. Cheap to clone.
#[derive(Clone)]
pub struct BackgroundServices {
    pub store: Arc<dyn SettingsStore>,
    pub cache: SharedSettingsCache,
    pub tabs: Arc<dyn TabMessenger>,
    pub backend: BackendClient,
    pub assets: ExtensionAssets,
}

impl BackgroundServices {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        tabs: Arc<dyn TabMessenger>,
        config: &AppConfig,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            store,
            cache: SettingsCache::shared(),
            tabs,
            backend: BackendClient::new(&config.backend_url, config.request_timeout())?,
            assets: ExtensionAssets::new(&config.extension_base_url),
        })
    }
}

/// A running background context.
pub struct Background {
    router: Arc<Router>,
    propagator: JoinHandle<()>,
}

impl Background {
    /// Install missing defaults, seed the cache and start propagating changes.
    pub async fn start(services: BackgroundServices) -> Self {
        // Nothing else writes before start returns, so the install batch
        // needs no broadcast: the cache is seeded from the installed record.
        match controllers::install_defaults(services.store.as_ref()).await {
            Ok(record) => services.cache.write().populate(&record),
            Err(e) => error!(error = ?e, "Failed to install default settings, cache stays empty"),
        }
        let changes = services.store.subscribe();

        let propagator = ChangePropagator::new(
            services.store.clone(),
            services.cache.clone(),
            services.tabs.clone(),
            services.assets.clone(),
        )
        .spawn(changes);

        info!(backend = services.backend.base_url(), "Background started");
        Self {
            router: Arc::new(Router::new(services)),
            propagator,
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn services(&self) -> &BackgroundServices {
        self.router.services()
    }

    /// Runtime channel for a page; `sender` names the page's tab.
    pub fn link(&self, sender: MessageSender) -> BackgroundLink {
        BackgroundLink::new(&self.router, sender)
    }

    pub fn shutdown(self) {
        self.propagator.abort();
        info!("Background stopped");
    }
}
