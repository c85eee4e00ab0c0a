// ABOUTME: The single place the settings store, client provider, and port signal are constructed.
// ABOUTME: Everything else receives a reference to this context instead of reaching for globals.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::client::{ClientFactory, ClientHandleProvider, PortSignal};
use crate::host::{PathResolver, TextFiles};
use crate::store::SettingsStore;

pub struct AppContext<H, F: ClientFactory> {
    settings: Arc<SettingsStore<H>>,
    clients: Arc<ClientHandleProvider<F>>,
    ports: PortSignal,
    tasks: Vec<JoinHandle<()>>,
}

impl<H, F> AppContext<H, F>
where
    H: PathResolver + TextFiles + 'static,
    F: ClientFactory,
{
    /// Build the context and kick off background work: settings initialization and
    /// following the port signal. Must be called inside a tokio runtime.
    pub fn start(host: H, factory: F, initial_port: Option<u16>) -> Self {
        let settings = Arc::new(SettingsStore::new(host));
        let clients = Arc::new(ClientHandleProvider::new(factory));
        let ports = PortSignal::new(initial_port);

        let init = tokio::spawn({
            let settings = settings.clone();
            async move { settings.initialize().await }
        });
        let follow = tokio::spawn({
            let clients = clients.clone();
            let ports = ports.subscribe();
            async move { clients.follow(ports).await }
        });

        Self {
            settings,
            clients,
            ports,
            tasks: vec![init, follow],
        }
    }

    pub fn settings(&self) -> &SettingsStore<H> {
        &self.settings
    }

    pub fn clients(&self) -> &ClientHandleProvider<F> {
        &self.clients
    }

    pub fn ports(&self) -> &PortSignal {
        &self.ports
    }

    /// Close the port signal and wait for background work to wind down.
    pub async fn shutdown(self) {
        let Self { ports, tasks, .. } = self;
        drop(ports);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background task ended abnormally: {e}");
            }
        }
    }
}
