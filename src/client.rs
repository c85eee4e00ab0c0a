// ABOUTME: Derives the SC:R web API client from the latest advertised web server port.
// ABOUTME: Each port gets its own handle whose construction runs on a tokio task and reports through a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cwal_scr::{CachedScrApi, ClientError, ScrEvent};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::config::ScrApiConfig;

/// Builds a client for a web server port.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    fn create(&self, port: u16) -> BoxFuture<'static, Result<Self::Client, ClientError>>;
}

/// Caching SC:R web API client that has reached the server before it is handed out.
#[derive(Debug, Clone)]
pub struct ScrClientFactory {
    host: String,
    timeout: Duration,
    cache_ttl: Duration,
}

impl ScrClientFactory {
    pub fn from_config(config: &ScrApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            timeout: config.request_timeout(),
            cache_ttl: config.cache_ttl(),
        }
    }
}

impl ClientFactory for ScrClientFactory {
    type Client = CachedScrApi;

    fn create(&self, port: u16) -> BoxFuture<'static, Result<CachedScrApi, ClientError>> {
        let host = self.host.clone();
        let timeout = self.timeout;
        let cache_ttl = self.cache_ttl;
        async move { CachedScrApi::connect_local(&host, port, timeout, cache_ttl).await }.boxed()
    }
}

/// Progress of building the client behind a handle.
pub enum ClientStatus<C> {
    Connecting,
    Ready(Arc<C>),
    Failed(ClientError),
}

impl<C> Clone for ClientStatus<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Connecting => Self::Connecting,
            Self::Ready(client) => Self::Ready(client.clone()),
            Self::Failed(e) => Self::Failed(e.clone()),
        }
    }
}

/// A client bound to one port. Cheap to clone; clones observe the same construction.
pub struct ClientHandle<C> {
    port: u16,
    status: watch::Receiver<ClientStatus<C>>,
}

impl<C> Clone for ClientHandle<C> {
    fn clone(&self) -> Self {
        Self {
            port: self.port,
            status: self.status.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> ClientHandle<C> {
    /// Start building a client for `port`. Must be called inside a tokio runtime.
    fn spawn<F: ClientFactory<Client = C>>(factory: &F, port: u16) -> Self {
        let (tx, rx) = watch::channel(ClientStatus::Connecting);
        let pending = factory.create(port);
        tokio::spawn(async move {
            let status = match pending.await {
                Ok(client) => {
                    tracing::info!("SC:R web API client ready on port {port}");
                    ClientStatus::Ready(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!("SC:R web API client for port {port} failed: {e}");
                    ClientStatus::Failed(e)
                }
            };
            tx.send_replace(status);
        });
        Self { port, status: rx }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> ClientStatus<C> {
        self.status.borrow().clone()
    }

    /// The client if construction already succeeded.
    #[cfg(test)]
    pub fn available(&self) -> Option<Arc<C>> {
        match &*self.status.borrow() {
            ClientStatus::Ready(client) => Some(client.clone()),
            _ => None,
        }
    }

    /// Wait for construction to finish. Errors mean "no usable client" for this port.
    pub async fn client(&self) -> Result<Arc<C>, ClientError> {
        let mut status = self.status.clone();
        let settled = match status.wait_for(|s| !matches!(s, ClientStatus::Connecting)).await {
            Ok(settled) => (*settled).clone(),
            Err(_) => return Err(ClientError::Abandoned),
        };
        match settled {
            ClientStatus::Ready(client) => Ok(client),
            ClientStatus::Failed(e) => Err(e),
            ClientStatus::Connecting => Err(ClientError::Abandoned),
        }
    }
}

/// Holds the one client handle derived from the current port, if any.
pub struct ClientHandleProvider<F: ClientFactory> {
    factory: F,
    current: Mutex<Option<ClientHandle<F::Client>>>,
}

impl<F: ClientFactory> ClientHandleProvider<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<ClientHandle<F::Client>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_handle(&self) -> Option<ClientHandle<F::Client>> {
        self.current().clone()
    }

    #[cfg(test)]
    pub fn current_port(&self) -> Option<u16> {
        self.current().as_ref().map(ClientHandle::port)
    }

    /// Replace the handle when the port differs from the one it was built for.
    pub fn on_port_changed(&self, port: Option<u16>) {
        let mut current = self.current();
        if current.as_ref().map(ClientHandle::port) == port {
            return;
        }
        match port {
            Some(port) => tracing::info!("SC:R web server advertised on port {port}, building client"),
            None => tracing::info!("SC:R web server gone, dropping client handle"),
        }
        *current = port.map(|port| ClientHandle::spawn(&self.factory, port));
    }

    /// Track a port channel until its sender is dropped.
    pub async fn follow(&self, mut ports: watch::Receiver<Option<u16>>) {
        loop {
            let port = *ports.borrow_and_update();
            self.on_port_changed(port);
            if ports.changed().await.is_err() {
                tracing::debug!("Port signal closed, no longer following");
                return;
            }
        }
    }
}

/// Sending side of the web server port signal.
pub struct PortSignal {
    tx: watch::Sender<Option<u16>>,
}

impl PortSignal {
    pub fn new(initial: Option<u16>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u16>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<u16> {
        *self.tx.borrow()
    }

    /// Publish a port. Re-publishing the current value notifies nobody.
    pub fn publish(&self, port: Option<u16>) {
        self.tx.send_if_modified(|current| {
            if *current == port {
                return false;
            }
            *current = port;
            true
        });
    }

    /// Feed an SC:R event. Returns whether the event carried port information.
    pub fn apply(&self, event: &ScrEvent) -> bool {
        match event.port_signal() {
            Some(port) => {
                self.publish(port);
                true
            }
            None => false,
        }
    }
}
