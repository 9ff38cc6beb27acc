//! Running the backend, in the foreground or on a dedicated thread.

use std::net::SocketAddr;
use std::thread::JoinHandle;

use homesim_protocol::Endpoint;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{SharedStore, make_connection_handler, new_shared_store};
use crate::signals::ShutdownHandle;
use crate::socket::SocketServer;
use crate::store::{DeviceStore, Lifecycle};

/// Serves `store` on `server` until `shutdown` is triggered.
///
/// The device reports `Running` while the accept loop is up.
pub async fn serve(
    server: SocketServer,
    store: SharedStore,
    shutdown: ShutdownHandle,
) -> ServerResult<()> {
    {
        let mut store = store.write().await;
        store.set_lifecycle(Lifecycle::Running);
        store.set_commissioned(server.config().commissioned);
    }

    let result = server
        .run_until_shutdown(make_connection_handler(store.clone()), shutdown.wait().wait())
        .await;

    store.write().await.set_lifecycle(Lifecycle::Uninitialized);
    info!(addr = %server.local_addr(), "Backend stopped");
    result
}

/// A backend running on its own thread and single-threaded runtime.
///
/// Lets blocking code (device clients, tests) talk to a live backend. The
/// backend shuts down and its thread is joined on drop; open connections
/// are closed with it.
pub struct BackgroundServer {
    addr: SocketAddr,
    store: SharedStore,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    pub fn start(config: ServerConfig) -> ServerResult<Self> {
        Self::start_with_store(config, DeviceStore::new())
    }

    /// Starts the backend with a pre-populated store. Returns once the
    /// listener is bound.
    pub fn start_with_store(config: ServerConfig, store: DeviceStore) -> ServerResult<Self> {
        let store = new_shared_store(store);
        let shutdown = ShutdownHandle::default();
        let (ready_tx, ready_rx) = oneshot::channel::<ServerResult<SocketAddr>>();

        let thread = std::thread::Builder::new()
            .name("homesim-backend".to_string())
            .spawn({
                let store = store.clone();
                let shutdown = shutdown.clone();
                move || run_backend(config, store, shutdown, ready_tx)
            })
            .map_err(|e| ServerError::thread(e.to_string()))?;

        let addr = match ready_rx.blocking_recv() {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ServerError::thread("backend exited before listening"));
            }
        };

        Ok(Self {
            addr,
            store,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// The live store, for inspection.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Stops the backend and waits for its thread.
    pub fn shutdown(mut self) -> ServerResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> ServerResult<()> {
        self.shutdown.trigger();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ServerError::thread("backend thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Backend did not stop cleanly");
        }
    }
}

fn run_backend(
    config: ServerConfig,
    store: SharedStore,
    shutdown: ShutdownHandle,
    ready: oneshot::Sender<ServerResult<SocketAddr>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    runtime.block_on(async move {
        let server = match SocketServer::bind(config).await {
            Ok(server) => server,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(server.local_addr()));
        if let Err(e) = serve(server, store, shutdown).await {
            error!(error = %e, "Backend failed");
        }
    });
}
