//! Request dispatch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{Span, debug, warn};

use homesim_protocol::{Request, Response};

use crate::error::{ServerError, ServerResult};
use crate::socket::Connection;
use crate::store::DeviceStore;

/// Device store shared by every connection.
pub type SharedStore = Arc<RwLock<DeviceStore>>;

pub fn new_shared_store(store: DeviceStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

/// Routes requests to the device store.
#[derive(Clone)]
pub struct RequestHandler {
    store: SharedStore,
}

impl RequestHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip_all, fields(service, method, status, duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        let start = std::time::Instant::now();
        let span = Span::current();

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Call {
                service,
                method,
                arg,
            } => {
                span.record("service", service.as_str());
                span.record("method", method.as_str());
                let response = self.store.write().await.dispatch(service, method, arg);
                if let Response::Reply { status, .. } = &response {
                    span.record("status", status.as_str());
                }
                response
            }
        };

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        debug!("Handled request");
        response
    }

    /// Serves requests on one connection until the client disconnects.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        let peer = conn.peer();
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;
                }
                Ok(None) => {
                    debug!(%peer, "Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }
}

/// Builds the per-connection closure for [`crate::SocketServer::run`].
pub fn make_connection_handler(
    store: SharedStore,
) -> impl Fn(Connection) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |conn| {
        let handler = RequestHandler::new(store.clone());
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                debug!(error = %e, "Connection closed with error");
            }
        })
    }
}
