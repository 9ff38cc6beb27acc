//! Serve command: runs the backend simulator in the foreground.

use std::net::SocketAddr;

use tracing::info;

use homesim_server::{
    DeviceStore, ServerConfig, ServerError, SignalHandler, SocketServer, new_shared_store, serve,
};

use crate::error::{ClientError, ClientResult};

/// Serves until SIGINT or SIGTERM.
pub fn run(bind: SocketAddr, commissioned: bool) -> ClientResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("homesim-backend")
        .build()?;

    runtime.block_on(async move {
        let config = ServerConfig::new(bind).with_commissioned(commissioned);
        let server = SocketServer::bind(config).await.map_err(backend_error)?;

        let signal_handler = SignalHandler::new();
        signal_handler.spawn_listener();

        info!(addr = %server.local_addr(), commissioned, "Backend ready");
        serve(
            server,
            new_shared_store(DeviceStore::new()),
            signal_handler.shutdown_handle(),
        )
        .await
        .map_err(backend_error)
    })
}

fn backend_error(e: ServerError) -> ClientError {
    match e {
        ServerError::Bind { .. } => ClientError::Connection(e.to_string()),
        other => ClientError::Io(std::io::Error::other(other)),
    }
}
