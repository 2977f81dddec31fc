use crate::error::{Error, Result};
use crate::http::routes::{handle_request, AppState};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server as HyperServer;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn serve(self, addr: &str) -> Result<()> {
        self.serve_with_shutdown(addr, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, addr: &str, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid address '{}': {}", addr, e)))?;

        let state = Arc::clone(&self.state);
        let make_svc = make_service_fn(move |_conn| {
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(handle_request(&state, req).await) }
                }))
            }
        });

        let server = HyperServer::try_bind(&addr)?.serve(make_svc);
        log::info!("dbserver listening on {}", server.local_addr());

        server.with_graceful_shutdown(shutdown).await?;

        log::info!("Server stopped");
        Ok(())
    }
}

/// Resolve on SIGINT or SIGTERM (Ctrl+C off unix)
///
/// If the handlers cannot be installed the error is logged and the future
/// stays pending.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    log::error!("Failed to install signal handlers: {}", e);
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => log::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => log::info!("Received SIGINT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            return std::future::pending().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    }
}
