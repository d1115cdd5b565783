//! HTTP server binding and serving.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::schema::ListenConfig;
use crate::error::{Result, StartupError};
use crate::lifecycle::shutdown::Shutdown;

/// Resolve and bind the configured address.
///
/// Success and failure are both logged here; the caller decides whether a
/// failure ends the process.
pub async fn bind(listen: &ListenConfig) -> std::result::Result<BoundServer, StartupError> {
    let address = listen.address();

    let resolved = tokio::net::lookup_host(address.as_str())
        .await
        .map_err(|e| StartupError::Address {
            address: address.clone(),
            reason: e.to_string(),
        })
        .and_then(|mut addrs| {
            addrs.next().ok_or_else(|| StartupError::Address {
                address: address.clone(),
                reason: "no addresses resolved".to_string(),
            })
        });

    let listener = match resolved {
        Ok(addr) => TcpListener::bind(addr).await.map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        }),
        Err(e) => Err(e),
    };

    let listener = match listener {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Server failed to start");
            return Err(e);
        }
    };

    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.clone(),
        source,
    })?;
    tracing::info!(address = %local_addr, "Server listening");

    Ok(BoundServer {
        listener,
        local_addr,
    })
}

/// A bound listener that is not yet serving.
///
/// Connections queue in the OS backlog until [`BoundServer::serve`] runs.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the serve loop for `app`.
    pub fn serve(self, app: Router) -> ServerHandle {
        let shutdown = Shutdown::new();
        let signal = shutdown.wait();
        let local_addr = self.local_addr;

        let task = tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            let result = axum::serve(self.listener, service)
                .with_graceful_shutdown(signal)
                .await;
            match &result {
                Ok(()) => tracing::info!(address = %local_addr, "Server stopped"),
                Err(e) => tracing::error!(address = %local_addr, error = %e, "Server error"),
            }
            result
        });

        ServerHandle {
            local_addr,
            routes_mounted: 0,
            sockets_connected: 0,
            shutdown,
            task,
            notices: None,
        }
    }
}

/// Handle to a running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    pub(crate) routes_mounted: usize,
    pub(crate) sockets_connected: usize,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<()>>,
    /// Socket notice bridge. Like the serve task it is detached, not stopped,
    /// when the handle is dropped.
    pub(crate) notices: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Services mounted under the API path.
    pub fn routes_mounted(&self) -> usize {
        self.routes_mounted
    }

    /// Socket namespaces connected.
    pub fn sockets_connected(&self) -> usize {
        self.sockets_connected
    }

    /// Ask the server to stop accepting and drain in-flight requests.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the serve loop to finish, then stop forwarding socket notices.
    pub async fn wait(mut self) -> Result<()> {
        let joined = (&mut self.task).await;
        if let Some(notices) = self.notices.take() {
            notices.abort();
        }
        match joined {
            Ok(result) => Ok(result?),
            Err(e) => Err(std::io::Error::other(e).into()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn local(port: u16) -> ListenConfig {
        ListenConfig {
            port,
            host: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let bound = bind(&local(0)).await.unwrap();
        assert_ne!(bound.local_addr().port(), 0);

        let handle = bound.serve(Router::new().route("/", get(|| async { "ok" })));
        handle.shutdown();
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_port_in_use_is_a_bind_error() {
        let first = bind(&local(0)).await.unwrap();
        let port = first.local_addr().port();

        let err = bind(&local(port)).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_an_address_error() {
        let listen = ListenConfig {
            port: 0,
            host: "no such host".to_string(),
        };
        assert!(matches!(
            bind(&listen).await,
            Err(StartupError::Address { .. })
        ));
    }
}
