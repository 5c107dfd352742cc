//! HTTP surface exposing every registered operation under `/v1.0/<action>`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod handler;

pub use error::Error;
pub use handler::{ErrorBody, ErrorCode, METADATA_HEADER_PREFIX};

use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::Router;
use axum::extract::Query;
use axum::routing::{get, post};
use bytes::Bytes;
use keeper_bootable::{Bootable, BootableError};
use keeper_operations::Registry;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Version prefix of every route.
pub const API_PREFIX: &str = "/v1.0";

/// Builds the router: GET for read-only operations, POST for the rest.
pub fn router(registry: &Registry) -> Router {
    let mut router = Router::new();

    for (action, operation) in registry.iter() {
        let path = format!("{API_PREFIX}/{action}");
        let operation = operation.clone();

        let method_router = if operation.is_readonly() {
            get(move |query: Query<HashMap<String, String>>| {
                handler::handle_get(operation.clone(), query)
            })
        } else {
            post(move |body: Bytes| handler::handle_post(operation.clone(), body))
        };

        debug!("routing {}", path);
        router = router.route(&path, method_router);
    }

    router
}

/// HTTP server serving [`router`].
pub struct DispatchServer {
    listen_addr: SocketAddr,
    router: Router,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl DispatchServer {
    /// Creates a server for `registry` that will listen on `listen_addr`.
    #[must_use]
    pub fn new(listen_addr: SocketAddr, registry: &Registry) -> Self {
        Self {
            listen_addr,
            router: router(registry),
            local_addr: Mutex::new(None),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Binds and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an error if already started or the bind fails.
    pub async fn serve(&self) -> Result<SocketAddr, Error> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr.lock().replace(local_addr);

        let router = self.router.clone();
        let shutdown_token = self.shutdown_token.clone();

        self.task_tracker.spawn(async move {
            tokio::select! {
                e = axum::serve(listener, router.into_make_service()).into_future() => {
                    info!("dispatch server exited {:?}", e);
                }
                () = shutdown_token.cancelled() => {}
            };
        });

        self.task_tracker.close();

        info!("dispatch server listening on {}", local_addr);

        Ok(local_addr)
    }
}

#[async_trait]
impl Bootable for DispatchServer {
    fn name(&self) -> &str {
        "dispatch"
    }

    async fn start(&self) -> Result<(), BootableError> {
        self.serve().await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BootableError> {
        info!("dispatch server shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("dispatch server shutdown");

        Ok(())
    }

    async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}
