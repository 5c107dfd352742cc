use crate::error::{Error, Result};
use crate::framing::{read_frame, write_frame};

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use keeper_bootable::{Bootable, BootableError};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Handles decoded requests.
#[async_trait]
pub trait RpcHandler
where
    Self: Send + Sync + 'static,
{
    /// Request type read from the wire.
    type Request: DeserializeOwned + Debug + Send;

    /// Response type written to the wire.
    type Response: Serialize + Send + Sync;

    /// Produces the response for one request.
    async fn handle(&self, request: Self::Request) -> Self::Response;
}

/// TCP server answering framed requests with `H`.
///
/// A connection may carry several requests in sequence; each gets one response.
pub struct RpcServer<H: RpcHandler> {
    name: String,
    listen_addr: SocketAddr,
    handler: Arc<H>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl<H: RpcHandler> RpcServer<H> {
    /// Creates a server named `name` that will listen on `listen_addr`.
    pub fn new(name: impl Into<String>, listen_addr: SocketAddr, handler: H) -> Self {
        Self {
            name: name.into(),
            listen_addr,
            handler: Arc::new(handler),
            local_addr: Mutex::new(None),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Binds and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if already started or the bind fails.
    pub async fn serve(&self) -> Result<SocketAddr> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| Error::Io("failed to bind listener", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io("failed to read bound address", e))?;
        self.local_addr.lock().replace(local_addr);

        info!("{} listening on {}", self.name, local_addr);

        let handler = self.handler.clone();
        let shutdown_token = self.shutdown_token.clone();
        let task_tracker = self.task_tracker.clone();

        self.task_tracker.spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("accepted connection from {}", peer);
                            let handler = handler.clone();
                            let token = shutdown_token.clone();
                            task_tracker.spawn(async move {
                                tokio::select! {
                                    result = serve_connection(stream, handler) => {
                                        if let Err(e) = result {
                                            warn!("connection from {} failed: {}", peer, e);
                                        }
                                    }
                                    () = token.cancelled() => {}
                                }
                            });
                        }
                        Err(e) => warn!("failed to accept connection: {}", e),
                    },
                    () = shutdown_token.cancelled() => break,
                }
            }
        });

        self.task_tracker.close();

        Ok(local_addr)
    }
}

async fn serve_connection<H: RpcHandler>(mut stream: TcpStream, handler: Arc<H>) -> Result<()> {
    while let Some(request) = read_frame::<_, H::Request>(&mut stream).await? {
        debug!("received request: {:?}", request);
        let response = handler.handle(request).await;
        write_frame(&mut stream, &response).await?;
    }

    Ok(())
}

#[async_trait]
impl<H: RpcHandler> Bootable for RpcServer<H> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> std::result::Result<(), BootableError> {
        self.serve().await?;
        Ok(())
    }

    async fn shutdown(&self) -> std::result::Result<(), BootableError> {
        info!("{} shutting down...", self.name);

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("{} shutdown", self.name);

        Ok(())
    }

    async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}
