use crate::error::{Error, Result};
use crate::framing::{read_frame, write_frame};

use std::fmt::Debug;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Default deadline for one request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client sending one request per connection.
pub struct RpcClient<Req, Res> {
    addr: SocketAddr,
    timeout: Duration,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> Clone for RpcClient<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            timeout: self.timeout,
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> Debug for RpcClient<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("addr", &self.addr)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<Req, Res> RpcClient<Req, Res>
where
    Req: Serialize + Debug + Send + Sync,
    Res: DeserializeOwned + Send,
{
    /// Creates a client for the server at `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
            _marker: PhantomData,
        }
    }

    /// Replaces the per-request deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address of the server.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends `request` and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or exceeds the deadline.
    pub async fn send(&self, request: &Req) -> Result<Res> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: &Req) -> Result<Res> {
        debug!("sending request: {:?}", request);

        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(|e| Error::Io("failed to connect", e))?;

        write_frame(&mut stream, request).await?;

        let response = read_frame(&mut stream)
            .await?
            .ok_or_else(|| {
                Error::Io(
                    "connection closed before response",
                    std::io::ErrorKind::UnexpectedEof.into(),
                )
            })?;

        let _ = stream.shutdown().await;

        Ok(response)
    }
}
