//! Health-check protocol answered by the role check.
//!
//! `Check` runs the role check once, bounded by its timeout. A steady role, or
//! a role that could not be read this time, is `Serving`. A role change or an
//! error is `NotServing` with the detail. `Watch` is not supported.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use keeper_operations::{Error, Operation, OpsRequest};
use keeper_rpc::{RpcClient, RpcHandler, RpcServer};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Health-check request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HealthRequest {
    /// Answer once.
    Check {
        /// Service name, informational.
        service: String,
    },

    /// Stream status changes. Not supported.
    Watch {
        /// Service name, informational.
        service: String,
    },
}

/// Health-check answer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HealthResponse {
    /// The role is steady.
    Serving,

    /// The role changed or the check errored.
    NotServing {
        /// Why.
        error: Option<String>,
    },

    /// The request kind is not supported.
    Unimplemented,
}

/// Server answering health checks.
pub type HealthServer = RpcServer<HealthHandler>;

/// Client for [`HealthServer`].
pub type HealthClient = RpcClient<HealthRequest, HealthResponse>;

/// Creates a server answering with `check_role` on `listen_addr`.
pub fn health_server(listen_addr: SocketAddr, check_role: Arc<dyn Operation>) -> HealthServer {
    RpcServer::new("health server", listen_addr, HealthHandler { check_role })
}

/// Runs the role check for each request.
pub struct HealthHandler {
    check_role: Arc<dyn Operation>,
}

impl HealthHandler {
    async fn check(&self) -> HealthResponse {
        let timeout = self.check_role.timeout();
        let result = tokio::time::timeout(timeout, self.check_role.run(OpsRequest::default()))
            .await
            .unwrap_or(Err(Error::Timeout(timeout)));

        // A failed role read comes back as Ok and must not fail the caller.
        match result {
            Ok(_) => HealthResponse::Serving,
            Err(Error::Probe(detail)) => HealthResponse::NotServing {
                error: Some(detail),
            },
            Err(e) => HealthResponse::NotServing {
                error: Some(e.to_string()),
            },
        }
    }
}

#[async_trait]
impl RpcHandler for HealthHandler {
    type Request = HealthRequest;
    type Response = HealthResponse;

    async fn handle(&self, request: HealthRequest) -> HealthResponse {
        match request {
            HealthRequest::Check { service } => {
                debug!("health check for {:?}", service);
                self.check().await
            }
            HealthRequest::Watch { .. } => HealthResponse::Unimplemented,
        }
    }
}
