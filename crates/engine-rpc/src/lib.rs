//! Side-channel procedure interface for engine managers running out of process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod client;
mod error;
mod protocol;
mod server;

pub use client::RemoteEngineManager;
pub use error::Error;
pub use protocol::{EngineRequest, EngineResponse};
pub use server::{EngineHandler, EngineRpcServer, engine_rpc_server};
