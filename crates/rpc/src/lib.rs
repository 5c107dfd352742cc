//! Request/response rpc over TCP with length-prefixed CBOR frames.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod client;
mod error;
pub mod framing;
mod server;

pub use client::{DEFAULT_TIMEOUT, RpcClient};
pub use error::{Error, Result};
pub use server::{RpcHandler, RpcServer};
