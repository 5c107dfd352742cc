//! Operation contract, registry and every built-in operation of the agent.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod operation;
mod registry;
mod reporter;
mod request;
mod settings;
mod subscription;

pub mod ops;
pub mod volume;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use operation::{DEFAULT_TIMEOUT, EVENT_COMPONENT, InitContext, Operation, OperationBase};
pub use registry::{Registry, RegistryBuilder};
pub use reporter::{EventEmitter, FailureReporter};
pub use request::{OpsEvent, OpsRequest, OpsResponse};
pub use settings::{
    KubeletSettings, MAX_REPORT_FREQUENCY, MIN_REPORT_FREQUENCY, ProbeSettings, Settings,
    VolumeProtectionSettings, VolumeSpec,
};
pub use subscription::RoleSubscription;
