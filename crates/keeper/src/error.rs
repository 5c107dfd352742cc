use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Reading the config file failed.
    #[error("failed to read config {0}: {1}")]
    ReadConfig(String, #[source] std::io::Error),

    /// The config file is not valid TOML for [`crate::config::Config`].
    #[error("invalid config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// The configured built-in engine is unknown.
    #[error("unknown engine {0}")]
    UnknownEngine(String),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),

    /// Invalid log filter.
    #[error("invalid log level: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Engine manager setup failed.
    #[error(transparent)]
    Engine(#[from] keeper_engine::Error),

    /// Connecting to the remote engine manager failed.
    #[error(transparent)]
    RemoteEngine(#[from] keeper_engine_rpc::Error),

    /// Building the operation registry failed.
    #[error(transparent)]
    Operations(#[from] keeper_operations::Error),

    /// Building the scheduler failed.
    #[error(transparent)]
    Scheduler(#[from] keeper_scheduler::Error),

    /// A service failed to start.
    #[error("failed to start {0}: {1}")]
    Start(String, keeper_bootable::BootableError),

    /// Waiting for the shutdown signal failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
