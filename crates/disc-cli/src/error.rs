use discsim::core::config::{ConfigLoadError, TopologyBindError};
use discsim::core::forcefield::ForceFieldLoadError;
use discsim::core::topology::TopologyLoadError;
use discsim::engine::error::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error(transparent)]
    Topology(#[from] TopologyLoadError),

    #[error(transparent)]
    ForceField(#[from] ForceFieldLoadError),

    #[error(transparent)]
    Bind(#[from] TopologyBindError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
