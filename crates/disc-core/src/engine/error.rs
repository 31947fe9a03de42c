use crate::core::config::{ConfigLoadError, TopologyBindError};
use crate::core::forcefield::ForceFieldLoadError;
use crate::core::topology::TopologyLoadError;
use crate::engine::integrator::RelaxationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error(transparent)]
    Topology(#[from] TopologyLoadError),

    #[error(transparent)]
    ForceField(#[from] ForceFieldLoadError),

    #[error(transparent)]
    Bind(#[from] TopologyBindError),

    #[error(transparent)]
    Relaxation(#[from] RelaxationError),

    #[error(
        "Unable to place object {object_index} of molecule type {molecule_index} without collisions after {attempts} attempts; raise the attempt cap, or place into a larger area and shrink it afterwards"
    )]
    Placement {
        object_index: usize,
        molecule_index: usize,
        attempts: usize,
    },

    #[error("The topology defines {available} molecule type(s) but type {requested} was requested")]
    UnknownMoleculeType { requested: usize, available: usize },

    #[error("The configuration contains no objects")]
    EmptyConfiguration,

    #[error("Cannot wrap fewer than three objects in a convex hull")]
    DegenerateHull,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
