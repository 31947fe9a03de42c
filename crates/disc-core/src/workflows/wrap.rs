use crate::core::config::Configuration;
use crate::core::topology::Topology;
use crate::engine::error::EngineError;
use std::sync::Arc;
use tracing::{info, instrument};

/// Replace the boundary of `state` with a convex hull wrapped snugly
/// around its objects: the hull of the object centres, inflated by the
/// topology's maximal atom extent so every finite object fits inside. The
/// resulting boundary is polygonal and aperiodic.
///
/// Without a supplied topology the objects are treated as unit discs.
#[instrument(skip_all, name = "wrap_workflow")]
pub fn run(
    state: &mut Configuration,
    topology: Option<Arc<Topology>>,
) -> Result<(), EngineError> {
    if state.n_objects() < 3 {
        return Err(EngineError::DegenerateHull);
    }
    let topology = topology.unwrap_or_else(|| Arc::new(Topology::with_disc(1.0)));
    state.add_topology(topology)?;

    let hull = state.convex_hull(true);
    info!(
        n_vertices = hull.n_vertices(),
        area = hull.area(),
        "Wrapped configuration in an inflated convex hull"
    );
    state.set_polygon(hull);
    Ok(())
}
