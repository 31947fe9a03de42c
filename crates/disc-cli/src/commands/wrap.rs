use super::{read_initial, write_final};
use crate::cli::WrapArgs;
use crate::error::Result;
use discsim::core::topology::Topology;
use discsim::workflows;
use std::sync::Arc;
use tracing::info;

pub fn run(args: WrapArgs) -> Result<()> {
    let mut state = read_initial(args.initial.as_deref())?;
    let topology = match &args.topology {
        Some(path) => Some(Arc::new(Topology::load(path)?)),
        None => None,
    };

    workflows::wrap::run(&mut state, topology)?;
    info!(
        "Installed a convex-hull boundary with area {:.6}",
        state.area()
    );
    write_final(&state, args.output.as_deref())?;
    Ok(())
}
