use super::write_final;
use crate::cli::MakeArgs;
use crate::error::{CliError, Result};
use discsim::core::topology::Topology;
use discsim::workflows;
use discsim::workflows::build::BuildOptions;
use std::sync::Arc;
use tracing::info;

pub fn run(args: MakeArgs) -> Result<()> {
    if args.x_size * args.y_size <= 0.0 {
        return Err(CliError::Argument(
            "the surface area must be positive".to_string(),
        ));
    }
    if args.scale <= 0.0 {
        return Err(CliError::Argument(
            "the placement scale must be positive".to_string(),
        ));
    }

    let topology = match &args.topology {
        Some(path) => Some(Arc::new(Topology::load(path)?)),
        None => None,
    };

    let options = BuildOptions {
        width: args.x_size,
        height: args.y_size,
        counts: args.counts.clone(),
        periodic: args.periodic,
        scale: args.scale,
        max_attempts: args.attempts,
        seed: args.seed,
    };
    let config = workflows::build::run(topology, &options)?;
    info!(
        "Placed {} object(s) in a {} x {} boundary",
        config.n_objects(),
        args.x_size,
        args.y_size
    );
    write_final(&config, args.output.as_deref())?;
    Ok(())
}
