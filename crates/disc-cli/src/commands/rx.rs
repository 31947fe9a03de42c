use super::{apply_periodicity, open_log, read_initial, sampling_options, write_final};
use crate::cli::RxArgs;
use crate::error::{CliError, Result};
use crate::progress::CliProgressHandler;
use discsim::core::forcefield::ForceField;
use discsim::core::topology::Topology;
use discsim::engine::progress::ProgressReporter;
use discsim::workflows;
use discsim::workflows::replica_exchange::ReplicaOptions;
use std::sync::Arc;
use tracing::info;

pub fn run(args: RxArgs) -> Result<()> {
    let sampling = sampling_options(&args.sample)?;
    if args.replicas == 0 || args.replicas > 999 {
        return Err(CliError::Argument(
            "the replica count must be between 1 and 999".to_string(),
        ));
    }

    let mut state = read_initial(args.sample.initial.as_deref())?;
    let forces = Arc::new(ForceField::load(&args.sample.forcefield)?);
    let topology = Arc::new(Topology::load(&args.sample.topology)?);
    state.add_topology(topology)?;
    apply_periodicity(&mut state, args.sample.periodic);

    let options = ReplicaOptions {
        sampling,
        n_replicas: args.replicas,
        log_path: args.sample.log_file.clone(),
        traj_path: args.sample.trajectory.clone(),
    };

    let mut log = open_log(args.sample.log_file.as_ref())?;
    let progress = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    let outcome = workflows::replica_exchange::run(&mut state, &forces, &options, &mut log, &reporter)?;
    info!(
        "Replica exchange finished: {} of {} swap attempt(s) accepted, coldest U = {:.6}",
        outcome.total_swaps, outcome.total_attempts, outcome.final_energy
    );
    write_final(&state, args.sample.output.as_deref())?;
    Ok(())
}
