use super::{apply_periodicity, open_log, read_initial, sampling_options, write_final};
use crate::cli::SampleArgs;
use crate::error::Result;
use crate::progress::CliProgressHandler;
use discsim::core::forcefield::ForceField;
use discsim::core::topology::Topology;
use discsim::engine::progress::ProgressReporter;
use discsim::engine::trajectory::TrajectoryWriter;
use discsim::workflows;
use std::sync::Arc;
use tracing::{debug, info};

pub fn run(args: SampleArgs) -> Result<()> {
    let options = sampling_options(&args)?;

    let mut state = read_initial(args.initial.as_deref())?;
    let forces = Arc::new(ForceField::load(&args.forcefield)?);
    let topology = Arc::new(Topology::load(&args.topology)?);
    info!(
        "Loaded force field ({} type(s)) and topology ({} molecule(s))",
        forces.n_types(),
        topology.n_molecules()
    );
    debug!("{}", forces);
    state.add_topology(topology)?;
    apply_periodicity(&mut state, args.periodic);

    let mut log = open_log(args.log_file.as_ref())?;
    let mut trajectory = match (&args.trajectory, options.traj_freq) {
        (Some(path), freq) if freq > 0 => Some(TrajectoryWriter::create(path)?),
        _ => None,
    };

    let progress = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    let outcome = workflows::nvt::run(
        &mut state,
        &forces,
        &options,
        &mut log,
        trajectory.as_mut(),
        &reporter,
    )?;
    if let Some(trajectory) = trajectory {
        trajectory.finish()?;
    }

    info!(
        "NVT run finished after {} steps with U = {:.6}",
        outcome.n_steps, outcome.final_energy
    );
    write_final(&state, args.output.as_deref())?;
    Ok(())
}
