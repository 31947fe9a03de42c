use super::nvt::{SamplingOptions, relax_if_needed, write_state_report};
use crate::core::config::Configuration;
use crate::core::forcefield::ForceField;
use crate::engine::error::EngineError;
use crate::engine::integrator::Integrator;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::replica::{Replica, ReplicaExchange, ladder_beta};
use crate::engine::trajectory::{TrajectoryWriter, replica_file_name};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Exchange attempts are spaced proportionally to the object count, and
/// the ladder is retuned every twenty exchange intervals.
const EXCHANGE_TRIALS_PER_OBJECT: u64 = 20;
const LADDER_ADJUST_INTERVALS: u64 = 20;

#[derive(Debug, Clone)]
pub struct ReplicaOptions {
    pub sampling: SamplingOptions,
    pub n_replicas: usize,
    /// Base name for the per-replica log files; replica indices are
    /// inserted before the extension. Without it replica logs are dropped.
    pub log_path: Option<PathBuf>,
    /// Base name for the per-replica trajectory files.
    pub traj_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplicaOutcome {
    /// Final energy of the replica holding the coldest ladder position.
    pub final_energy: f64,
    pub n_steps: u64,
    pub total_swaps: u64,
    pub total_attempts: u64,
}

/// Run a parallel-tempering replica-exchange trajectory.
///
/// `state` seeds every chain and receives the coldest chain's final
/// configuration. Chains advance in parallel within a round and are fully
/// joined before each exchange attempt; the temperature ladder is retuned
/// periodically from the observed swap counts.
#[instrument(skip_all, name = "replica_exchange_workflow")]
pub fn run(
    state: &mut Configuration,
    forces: &Arc<ForceField>,
    options: &ReplicaOptions,
    log: &mut dyn Write,
    reporter: &ProgressReporter,
) -> Result<ReplicaOutcome, EngineError> {
    if state.n_objects() == 0 {
        return Err(EngineError::EmptyConfiguration);
    }
    let n_replicas = options.n_replicas.max(1);
    let sampling = &options.sampling;
    let beta_max = sampling.beta;

    writeln!(
        log,
        "After 0 steps, P = {}, beta = {}",
        sampling.pressure, beta_max
    )?;
    write_state_report(log, state, forces)?;

    reporter.report(Progress::PhaseStart { name: "Relaxation" });
    relax_if_needed(state, forces, sampling, log)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Replica setup",
    });
    let mut replicas = Vec::with_capacity(n_replicas);
    for index in 0..n_replicas {
        let mut replica = Replica::new(
            ladder_beta(index, n_replicas, beta_max),
            sampling.pressure,
            state.clone(),
            Integrator::new(Arc::clone(forces), sampling.seed.wrapping_add(1 + index as u64)),
        );
        if sampling.traj_freq > 0
            && let Some(base) = &options.traj_path
        {
            replica.trajectory = Some(TrajectoryWriter::create(&replica_file_name(base, index))?);
        }
        if let Some(base) = &options.log_path {
            let file = std::fs::File::create(replica_file_name(base, index))?;
            replica.log = Some(Box::new(file));
        }
        info!(index, beta = replica.beta, "Prepared replica");
        replicas.push(replica);
    }
    let mut exchange = ReplicaExchange::new(replicas, beta_max, sampling.seed);
    reporter.report(Progress::PhaseFinish);

    let print_freq = sampling.print_freq.max(1);
    let traj_freq = if sampling.traj_freq > 0 {
        sampling.traj_freq
    } else {
        sampling.n_steps + 1
    };
    let exchange_freq = EXCHANGE_TRIALS_PER_OBJECT * state.n_objects() as u64;
    let adjust_freq = LADDER_ADJUST_INTERVALS * exchange_freq;

    info!(
        n_replicas,
        exchange_freq, adjust_freq, "Starting replica-exchange iteration loop"
    );
    reporter.report(Progress::TaskStart {
        total_steps: sampling.n_steps,
    });

    let mut total_swaps = 0u64;
    let mut total_attempts = 0u64;
    let mut done = 0u64;
    while done < sampling.n_steps {
        let step = (sampling.n_steps - done)
            .min(print_freq - done % print_freq)
            .min(traj_freq - done % traj_freq)
            .min(exchange_freq - done % exchange_freq);

        exchange.advance_all(done, step, print_freq, traj_freq)?;
        done += step;

        if done % exchange_freq == 0 {
            exchange.attempt_exchange();
        }
        if done % adjust_freq == 0 {
            let (swaps, attempts) = exchange.exchange_stats();
            total_swaps += swaps;
            total_attempts += attempts;
            writeln!(
                log,
                "At step {done}. Made {swaps} out of {attempts} swap attempt(s)"
            )?;
            if let Some(ladder) = exchange.adjust_ladder() {
                writeln!(log, "Betas adjusted to: {ladder:?}")?;
            }
        }
        reporter.report(Progress::TaskIncrement { steps: step });
    }
    reporter.report(Progress::TaskFinish);

    let (swaps, attempts) = exchange.exchange_stats();
    total_swaps += swaps;
    total_attempts += attempts;

    let coldest = exchange.coldest();
    info!(
        final_energy = coldest.energy,
        total_swaps, "Replica-exchange run complete; adopting the coldest replica"
    );
    *state = coldest.config.clone();
    let final_energy = state.energy(forces);

    for replica in exchange.into_replicas() {
        if let Some(trajectory) = replica.trajectory {
            trajectory.finish()?;
        }
    }

    writeln!(log, "...Done...")?;
    Ok(ReplicaOutcome {
        final_energy,
        n_steps: done,
        total_swaps,
        total_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::Boundary;
    use crate::core::config::PlacedObject;
    use crate::core::topology::Topology;
    use std::io::Cursor;

    const SINGLE_DISC_FF: &str = "1\n1.0\nred\n5.0 1.0\n-1.0\n";

    fn forces() -> Arc<ForceField> {
        Arc::new(ForceField::read_from(Cursor::new(SINGLE_DISC_FF)).unwrap())
    }

    fn disc_config() -> Configuration {
        let mut config = Configuration::new(Boundary::Rectangle {
            width: 25.0,
            height: 25.0,
        });
        for &(x, y) in &[(5.0, 5.0), (12.0, 12.0), (18.0, 6.0), (6.0, 18.0)] {
            config.add_object(PlacedObject::new(0, x, y, 0.0));
        }
        config
            .add_topology(Arc::new(Topology::with_disc(1.0)))
            .unwrap();
        config
    }

    fn options(n_replicas: usize, n_steps: u64) -> ReplicaOptions {
        ReplicaOptions {
            sampling: SamplingOptions {
                n_steps,
                print_freq: 100,
                beta: 2.0,
                pressure: 1.0,
                traj_freq: 0,
                seed: 9,
            },
            n_replicas,
            log_path: None,
            traj_path: None,
        }
    }

    #[test]
    fn run_advances_all_replicas_and_adopts_the_coldest() {
        let forces = forces();
        let mut state = disc_config();
        let mut log = Vec::new();

        let outcome = run(
            &mut state,
            &forces,
            &options(3, 400),
            &mut log,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(outcome.n_steps, 400);
        assert!(outcome.final_energy.is_finite());
        assert!(outcome.total_attempts > 0);
        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("...Done..."));
    }

    #[test]
    fn per_replica_sinks_are_created_with_indexed_names() {
        let forces = forces();
        let mut state = disc_config();
        let dir = tempfile::tempdir().unwrap();

        let mut opts = options(2, 200);
        opts.sampling.traj_freq = 100;
        opts.log_path = Some(dir.path().join("run.log"));
        opts.traj_path = Some(dir.path().join("run.traj"));

        run(
            &mut state,
            &forces,
            &opts,
            &mut Vec::new(),
            &ProgressReporter::new(),
        )
        .unwrap();

        for index in 0..2 {
            assert!(dir.path().join(format!("run{index:03}.log")).exists());
            assert!(dir.path().join(format!("run{index:03}.traj")).exists());
        }
        let content = std::fs::read_to_string(dir.path().join("run000.log")).unwrap();
        assert!(content.contains("beta ="));
    }

    #[test]
    fn a_single_replica_degenerates_to_plain_sampling() {
        let forces = forces();
        let mut state = disc_config();
        let outcome = run(
            &mut state,
            &forces,
            &options(1, 150),
            &mut Vec::new(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(outcome.n_steps, 150);
        assert_eq!(outcome.total_attempts, 0);
    }
}
