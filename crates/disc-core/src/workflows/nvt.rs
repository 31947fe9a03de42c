use crate::core::config::Configuration;
use crate::core::forcefield::ForceField;
use crate::engine::error::EngineError;
use crate::engine::integrator::{Integrator, relax_hard_contacts};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::trajectory::TrajectoryWriter;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument};

/// Parameters shared by the sampling workflows.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// Total number of trial moves to run.
    pub n_steps: u64,
    /// Steps between reports to the log sink.
    pub print_freq: u64,
    /// Inverse temperature (the ladder maximum for replica exchange).
    pub beta: f64,
    /// Carried for interface symmetry with constant-pressure ensembles;
    /// the NVT acceptance rule ignores it.
    pub pressure: f64,
    /// Steps between trajectory frames; zero disables the trajectory.
    pub traj_freq: u64,
    /// Master seed for the per-integrator random streams.
    pub seed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SamplingOutcome {
    pub final_energy: f64,
    pub n_steps: u64,
    pub acceptance_ratio: f64,
}

pub(crate) fn write_state_report(
    log: &mut dyn Write,
    state: &mut Configuration,
    forces: &ForceField,
) -> std::io::Result<()> {
    writeln!(
        log,
        "U = {:.6}, area = {:.6}, {} object(s)",
        state.energy(forces),
        state.area(),
        state.n_objects()
    )
}

/// Relax hard-core overlaps left over from a lossy reload, logging whether
/// any work was needed.
pub(crate) fn relax_if_needed(
    state: &mut Configuration,
    forces: &Arc<ForceField>,
    options: &SamplingOptions,
    log: &mut dyn Write,
) -> Result<(), EngineError> {
    if state.energy(forces) > forces.big_energy() {
        writeln!(log, "Jiggle is necessary.")?;
        info!("Initial configuration contains hard-core overlaps; relaxing");
        let steps = relax_hard_contacts(state, forces, options.beta, options.pressure, options.seed)?;
        writeln!(log, "After initial adjustment ({steps} small trial moves):")?;
        write_state_report(log, state, forces)?;
    } else {
        writeln!(log, "No jiggle is necessary.")?;
    }
    Ok(())
}

/// Run a canonical-ensemble Monte Carlo trajectory on `state`.
///
/// The configuration is first relaxed if it contains hard-core overlaps,
/// then driven by a single integrator for `n_steps` trials, reporting to
/// `log` every `print_freq` steps and appending a trajectory frame every
/// `traj_freq` steps.
#[instrument(skip_all, name = "nvt_workflow")]
pub fn run(
    state: &mut Configuration,
    forces: &Arc<ForceField>,
    options: &SamplingOptions,
    log: &mut dyn Write,
    mut trajectory: Option<&mut TrajectoryWriter>,
    reporter: &ProgressReporter,
) -> Result<SamplingOutcome, EngineError> {
    if state.n_objects() == 0 {
        return Err(EngineError::EmptyConfiguration);
    }

    writeln!(
        log,
        "After 0 steps, P = {}, beta = {}",
        options.pressure, options.beta
    )?;
    write_state_report(log, state, forces)?;

    reporter.report(Progress::PhaseStart { name: "Relaxation" });
    relax_if_needed(state, forces, options, log)?;
    reporter.report(Progress::PhaseFinish);

    let mut integrator = Integrator::new(Arc::clone(forces), options.seed);
    integrator.d_max = state.width().min(state.height()) / 2.0;

    info!(
        n_steps = options.n_steps,
        beta = options.beta,
        periodic = state.is_periodic(),
        "Starting NVT iteration loop"
    );

    let print_freq = options.print_freq.max(1);
    let traj_freq = if options.traj_freq > 0 {
        options.traj_freq
    } else {
        options.n_steps + 1
    };

    reporter.report(Progress::TaskStart {
        total_steps: options.n_steps,
    });
    let mut done = 0u64;
    while done < options.n_steps {
        let step = (options.n_steps - done)
            .min(print_freq - done % print_freq)
            .min(traj_freq - done % traj_freq);
        integrator.run(state, options.beta, options.pressure, step);
        done += step;

        if done % print_freq == 0 {
            writeln!(
                log,
                "After {} steps, P = {}, beta = {}",
                done, options.pressure, options.beta
            )?;
            write_state_report(log, state, forces)?;
            writeln!(
                log,
                "Accepted {} / rejected {} moves, d_max = {:.6}",
                integrator.n_accepted(),
                integrator.n_rejected(),
                integrator.d_max
            )?;
        }
        if done % traj_freq == 0
            && let Some(trajectory) = trajectory.as_deref_mut()
        {
            trajectory.write_frame(done, state)?;
        }
        reporter.report(Progress::TaskIncrement { steps: step });
    }
    reporter.report(Progress::TaskFinish);

    let outcome = SamplingOutcome {
        final_energy: state.energy(forces),
        n_steps: integrator.n_steps(),
        acceptance_ratio: integrator.acceptance_ratio(),
    };
    writeln!(log, "...Done...")?;
    info!(final_energy = outcome.final_energy, "NVT run complete");
    Ok(outcome)
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

    fn options(n_steps: u64) -> SamplingOptions {
        SamplingOptions {
            n_steps,
            print_freq: 50,
            beta: 1.0,
            pressure: 1.0,
            traj_freq: 0,
            seed: 42,
        }
    }

    fn disc_config(positions: &[(f64, f64)]) -> Configuration {
        let mut config = Configuration::new(Boundary::Rectangle {
            width: 25.0,
            height: 25.0,
        });
        for &(x, y) in positions {
            config.add_object(PlacedObject::new(0, x, y, 0.0));
        }
        config
            .add_topology(Arc::new(Topology::with_disc(1.0)))
            .unwrap();
        config
    }

    #[test]
    fn run_completes_the_requested_number_of_steps_and_reports() {
        let forces = forces();
        let mut state = disc_config(&[(5.0, 5.0), (12.0, 12.0), (18.0, 6.0)]);
        let mut log = Vec::new();

        let outcome = run(
            &mut state,
            &forces,
            &options(200),
            &mut log,
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(outcome.n_steps, 200);
        assert!(outcome.final_energy.is_finite());
        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("No jiggle is necessary."));
        assert!(text.contains("After 200 steps"));
        assert!(text.contains("...Done..."));
    }

    #[test]
    fn overlapping_initial_states_are_relaxed_before_sampling() {
        let forces = forces();
        let mut state = disc_config(&[(12.0, 12.0), (12.6, 12.0)]);
        let mut log = Vec::new();

        let outcome = run(
            &mut state,
            &forces,
            &options(100),
            &mut log,
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(outcome.final_energy <= forces.big_energy());
        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("Jiggle is necessary."));
    }

    #[test]
    fn impossible_overlaps_surface_a_relaxation_error() {
        let forces = forces();
        let mut state = Configuration::new(Boundary::Rectangle {
            width: 3.0,
            height: 3.0,
        });
        for _ in 0..3 {
            state.add_object(PlacedObject::new(0, 1.5, 1.5, 0.0));
        }
        state
            .add_topology(Arc::new(Topology::with_disc(1.0)))
            .unwrap();

        let result = run(
            &mut state,
            &forces,
            &options(100),
            &mut Vec::new(),
            None,
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::Relaxation(_))));
    }

    #[test]
    fn trajectory_frames_follow_the_requested_frequency() {
        let forces = forces();
        let mut state = disc_config(&[(5.0, 5.0), (15.0, 15.0)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.traj");
        let mut trajectory = TrajectoryWriter::create(&path).unwrap();

        let mut opts = options(90);
        opts.traj_freq = 30;
        run(
            &mut state,
            &forces,
            &opts,
            &mut Vec::new(),
            Some(&mut trajectory),
            &ProgressReporter::new(),
        )
        .unwrap();
        trajectory.finish().unwrap();

        let mut decoder = flate2::read::GzDecoder::new(std::fs::File::open(&path).unwrap());
        let mut content = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut content).unwrap();
        assert!(content.contains("====30===="));
        assert!(content.contains("====60===="));
        assert!(content.contains("====90===="));
    }

    #[test]
    fn empty_configurations_are_rejected() {
        let forces = forces();
        let mut state = Configuration::new(Boundary::Rectangle {
            width: 5.0,
            height: 5.0,
        });
        let result = run(
            &mut state,
            &forces,
            &options(10),
            &mut Vec::new(),
            None,
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::EmptyConfiguration)));
    }
}
