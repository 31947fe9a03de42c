use crate::core::config::Configuration;
use crate::core::forcefield::ForceField;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const DEFAULT_ADJUST_PERIOD: u64 = 1000;
const ACCEPTANCE_LOW: f64 = 0.3;
const ACCEPTANCE_HIGH: f64 = 0.7;
const STEP_SHRINK: f64 = 3.9;
const STEP_GROW: f64 = 3.0;

/// The Metropolis trial-move engine with adaptive step-size control.
///
/// Each integrator owns its random stream, seeded deterministically, so a
/// run is reproducible and replicas can advance in parallel without
/// sharing mutable state.
pub struct Integrator {
    forces: Arc<ForceField>,
    /// Maximum displacement scale for trial moves.
    pub d_max: f64,
    /// Number of trial moves between step-size recalibrations.
    pub i_adjust: u64,
    n_good: u64,
    n_bad: u64,
    n_step: u64,
    rng: StdRng,
}

impl Integrator {
    pub fn new(forces: Arc<ForceField>, seed: u64) -> Self {
        Self {
            forces,
            d_max: 1.0,
            i_adjust: DEFAULT_ADJUST_PERIOD,
            n_good: 0,
            n_bad: 0,
            n_step: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn forces(&self) -> &Arc<ForceField> {
        &self.forces
    }

    /// Accepted moves since the last recalibration.
    pub fn n_accepted(&self) -> u64 {
        self.n_good
    }

    /// Rejected moves since the last recalibration.
    pub fn n_rejected(&self) -> u64 {
        self.n_bad
    }

    /// Lifetime trial count.
    pub fn n_steps(&self) -> u64 {
        self.n_step
    }

    pub fn acceptance_ratio(&self) -> f64 {
        let total = self.n_good + self.n_bad;
        if total == 0 {
            return 0.0;
        }
        self.n_good as f64 / total as f64
    }

    /// Run `n_steps` Metropolis trials on `state` at inverse temperature
    /// `beta`, returning the lifetime trial count. The pressure is carried
    /// for interface symmetry with constant-pressure ensembles and does not
    /// enter the acceptance rule.
    pub fn run(
        &mut self,
        state: &mut Configuration,
        beta: f64,
        pressure: f64,
        n_steps: u64,
    ) -> u64 {
        let _ = pressure;
        for _ in 0..n_steps {
            if self.n_step > 0 && self.n_step % self.i_adjust == 0 {
                self.recalibrate(state);
            }

            let mut candidate = state.clone();
            let index = self.rng.gen_range(0..state.n_objects());
            // Stale neighbours of both the old and the new position would
            // otherwise survive in the cache.
            candidate.invalidate_within(self.forces.cut_off(), index);
            candidate.move_object(index, self.d_max, &mut self.rng);
            candidate.invalidate_within(self.forces.cut_off(), index);

            let delta = candidate.energy(&self.forces) - state.energy(&self.forces);
            let acceptance = (-beta * delta).exp().min(1.0);
            if self.rng.gen_range(0.0f64..1.0) <= acceptance {
                *state = candidate;
                self.n_good += 1;
            } else {
                self.n_bad += 1;
            }
            self.n_step += 1;
        }
        self.n_step
    }

    fn recalibrate(&mut self, state: &Configuration) {
        let ratio = self.acceptance_ratio();
        if ratio < ACCEPTANCE_LOW {
            self.d_max /= STEP_SHRINK;
        }
        if ratio > ACCEPTANCE_HIGH {
            self.d_max *= STEP_GROW;
        }
        self.d_max = self.d_max.min(state.width()).min(state.height());
        debug!(
            acceptance = ratio,
            d_max = self.d_max,
            "Recalibrated maximum displacement"
        );
        self.n_good = 0;
        self.n_bad = 0;
    }
}

#[derive(Debug, Error)]
#[error(
    "Unable to relax initial hard-core overlaps within {steps} trial moves; rebuild the initial configuration or enlarge the area"
)]
pub struct RelaxationError {
    pub steps: u64,
}

/// Remove hard-core overlaps left by a lossy reload: while the total
/// energy exceeds `big_energy`, run short bursts of small-step integration
/// (a fresh integrator per burst, the step scale carried across). Gives up
/// after 2000 trials per object.
pub fn relax_hard_contacts(
    state: &mut Configuration,
    forces: &Arc<ForceField>,
    beta: f64,
    pressure: f64,
    seed: u64,
) -> Result<u64, RelaxationError> {
    let n_objects = state.n_objects() as u64;
    let mut d_max = 0.5;
    let mut steps = 0u64;
    let mut burst = 0u64;

    while state.energy(forces) > forces.big_energy() {
        if steps > 2000 * n_objects {
            return Err(RelaxationError { steps });
        }
        let mut integrator = Integrator::new(Arc::clone(forces), seed.wrapping_add(burst));
        integrator.d_max = d_max;
        integrator.run(state, beta, pressure, 2 * n_objects);
        d_max = integrator.d_max;
        steps += 2 * n_objects;
        burst += 1;
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::Boundary;
    use crate::core::config::PlacedObject;
    use crate::core::forcefield::ForceField;
    use crate::core::topology::Topology;
    use std::io::Cursor;

    // One disc type: R = 1, lambda = 1, eps = -1, cutoff = 5.
    const SINGLE_DISC_FF: &str = "1\n1.0\nred\n5.0 1.0\n-1.0\n";

    fn single_disc_ff() -> Arc<ForceField> {
        Arc::new(ForceField::read_from(Cursor::new(SINGLE_DISC_FF)).unwrap())
    }

    fn disc_config(width: f64, positions: &[(f64, f64)]) -> Configuration {
        let mut config = Configuration::new(Boundary::Rectangle {
            width,
            height: width,
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
    fn run_performs_exactly_the_requested_number_of_trials() {
        let forces = single_disc_ff();
        let mut state = disc_config(20.0, &[(5.0, 5.0), (12.0, 12.0)]);
        let mut integrator = Integrator::new(Arc::clone(&forces), 1);
        assert_eq!(integrator.run(&mut state, 1.0, 1.0, 50), 50);
        assert_eq!(integrator.run(&mut state, 1.0, 1.0, 25), 75);
        assert_eq!(integrator.n_accepted() + integrator.n_rejected(), 75);
    }

    #[test]
    fn identical_seeds_reproduce_the_same_trajectory() {
        let forces = single_disc_ff();
        let initial = disc_config(20.0, &[(5.0, 5.0), (12.0, 12.0), (15.0, 5.0)]);

        let mut state_a = initial.clone();
        let mut state_b = initial.clone();
        Integrator::new(Arc::clone(&forces), 99).run(&mut state_a, 2.0, 1.0, 200);
        Integrator::new(Arc::clone(&forces), 99).run(&mut state_b, 2.0, 1.0, 200);

        for (a, b) in state_a.objects().iter().zip(state_b.objects()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.orientation, b.orientation);
        }
    }

    #[test]
    fn energy_never_exceeds_big_energy_after_relaxation() {
        let forces = single_disc_ff();
        // Two overlapping discs well inside a roomy box.
        let mut state = disc_config(30.0, &[(15.0, 15.0), (15.8, 15.0)]);
        assert!(state.energy(&forces) > forces.big_energy());

        let steps = relax_hard_contacts(&mut state, &forces, 1.0, 1.0, 7).unwrap();
        assert!(steps <= 2000 * 2);
        assert!(state.energy(&forces) <= forces.big_energy());
    }

    #[test]
    fn relaxation_reports_failure_when_overlaps_cannot_be_removed() {
        let forces = single_disc_ff();
        // Three discs of radius 1 cannot fit a 3 x 3 box at all.
        let mut state = disc_config(3.0, &[(1.5, 1.5), (1.5, 1.5), (1.5, 1.5)]);
        let err = relax_hard_contacts(&mut state, &forces, 1.0, 1.0, 7).unwrap_err();
        assert!(err.steps > 2000 * 3);
    }

    #[test]
    fn adaptive_step_settles_the_acceptance_ratio_into_the_target_band() {
        let forces = single_disc_ff();
        // A moderately dense system: nine discs in a 12 x 12 box.
        let mut positions = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                positions.push((2.5 + 3.5 * col as f64, 2.5 + 3.5 * row as f64));
            }
        }
        let mut state = disc_config(12.0, &positions);

        let mut integrator = Integrator::new(Arc::clone(&forces), 5);
        integrator.d_max = 0.1;
        integrator.i_adjust = 200;
        integrator.run(&mut state, 1.0, 1.0, 100 * 200);

        let ratio = integrator.acceptance_ratio();
        assert!(
            (ACCEPTANCE_LOW..=ACCEPTANCE_HIGH).contains(&ratio),
            "acceptance ratio {ratio} left the target band"
        );
    }

    #[test]
    fn hard_core_overlaps_are_never_accepted_at_high_beta() {
        let forces = single_disc_ff();
        // A bound pair at contact distance; at beta = 50 any move into the
        // hard core or through a wall is effectively certain to be
        // rejected.
        let mut state = disc_config(20.0, &[(9.0, 10.0), (11.0, 10.0)]);
        let mut integrator = Integrator::new(Arc::clone(&forces), 17);
        integrator.d_max = 5.0;
        integrator.run(&mut state, 50.0, 1.0, 300);
        assert!(!state.test_clash());
        assert!(state.energy(&forces) <= 0.0);
    }
}
