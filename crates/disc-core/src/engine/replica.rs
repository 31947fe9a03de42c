use super::integrator::Integrator;
use super::trajectory::TrajectoryWriter;
use crate::core::config::Configuration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// One chain of the replica-exchange ensemble: an owned configuration and
/// integrator running at a ladder-assigned inverse temperature, plus the
/// chain's private output sinks.
pub struct Replica {
    pub beta: f64,
    pub pressure: f64,
    pub config: Configuration,
    pub integrator: Integrator,
    /// Energy observed at the end of the last round, read by the exchange
    /// rule after all chains have quiesced.
    pub energy: f64,
    pub trajectory: Option<TrajectoryWriter>,
    pub log: Option<Box<dyn Write + Send>>,
}

impl Replica {
    pub fn new(beta: f64, pressure: f64, config: Configuration, integrator: Integrator) -> Self {
        Self {
            beta,
            pressure,
            config,
            integrator,
            energy: 0.0,
            trajectory: None,
            log: None,
        }
    }

    /// Advance this chain by `step` trials and service its sinks. Runs on
    /// its own task during a round; no state is shared with other chains.
    fn advance(
        &mut self,
        at_step: u64,
        step: u64,
        print_freq: u64,
        traj_freq: u64,
    ) -> io::Result<()> {
        self.integrator
            .run(&mut self.config, self.beta, self.pressure, step);

        let forces = Arc::clone(self.integrator.forces());
        self.energy = self.config.energy(&forces);

        let reached = at_step + step;
        if print_freq > 0
            && reached % print_freq == 0
            && let Some(log) = &mut self.log
        {
            writeln!(
                log,
                "After {} steps, P = {}, beta = {}",
                reached, self.pressure, self.beta
            )?;
            writeln!(
                log,
                "U = {:.6}, area = {:.6}, {} object(s)",
                self.energy,
                self.config.area(),
                self.config.n_objects()
            )?;
            writeln!(
                log,
                "Accepted {} / rejected {} moves, d_max = {:.6}",
                self.integrator.n_accepted(),
                self.integrator.n_rejected(),
                self.integrator.d_max
            )?;
        }
        if traj_freq > 0
            && reached % traj_freq == 0
            && let Some(trajectory) = &mut self.trajectory
        {
            trajectory.write_frame(reached, &self.config)?;
        }
        Ok(())
    }
}

/// Coordinator for R independent chains at different inverse temperatures.
///
/// The ladder position r holds inverse temperature beta_r with beta_0 the
/// hottest and beta_{R-1} = beta_max; `order` records which replica
/// currently occupies which ladder position. Chains advance in parallel
/// within a round and are fully joined before any exchange attempt.
pub struct ReplicaExchange {
    replicas: Vec<Replica>,
    order: Vec<usize>,
    swaps: Vec<u64>,
    exchange_count: u64,
    exchange_max: u64,
    beta_max: f64,
    rng: StdRng,
}

/// Initial ladder value: beta_max * (r + 1) / R for ladder position r.
pub fn ladder_beta(position: usize, n_replicas: usize, beta_max: f64) -> f64 {
    beta_max * (position + 1) as f64 / n_replicas as f64
}

impl ReplicaExchange {
    pub fn new(replicas: Vec<Replica>, beta_max: f64, seed: u64) -> Self {
        let n = replicas.len();
        Self {
            replicas,
            order: (0..n).collect(),
            swaps: vec![0; n.saturating_sub(1)],
            exchange_count: 0,
            exchange_max: 0,
            beta_max,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn n_replicas(&self) -> usize {
        self.replicas.len()
    }

    pub fn replica(&self, index: usize) -> &Replica {
        &self.replicas[index]
    }

    /// Ladder order: `order()[r]` is the replica currently at position r.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// The replica at the top of the ladder (beta = beta_max).
    pub fn coldest(&self) -> &Replica {
        &self.replicas[self.order[self.replicas.len() - 1]]
    }

    pub fn swap_counts(&self) -> &[u64] {
        &self.swaps
    }

    /// (swaps made, swaps attempted) since the last ladder adjustment.
    pub fn exchange_stats(&self) -> (u64, u64) {
        (self.exchange_count, self.exchange_max)
    }

    pub fn into_replicas(self) -> Vec<Replica> {
        self.replicas
    }

    /// Advance every chain by `step` trials in parallel, joining all of
    /// them before returning.
    pub fn advance_all(
        &mut self,
        at_step: u64,
        step: u64,
        print_freq: u64,
        traj_freq: u64,
    ) -> io::Result<()> {
        self.replicas
            .par_iter_mut()
            .map(|replica| replica.advance(at_step, step, print_freq, traj_freq))
            .collect()
    }

    /// Metropolis exchange on inverse temperature for every adjacent pair
    /// of ladder positions.
    pub fn attempt_exchange(&mut self) {
        for r in 0..self.replicas.len().saturating_sub(1) {
            let a = self.order[r];
            let b = self.order[r + 1];
            let delta = self.replicas[a].energy - self.replicas[b].energy;
            let beta_mean = (self.replicas[a].beta + self.replicas[b].beta) / 2.0;
            let acceptance = (-delta * beta_mean).exp().min(1.0);

            if acceptance > self.rng.gen_range(0.0f64..1.0) {
                debug!(
                    edge = r,
                    delta, "Swapping replicas {a} and {b} on the ladder"
                );
                self.order.swap(r, r + 1);
                let beta_a = self.replicas[a].beta;
                self.replicas[a].beta = self.replicas[b].beta;
                self.replicas[b].beta = beta_a;
                self.swaps[r] += 1;
                self.exchange_count += 1;
            }
            self.exchange_max += 1;
        }
    }

    /// Retune the ladder to equalise swap acceptance: treat it as a chain
    /// of springs whose compliances grow with the observed per-edge swap
    /// counts, then redistribute the betas so the hottest end spreads out
    /// where acceptance is highest. Swap statistics are reset. Returns the
    /// new ladder, or None when no swap was recorded in the interval.
    pub fn adjust_ladder(&mut self) -> Option<Vec<f64>> {
        let n = self.replicas.len();
        if self.exchange_count == 0 {
            warn!("No replica swaps in this interval; temperature ladder left unchanged");
            self.reset_exchange_stats();
            return None;
        }

        let factor = (n as f64 - 1.0) / self.exchange_count as f64;
        let mut compliance = Vec::with_capacity(n);
        compliance.push(1.0);
        for r in 1..n {
            compliance.push(compliance[r - 1] + (self.swaps[r - 1] as f64 + 0.2) * factor);
        }

        let c_last = compliance[n - 1];
        let mut ladder = Vec::with_capacity(n);
        for (r, c) in compliance.iter().enumerate() {
            let beta = c * self.beta_max / c_last;
            self.replicas[self.order[r]].beta = beta;
            ladder.push(beta);
        }

        self.reset_exchange_stats();
        Some(ladder)
    }

    fn reset_exchange_stats(&mut self) {
        self.swaps.fill(0);
        self.exchange_count = 0;
        self.exchange_max = 0;
    }
}
