pub mod make;
pub mod nvt;
pub mod rx;
pub mod wrap;

use crate::cli::SampleArgs;
use crate::error::{CliError, Result};
use discsim::core::config::Configuration;
use discsim::workflows::nvt::SamplingOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read the initial configuration from the given file, or from standard
/// input when none was supplied.
pub fn read_initial(path: Option<&Path>) -> Result<Configuration> {
    let config = match path {
        Some(path) => {
            info!("Reading configuration from {}", path.display());
            Configuration::load(path)?
        }
        None => {
            info!("Reading configuration from standard input");
            Configuration::read_from(std::io::stdin().lock())?
        }
    };
    Ok(config)
}

/// Write the final configuration to the given file, or to standard output
/// when none was supplied.
pub fn write_final(config: &Configuration, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            config.write_to(&mut file)?;
            info!("Wrote configuration to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            config.write_to(&mut stdout.lock())?;
        }
    }
    Ok(())
}

/// The run-report sink: the named log file, or standard error.
pub fn open_log(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stderr()),
    })
}

/// Apply the periodicity flag; non-rectangular boundaries that cannot be
/// canonicalised keep fixed walls.
pub fn apply_periodicity(config: &mut Configuration, periodic: bool) {
    if periodic && !config.set_periodic(true) {
        warn!("Periodic conditions are not supported on non-rectangular boundaries; ignoring flag");
    }
}

pub fn sampling_options(args: &SampleArgs) -> Result<SamplingOptions> {
    if args.n_steps == 0 {
        return Err(CliError::Argument(
            "nothing to do, the number of steps must be positive".to_string(),
        ));
    }
    if args.print_freq == 0 {
        return Err(CliError::Argument(
            "a zero print frequency is invalid".to_string(),
        ));
    }
    if args.beta < 0.0 {
        return Err(CliError::Argument("a negative temperature is invalid".to_string()));
    }
    if args.pressure < 0.0 {
        return Err(CliError::Argument("a negative pressure is invalid".to_string()));
    }
    if args.frame_freq > 0 && args.trajectory.is_none() {
        return Err(CliError::Argument(
            "a trajectory file (-s) is required when frames are requested (-n)".to_string(),
        ));
    }
    Ok(SamplingOptions {
        n_steps: args.n_steps,
        print_freq: args.print_freq,
        beta: args.beta,
        pressure: args.pressure,
        traj_freq: args.frame_freq,
        seed: args.seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_args() -> SampleArgs {
        SampleArgs {
            n_steps: 100,
            print_freq: 10,
            beta: 1.0,
            pressure: 1.0,
            topology: PathBuf::from("t.topo"),
            forcefield: PathBuf::from("f.ff"),
            initial: None,
            output: None,
            log_file: None,
            frame_freq: 0,
            trajectory: None,
            periodic: false,
            seed: 0,
        }
    }

    #[test]
    fn valid_arguments_produce_matching_options() {
        let options = sampling_options(&sample_args()).unwrap();
        assert_eq!(options.n_steps, 100);
        assert_eq!(options.print_freq, 10);
    }

    #[test]
    fn zero_steps_and_zero_print_frequency_are_rejected() {
        let mut args = sample_args();
        args.n_steps = 0;
        assert!(matches!(
            sampling_options(&args),
            Err(CliError::Argument(_))
        ));

        let mut args = sample_args();
        args.print_freq = 0;
        assert!(matches!(
            sampling_options(&args),
            Err(CliError::Argument(_))
        ));
    }

    #[test]
    fn negative_beta_and_pressure_are_rejected() {
        let mut args = sample_args();
        args.beta = -1.0;
        assert!(sampling_options(&args).is_err());

        let mut args = sample_args();
        args.pressure = -0.5;
        assert!(sampling_options(&args).is_err());
    }

    #[test]
    fn frames_without_a_trajectory_file_are_rejected() {
        let mut args = sample_args();
        args.frame_freq = 50;
        assert!(sampling_options(&args).is_err());
    }
}
