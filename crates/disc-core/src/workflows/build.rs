use crate::core::boundary::Boundary;
use crate::core::config::{Configuration, PlacedObject};
use crate::core::topology::Topology;
use crate::engine::error::EngineError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub width: f64,
    pub height: f64,
    /// Objects to place per molecule type, in type order.
    pub counts: Vec<usize>,
    pub periodic: bool,
    /// Placement happens in a boundary shrunk by this factor, which is
    /// then expanded back; a factor above one packs the objects loosely.
    pub scale: f64,
    /// Placement attempts per object before giving up.
    pub max_attempts: usize,
    pub seed: u64,
}

impl BuildOptions {
    pub fn new(width: f64, height: f64, counts: Vec<usize>) -> Self {
        Self {
            width,
            height,
            counts,
            periodic: false,
            scale: 1.0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: 0,
        }
    }
}

/// Seed a random initial configuration: place the requested number of
/// objects of each molecule type uniformly at random, rejecting positions
/// that clash with the walls or with objects already placed.
///
/// Without a supplied topology a default hard-disc topology is grown with
/// one unit disc per requested type.
#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    topology: Option<Arc<Topology>>,
    options: &BuildOptions,
) -> Result<Configuration, EngineError> {
    let topology = match topology {
        Some(topology) => topology,
        None => {
            let mut default = Topology::with_disc(1.0);
            for _ in 1..options.counts.len() {
                default.add_molecule(1.0);
            }
            Arc::new(default)
        }
    };
    if options.counts.len() > topology.n_molecules() {
        return Err(EngineError::UnknownMoleculeType {
            requested: options.counts.len() - 1,
            available: topology.n_molecules(),
        });
    }

    let mut config = Configuration::new(Boundary::Rectangle {
        width: options.width / options.scale,
        height: options.height / options.scale,
    });
    config
        .add_topology(topology)
        .expect("an empty configuration accepts any topology");
    config.set_periodic(options.periodic);

    let mut rng = StdRng::seed_from_u64(options.seed);
    for (molecule_index, &count) in options.counts.iter().enumerate() {
        info!(molecule_index, count, "Placing objects");
        for object_index in 0..count {
            let placed = (0..options.max_attempts).find_map(|attempt| {
                let candidate = PlacedObject::new(
                    molecule_index,
                    rng.gen_range(0.0..config.width()),
                    rng.gen_range(0.0..config.height()),
                    rng.gen_range(0.0..TAU),
                );
                if config.test_clash_with(&candidate) {
                    None
                } else {
                    debug!(molecule_index, object_index, attempt, "Placed object");
                    Some(candidate)
                }
            });
            match placed {
                Some(object) => config.add_object(object),
                None => {
                    return Err(EngineError::Placement {
                        object_index,
                        molecule_index,
                        attempts: options.max_attempts,
                    });
                }
            }
        }
    }

    config.scale(options.scale);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn builds_the_requested_counts_without_clashes() {
        let options = BuildOptions::new(30.0, 30.0, vec![5, 3]);
        let config = run(None, &options).unwrap();

        assert_eq!(config.n_objects(), 8);
        assert!(!config.test_clash());
        assert_eq!(
            config
                .objects()
                .iter()
                .filter(|o| o.molecule_index == 1)
                .count(),
            3
        );
        let topology = config.topology().unwrap();
        assert_eq!(topology.n_molecules(), 2);
    }

    #[test]
    fn placement_respects_the_walls() {
        let options = BuildOptions::new(12.0, 12.0, vec![6]);
        let config = run(None, &options).unwrap();
        for object in config.objects() {
            let p = object.position;
            assert!(p.x >= 1.0 && p.x <= 11.0);
            assert!(p.y >= 1.0 && p.y <= 11.0);
        }
    }

    #[test]
    fn impossible_packings_fail_with_a_placement_error() {
        let options = BuildOptions::new(6.0, 6.0, vec![50]);
        let err = run(None, &options).unwrap_err();
        assert!(matches!(err, EngineError::Placement { .. }));
    }

    #[test]
    fn counts_beyond_the_supplied_topology_are_rejected() {
        let topology = Arc::new(Topology::with_disc(1.0));
        let options = BuildOptions::new(20.0, 20.0, vec![2, 2]);
        let err = run(Some(topology), &options).unwrap_err();
        assert!(matches!(err, EngineError::UnknownMoleculeType { .. }));
    }

    #[test]
    fn scaled_builds_place_loosely_then_expand_to_the_requested_size() {
        let mut options = BuildOptions::new(40.0, 40.0, vec![4]);
        options.scale = 2.0;
        let config = run(None, &options).unwrap();
        assert!((config.width() - 40.0).abs() < 1e-9);
        assert!((config.height() - 40.0).abs() < 1e-9);
        assert!(!config.test_clash());
    }

    #[test]
    fn periodic_builds_skip_the_wall_check() {
        let mut options = BuildOptions::new(15.0, 15.0, vec![5]);
        options.periodic = true;
        options.seed = 3;
        let config = run(None, &options).unwrap();
        assert!(config.is_periodic());
        assert!(!config.test_clash());
    }

    #[test]
    fn multi_atom_molecules_use_their_full_extent_when_placing() {
        let source = "\
1
bead 1.0
1
dimer
2
0 -1.5 0.0 red
0 1.5 0.0 red
";
        let topology = Arc::new(Topology::read_from(Cursor::new(source)).unwrap());
        let options = BuildOptions::new(30.0, 30.0, vec![4]);
        let config = run(Some(topology), &options).unwrap();
        assert_eq!(config.n_objects(), 4);
        assert!(!config.test_clash());
    }
}
