use crate::core::boundary::Boundary;
use crate::core::config::{Configuration, PlacedObject, min_image};
use crate::core::forcefield::ForceField;
use crate::core::topology::Topology;
use nalgebra::{Point2, Rotation2, Vector2};
use rand::Rng;
use std::f64::consts::PI;

/// World position of a body-frame atom offset for an object at
/// (x, y, theta).
#[inline]
pub fn atom_world_position(object: &PlacedObject, offset: &Vector2<f64>) -> Point2<f64> {
    object.position + Rotation2::new(object.orientation) * offset
}

/// Pair interaction energy between two placed objects: the double loop
/// over their atoms, with each atom-pair separation replaced by its
/// minimum image when a period is given.
fn pair_energy(
    forces: &ForceField,
    topology: &Topology,
    a: &PlacedObject,
    b: &PlacedObject,
    period: Option<(f64, f64)>,
) -> f64 {
    let mol_a = topology.molecule(a.molecule_index);
    let mol_b = topology.molecule(b.molecule_index);

    let mut energy = 0.0;
    for atom_a in mol_a.atoms() {
        let pos_a = atom_world_position(a, &atom_a.offset);
        for atom_b in mol_b.atoms() {
            let pos_b = atom_world_position(b, &atom_b.offset);
            let mut delta = pos_b - pos_a;
            if let Some((width, height)) = period {
                delta.x = min_image(delta.x, width);
                delta.y = min_image(delta.y, height);
            }
            energy += forces.interaction(atom_a.type_index, atom_b.type_index, delta.norm());
        }
    }
    energy
}

/// Wall interaction of one object: every atom must sit at least its own
/// hard-core radius inside the boundary, each violation costing
/// `big_energy`.
fn boundary_energy(
    forces: &ForceField,
    topology: &Topology,
    object: &PlacedObject,
    boundary: &Boundary,
) -> f64 {
    let molecule = topology.molecule(object.molecule_index);
    let mut energy = 0.0;
    for atom in molecule.atoms() {
        let pos = atom_world_position(object, &atom.offset);
        let radius = forces.size(atom.type_index);
        if !boundary.contains_disc(pos.x, pos.y, radius) {
            energy += forces.big_energy();
        }
    }
    energy
}

impl Configuration {
    /// Total configuration energy, evaluated lazily.
    ///
    /// When the cache is stale, the contribution of every dirty object is
    /// recomputed: its pair interactions with all other objects plus its
    /// boundary energy. Pair sums are accumulated from both sides and
    /// halved; boundary terms are counted once per object. Without a bound
    /// topology objects do not interact and the energy is zero.
    pub fn energy(&mut self, forces: &ForceField) -> f64 {
        if self.unchanged {
            return self.saved_energy;
        }

        let topology = self.topology().cloned();
        let period = self
            .is_periodic()
            .then(|| (self.width(), self.height()));

        let n = self.n_objects();
        if let Some(topology) = &topology {
            for i in 0..n {
                if !self.objects()[i].dirty {
                    continue;
                }
                let mut pair = 0.0;
                for j in 0..n {
                    if i != j {
                        pair += pair_energy(
                            forces,
                            topology,
                            &self.objects()[i],
                            &self.objects()[j],
                            period,
                        );
                    }
                }
                let boundary = if period.is_none() {
                    boundary_energy(forces, topology, &self.objects()[i], self.boundary())
                } else {
                    0.0
                };
                let object = &mut self.objects_mut()[i];
                object.pair_energy = pair;
                object.boundary_energy = boundary;
                object.dirty = false;
            }
        } else {
            for object in self.objects_mut() {
                object.pair_energy = 0.0;
                object.boundary_energy = 0.0;
                object.dirty = false;
            }
        }

        let pair_total: f64 = self.objects().iter().map(|o| o.pair_energy).sum();
        let boundary_total: f64 = self.objects().iter().map(|o| o.boundary_energy).sum();
        self.saved_energy = pair_total / 2.0 + boundary_total;
        self.unchanged = true;
        self.saved_energy
    }

    /// Whether objects `i` and `j` overlap: some cross pair of their atoms
    /// is strictly closer than the sum of the hard radii, respecting
    /// periodicity. Without a topology objects are points that clash only
    /// when coincident.
    pub fn objects_clash(&self, i: usize, j: usize) -> bool {
        self.pair_clash(self.object(i), self.object(j))
    }

    fn pair_clash(&self, a: &PlacedObject, b: &PlacedObject) -> bool {
        let Some(topology) = self.topology() else {
            return a.position == b.position;
        };

        let mol_a = topology.molecule(a.molecule_index);
        let mol_b = topology.molecule(b.molecule_index);
        let period = self
            .is_periodic()
            .then(|| (self.width(), self.height()));

        for atom_a in mol_a.atoms() {
            let pos_a = atom_world_position(a, &atom_a.offset);
            let radius_a = topology.radius(atom_a.type_index);
            for atom_b in mol_b.atoms() {
                let pos_b = atom_world_position(b, &atom_b.offset);
                let radius_b = topology.radius(atom_b.type_index);
                let mut delta = pos_b - pos_a;
                if let Some((width, height)) = period {
                    delta.x = min_image(delta.x, width);
                    delta.y = min_image(delta.y, height);
                }
                let contact = radius_a + radius_b;
                if delta.norm_squared() < contact * contact {
                    return true;
                }
            }
        }
        false
    }

    /// Whether the object overlaps the boundary: some atom fails the
    /// containment predicate with its own hard radius. Always false under
    /// periodic conditions or without a topology.
    pub fn boundary_clash(&self, object: &PlacedObject) -> bool {
        if self.is_periodic() {
            return false;
        }
        let Some(topology) = self.topology() else {
            return false;
        };
        let molecule = topology.molecule(object.molecule_index);
        for atom in molecule.atoms() {
            let pos = atom_world_position(object, &atom.offset);
            let radius = topology.radius(atom.type_index);
            if !self.boundary().contains_disc(pos.x, pos.y, radius) {
                return true;
            }
        }
        false
    }

    /// Whether any pair of objects in the configuration overlaps.
    pub fn test_clash(&self) -> bool {
        for i in 0..self.n_objects() {
            for j in 0..i {
                if self.objects_clash(i, j) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether inserting `candidate` would produce an overlap with the
    /// boundary or with any existing object.
    pub fn test_clash_with(&self, candidate: &PlacedObject) -> bool {
        if self.boundary_clash(candidate) {
            return true;
        }
        self.objects()
            .iter()
            .any(|object| self.pair_clash(object, candidate))
    }

    fn has_clash(&self, i: usize) -> bool {
        (0..self.n_objects()).any(|j| j != i && self.objects_clash(i, j))
    }

    /// Shake every clashing object a little: a unit-scale displacement and
    /// a half-turn reorientation.
    pub(crate) fn jiggle(&mut self, rng: &mut impl Rng) {
        for i in 0..self.n_objects() {
            if self.has_clash(i) {
                self.displace_object(i, 1.0, rng);
                self.rotate_object(i, PI, rng);
            }
        }
    }

    /// Isometric expansion by `factor`; returns whether any overlap
    /// remains afterwards.
    pub fn expand(&mut self, factor: f64) -> bool {
        self.scale(factor);
        self.test_clash()
    }

    /// Isometric expansion followed by up to `max_try` jiggle passes to
    /// clear overlaps; returns whether any overlap remains.
    pub fn expand_with_recovery(
        &mut self,
        factor: f64,
        max_try: usize,
        rng: &mut impl Rng,
    ) -> bool {
        self.scale(factor);
        for _ in 0..max_try {
            if !self.test_clash() {
                break;
            }
            self.jiggle(rng);
        }
        self.test_clash()
    }
}
