use super::io::{self, ParseErrorKind, Scanner};
use nalgebra::Vector2;
use std::io::{BufRead, Write};
use std::path::Path;
use thiserror::Error;

/// A named atom species with its hard-core radius.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomType {
    pub name: String,
    pub radius: f64,
}

/// Body-frame placement of one atom within a molecule template.
///
/// Atoms are immutable once part of a molecule: the offset is fixed in the
/// body frame and rotated into the world frame per placed object.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomTemplate {
    /// Index into the topology's atom-type table.
    pub type_index: usize,
    /// Offset from the object origin, in the body frame.
    pub offset: Vector2<f64>,
    /// Display colour label, passed through unchanged to plot output.
    pub color: String,
}

/// A named rigid cluster of atoms at fixed body-frame offsets. Templates
/// are prototypes: placed objects reference them by index, no per-object
/// copies are made.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeTemplate {
    pub name: String,
    atoms: Vec<AtomTemplate>,
}

impl MoleculeTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            atoms: Vec::new(),
        }
    }

    pub fn add_atom(&mut self, atom: AtomTemplate) {
        self.atoms.push(atom);
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom(&self, i: usize) -> &AtomTemplate {
        &self.atoms[i]
    }

    pub fn atoms(&self) -> &[AtomTemplate] {
        &self.atoms
    }
}

#[derive(Debug, Error)]
pub enum TopologyLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
}

fn at_line<T>(line: usize, result: Result<T, ParseErrorKind>) -> Result<T, TopologyLoadError> {
    result.map_err(|kind| TopologyLoadError::Parse { line, kind })
}

/// The registry of atom types and molecule templates bound to a
/// configuration.
///
/// Invariants: every atom template's type index is a valid index into the
/// atom-type table, radii are positive, and no molecule is empty. The
/// loader enforces all three.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    atom_types: Vec<AtomType>,
    molecules: Vec<MoleculeTemplate>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default topology of a single hard disc of the given radius.
    pub fn with_disc(radius: f64) -> Self {
        let mut topology = Self::new();
        topology.add_molecule(radius);
        topology
    }

    /// Append a new atom type of radius `radius` and a new one-atom
    /// molecule referencing it. Used by the configuration builder for
    /// default topologies.
    pub fn add_molecule(&mut self, radius: f64) {
        let type_index = self.atom_types.len();
        self.atom_types.push(AtomType {
            name: format!("simple{type_index}"),
            radius,
        });
        let mut molecule = MoleculeTemplate::new(format!("disc{type_index}"));
        molecule.add_atom(AtomTemplate {
            type_index,
            offset: Vector2::zeros(),
            color: "red".to_string(),
        });
        self.molecules.push(molecule);
    }

    pub fn n_atom_types(&self) -> usize {
        self.atom_types.len()
    }

    pub fn atom_type(&self, i: usize) -> &AtomType {
        &self.atom_types[i]
    }

    /// Hard radius of atom type `type_index`.
    pub fn radius(&self, type_index: usize) -> f64 {
        self.atom_types[type_index].radius
    }

    pub fn n_molecules(&self) -> usize {
        self.molecules.len()
    }

    pub fn molecule(&self, i: usize) -> &MoleculeTemplate {
        &self.molecules[i]
    }

    pub fn molecules(&self) -> &[MoleculeTemplate] {
        &self.molecules
    }

    /// Largest distance any atom surface reaches from an object origin,
    /// over all molecules. This is the inflation margin used when wrapping
    /// a configuration in a convex hull.
    pub fn max_extent(&self) -> f64 {
        let mut extent = 0.0f64;
        for molecule in &self.molecules {
            for atom in molecule.atoms() {
                extent = extent.max(atom.offset.norm() + self.radius(atom.type_index));
            }
        }
        extent
    }

    pub fn load(path: &Path) -> Result<Self, TopologyLoadError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    pub fn read_from(reader: impl BufRead) -> Result<Self, TopologyLoadError> {
        let mut scanner = Scanner::new(reader);

        let mut next = |field: &'static str| -> Result<(usize, String), TopologyLoadError> {
            match scanner.next_content_line()? {
                Some(line) => Ok((scanner.line_no(), line)),
                None => Err(TopologyLoadError::Parse {
                    line: scanner.line_no(),
                    kind: ParseErrorKind::UnexpectedEof { field },
                }),
            }
        };
        let (line, content) = next("atom type count")?;
        let n_types = at_line(line, io::parse_usize("atom type count", &content))?;

        let mut atom_types = Vec::with_capacity(n_types);
        for _ in 0..n_types {
            let (line, content) = next("atom type record")?;
            let fields = at_line(line, io::split_fields("atom type record", &content, 2))?;
            let radius = at_line(line, io::parse_f64("atom radius", fields[1]))?;
            if radius <= 0.0 {
                return Err(TopologyLoadError::Parse {
                    line,
                    kind: ParseErrorKind::OutOfRange {
                        field: "atom radius",
                        value: fields[1].to_string(),
                    },
                });
            }
            atom_types.push(AtomType {
                name: fields[0].to_string(),
                radius,
            });
        }

        let (line, content) = next("molecule count")?;
        let n_molecules = at_line(line, io::parse_usize("molecule count", &content))?;

        let mut molecules = Vec::with_capacity(n_molecules);
        for _ in 0..n_molecules {
            let (_, name) = next("molecule name")?;
            let (line, content) = next("molecule atom count")?;
            let n_atoms = at_line(line, io::parse_usize("molecule atom count", &content))?;
            if n_atoms == 0 {
                return Err(TopologyLoadError::Parse {
                    line,
                    kind: ParseErrorKind::OutOfRange {
                        field: "molecule atom count",
                        value: content,
                    },
                });
            }

            let mut molecule = MoleculeTemplate::new(name);
            for _ in 0..n_atoms {
                let (line, content) = next("atom record")?;
                let fields = at_line(line, io::split_fields("atom record", &content, 4))?;
                let type_index = at_line(line, io::parse_usize("atom type index", fields[0]))?;
                if type_index >= n_types {
                    return Err(TopologyLoadError::Parse {
                        line,
                        kind: ParseErrorKind::OutOfRange {
                            field: "atom type index",
                            value: fields[0].to_string(),
                        },
                    });
                }
                let dx = at_line(line, io::parse_f64("atom x offset", fields[1]))?;
                let dy = at_line(line, io::parse_f64("atom y offset", fields[2]))?;
                molecule.add_atom(AtomTemplate {
                    type_index,
                    offset: Vector2::new(dx, dy),
                    color: fields[3].to_string(),
                });
            }
            molecules.push(molecule);
        }

        Ok(Self {
            atom_types,
            molecules,
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writeln!(writer, "{}", self.atom_types.len())?;
        for atom_type in &self.atom_types {
            writeln!(writer, "{} {:.6}", atom_type.name, atom_type.radius)?;
        }
        writeln!(writer, "{}", self.molecules.len())?;
        for molecule in &self.molecules {
            writeln!(writer, "{}", molecule.name)?;
            writeln!(writer, "{}", molecule.n_atoms())?;
            for atom in molecule.atoms() {
                writeln!(
                    writer,
                    "{:3} {:9.6} {:9.6} {}",
                    atom.type_index, atom.offset.x, atom.offset.y, atom.color
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
# two types, two molecules
2
small 1.0
large 2.5
2
monomer
1
0 0.0 0.0 red
dimer
2
0 -1.0 0.0 red
1  1.5 0.0 blue
";

    #[test]
    fn read_from_parses_types_and_molecules() {
        let topology = Topology::read_from(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(topology.n_atom_types(), 2);
        assert_eq!(topology.atom_type(1).name, "large");
        assert_eq!(topology.radius(1), 2.5);
        assert_eq!(topology.n_molecules(), 2);
        assert_eq!(topology.molecule(0).n_atoms(), 1);
        let dimer = topology.molecule(1);
        assert_eq!(dimer.name, "dimer");
        assert_eq!(dimer.atom(1).type_index, 1);
        assert_eq!(dimer.atom(1).offset, Vector2::new(1.5, 0.0));
        assert_eq!(dimer.atom(1).color, "blue");
    }

    #[test]
    fn read_from_rejects_out_of_range_type_index() {
        let source = "1\nsimple 1.0\n1\nmono\n1\n3 0.0 0.0 red\n";
        let err = Topology::read_from(Cursor::new(source)).unwrap_err();
        assert!(matches!(
            err,
            TopologyLoadError::Parse {
                line: 6,
                kind: ParseErrorKind::OutOfRange { .. }
            }
        ));
    }

    #[test]
    fn read_from_rejects_empty_molecules() {
        let source = "1\nsimple 1.0\n1\nmono\n0\n";
        let err = Topology::read_from(Cursor::new(source)).unwrap_err();
        assert!(matches!(err, TopologyLoadError::Parse { line: 5, .. }));
    }

    #[test]
    fn read_from_rejects_non_positive_radius() {
        let source = "1\nsimple -1.0\n0\n";
        assert!(Topology::read_from(Cursor::new(source)).is_err());
    }

    #[test]
    fn read_from_fails_on_truncated_input() {
        let source = "2\nsmall 1.0\n";
        let err = Topology::read_from(Cursor::new(source)).unwrap_err();
        assert!(matches!(
            err,
            TopologyLoadError::Parse {
                kind: ParseErrorKind::UnexpectedEof { .. },
                ..
            }
        ));
    }

    #[test]
    fn load_reads_a_topology_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discs.topo");
        std::fs::write(&path, SAMPLE).unwrap();
        let topology = Topology::load(&path).unwrap();
        assert_eq!(topology.n_molecules(), 2);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Topology::load(&dir.path().join("absent.topo"));
        assert!(matches!(result, Err(TopologyLoadError::Io(_))));
    }

    #[test]
    fn add_molecule_appends_a_matching_type_and_one_atom_molecule() {
        let mut topology = Topology::with_disc(1.0);
        topology.add_molecule(2.0);
        assert_eq!(topology.n_atom_types(), 2);
        assert_eq!(topology.n_molecules(), 2);
        assert_eq!(topology.molecule(1).n_atoms(), 1);
        assert_eq!(topology.molecule(1).atom(0).type_index, 1);
        assert_eq!(topology.radius(1), 2.0);
    }

    #[test]
    fn max_extent_accounts_for_offsets_and_radii() {
        let topology = Topology::read_from(Cursor::new(SAMPLE)).unwrap();
        // dimer's large atom sits at 1.5 with radius 2.5.
        assert!((topology.max_extent() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn write_then_read_preserves_the_topology() {
        let topology = Topology::read_from(Cursor::new(SAMPLE)).unwrap();
        let mut buf = Vec::new();
        topology.write_to(&mut buf).unwrap();
        let reread = Topology::read_from(Cursor::new(buf)).unwrap();
        assert_eq!(reread, topology);
    }
}
