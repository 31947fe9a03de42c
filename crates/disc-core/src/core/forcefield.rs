use super::io::{self, ParseErrorKind, Scanner};
use nalgebra::DMatrix;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Finite stand-in for infinity. Hard-core overlaps are priced at multiples
/// of this value so rejected states never produce non-finite sums.
pub const BIG_ENERGY: f64 = 1.0e7;

#[derive(Debug, Error)]
pub enum ForceFieldLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
}

fn at_line<T>(line: usize, result: Result<T, ParseErrorKind>) -> Result<T, ForceFieldLoadError> {
    result.map_err(|kind| ForceFieldLoadError::Parse { line, kind })
}

/// The radial pair potential and its parameters.
///
/// The potential is a triangle well over a repulsive core: for atom types
/// with hard radii R1 and R2 at separation r,
///
/// ```text
/// u = big_energy * (1 - (r - R1 - R2)/(R1 + R2))   r < R1 + R2
/// u = eps[t1,t2] * (1 - (r - R1 - R2)/length)      0 <= r - R1 - R2 < length
/// u = 0                                            otherwise
/// ```
///
/// everything capped at the cutoff distance. The well-depth matrix is
/// expected to be symmetric; this is not enforced on load.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceField {
    n_types: usize,
    radii: Vec<f64>,
    colors: Vec<String>,
    cut_off: f64,
    length: f64,
    well_depths: DMatrix<f64>,
    big_energy: f64,
}

impl ForceField {
    /// Default purely repulsive force field for a single hard-disc type.
    pub fn hard_disc(radius: f64) -> Self {
        Self {
            n_types: 1,
            radii: vec![radius],
            colors: vec!["red".to_string()],
            cut_off: 2.0 * radius,
            length: 1.0,
            well_depths: DMatrix::zeros(1, 1),
            big_energy: BIG_ENERGY,
        }
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    pub fn big_energy(&self) -> f64 {
        self.big_energy
    }

    pub fn cut_off(&self) -> f64 {
        self.cut_off
    }

    /// Hard radius of atom type `t`.
    pub fn size(&self, t: usize) -> f64 {
        self.radii[t]
    }

    pub fn color(&self, t: usize) -> &str {
        &self.colors[t]
    }

    /// Pair interaction energy between atom types `t1` and `t2` at
    /// centre-to-centre distance `r`. Indices beyond the type table are a
    /// programmer error.
    pub fn interaction(&self, t1: usize, t2: usize, r: f64) -> f64 {
        if r >= self.cut_off {
            return 0.0;
        }
        assert!(t1 < self.n_types && t2 < self.n_types);

        let hard = self.radii[t1] + self.radii[t2];
        let gap = r - hard;
        if gap < 0.0 {
            self.big_energy * (1.0 - gap / hard)
        } else if gap < self.length {
            self.well_depths[(t1, t2)] * (1.0 - gap / self.length)
        } else {
            0.0
        }
    }

    pub fn load(path: &Path) -> Result<Self, ForceFieldLoadError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    pub fn read_from(reader: impl BufRead) -> Result<Self, ForceFieldLoadError> {
        let mut scanner = Scanner::new(reader);

        let mut next = |field: &'static str| -> Result<(usize, String), ForceFieldLoadError> {
            match scanner.next_content_line()? {
                Some(line) => Ok((scanner.line_no(), line)),
                None => Err(ForceFieldLoadError::Parse {
                    line: scanner.line_no(),
                    kind: ParseErrorKind::UnexpectedEof { field },
                }),
            }
        };

        let (line, content) = next("atom type count")?;
        let n_types = content
            .parse::<i64>()
            .map_err(|_| ForceFieldLoadError::Parse {
                line,
                kind: ParseErrorKind::InvalidInt {
                    field: "atom type count",
                    value: content.clone(),
                },
            })?;
        if n_types <= 0 {
            return Err(ForceFieldLoadError::Parse {
                line,
                kind: ParseErrorKind::OutOfRange {
                    field: "atom type count",
                    value: content,
                },
            });
        }
        let n_types = n_types as usize;

        let (line, content) = next("hard radii")?;
        let fields = at_line(line, io::split_fields("hard radii", &content, n_types))?;
        let radii = fields
            .iter()
            .map(|&token| at_line(line, io::parse_f64("hard radius", token)))
            .collect::<Result<Vec<f64>, _>>()?;

        let (line, content) = next("colour labels")?;
        let fields = at_line(line, io::split_fields("colour labels", &content, n_types))?;
        let colors: Vec<String> = fields.iter().map(|token| token.to_string()).collect();

        let (line, content) = next("cutoff and length scale")?;
        let fields = at_line(line, io::split_fields("cutoff and length scale", &content, 2))?;
        let cut_off = at_line(line, io::parse_f64("cutoff", fields[0]))?;
        let length = at_line(line, io::parse_f64("length scale", fields[1]))?;

        let mut well_depths = DMatrix::zeros(n_types, n_types);
        for row in 0..n_types {
            let (line, content) = next("well depth row")?;
            let fields = at_line(line, io::split_fields("well depth row", &content, n_types))?;
            for (col, &token) in fields.iter().enumerate() {
                well_depths[(row, col)] = at_line(line, io::parse_f64("well depth", token))?;
            }
        }

        Ok(Self {
            n_types,
            radii,
            colors,
            cut_off,
            length,
            well_depths,
            big_energy: BIG_ENERGY,
        })
    }
}

impl std::fmt::Display for ForceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Force field with {} atom type(s)", self.n_types)?;
        writeln!(f, "  cutoff {}, length scale {}", self.cut_off, self.length)?;
        writeln!(f, "  radii {:?}", self.radii)?;
        writeln!(f, "  colours {:?}", self.colors)?;
        write!(f, "  well depths {}", self.well_depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    // One disc type: R = 1, lambda = 1, eps = -1, cutoff = 5.
    const SINGLE_DISC: &str = "\
# single disc force field
1
1.0
red
5.0 1.0
-1.0
";

    fn single_disc() -> ForceField {
        ForceField::read_from(Cursor::new(SINGLE_DISC)).unwrap()
    }

    #[test]
    fn overlapping_discs_pay_a_multiple_of_big_energy() {
        let ff = single_disc();
        // gap = 1.5 - 2 = -0.5, so u = big * (1 + 0.5/2).
        assert!(f64_approx_equal(
            ff.interaction(0, 0, 1.5),
            1.25 * ff.big_energy()
        ));
    }

    #[test]
    fn attractive_well_decays_linearly_to_the_interaction_length() {
        let ff = single_disc();
        assert!(f64_approx_equal(ff.interaction(0, 0, 2.5), -0.5));
        assert!(f64_approx_equal(ff.interaction(0, 0, 2.0), -1.0));
    }

    #[test]
    fn interaction_vanishes_beyond_the_well_and_beyond_the_cutoff() {
        let ff = single_disc();
        assert_eq!(ff.interaction(0, 0, 3.0), 0.0);
        assert_eq!(ff.interaction(0, 0, 100.0), 0.0);
    }

    #[test]
    fn interaction_is_symmetric_in_the_type_arguments() {
        let source = "\
2
1.0 2.0
red blue
10.0 1.5
-1.0 -0.25
-0.25 -2.0
";
        let ff = ForceField::read_from(Cursor::new(source)).unwrap();
        for r in [0.5, 1.0, 2.7, 3.3, 4.2, 9.0] {
            assert!(f64_approx_equal(
                ff.interaction(0, 1, r),
                ff.interaction(1, 0, r)
            ));
        }
    }

    #[test]
    fn size_returns_the_hard_radius_per_type() {
        let ff = single_disc();
        assert_eq!(ff.size(0), 1.0);
        assert_eq!(ff.color(0), "red");
    }

    #[test]
    fn hard_disc_default_is_purely_repulsive() {
        let ff = ForceField::hard_disc(1.0);
        assert_eq!(ff.interaction(0, 0, 2.5), 0.0);
        assert!(ff.interaction(0, 0, 1.0) > ff.big_energy());
    }

    #[test]
    fn read_from_rejects_non_positive_type_counts() {
        let err = ForceField::read_from(Cursor::new("-2\n")).unwrap_err();
        assert!(matches!(
            err,
            ForceFieldLoadError::Parse {
                line: 1,
                kind: ParseErrorKind::OutOfRange { .. }
            }
        ));
    }

    #[test]
    fn read_from_rejects_short_radius_rows() {
        let source = "2\n1.0\nred blue\n5.0 1.0\n0 0\n0 0\n";
        let err = ForceField::read_from(Cursor::new(source)).unwrap_err();
        assert!(matches!(
            err,
            ForceFieldLoadError::Parse {
                line: 2,
                kind: ParseErrorKind::FieldCount { .. }
            }
        ));
    }

    #[test]
    fn read_from_fails_on_truncated_well_depth_matrix() {
        let source = "2\n1.0 1.0\nred blue\n5.0 1.0\n0 0\n";
        let err = ForceField::read_from(Cursor::new(source)).unwrap_err();
        assert!(matches!(
            err,
            ForceFieldLoadError::Parse {
                kind: ParseErrorKind::UnexpectedEof { .. },
                ..
            }
        ));
    }

    #[test]
    fn load_reads_a_force_field_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discs.ff");
        std::fs::write(&path, SINGLE_DISC).unwrap();
        let ff = ForceField::load(&path).unwrap();
        assert_eq!(ff.n_types(), 1);
        assert_eq!(ff.cut_off(), 5.0);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ForceField::load(&dir.path().join("absent.ff"));
        assert!(matches!(result, Err(ForceFieldLoadError::Io(_))));
    }
}
