use super::boundary::Boundary;
use super::geometry::Polygon;
use super::io::{self, ParseErrorKind, Scanner};
use super::topology::Topology;
use nalgebra::{Point2, Vector2};
use rand::Rng;
use std::f64::consts::TAU;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// A placed instance of a molecule template: world position, orientation,
/// and the cached contribution of the object to the total energy.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    /// Index into the bound topology's molecule table.
    pub molecule_index: usize,
    /// Body position in world units.
    pub position: Point2<f64>,
    /// Orientation angle in radians, kept in [0, 2*pi).
    pub orientation: f64,
    /// The cached contribution must be recomputed before use.
    pub(crate) dirty: bool,
    /// Pair-interaction part of the cached contribution (counted from this
    /// object's side; the configuration total halves the sum).
    pub(crate) pair_energy: f64,
    /// Boundary part of the cached contribution (counted once).
    pub(crate) boundary_energy: f64,
}

impl PlacedObject {
    pub fn new(molecule_index: usize, x: f64, y: f64, orientation: f64) -> Self {
        Self {
            molecule_index,
            position: Point2::new(x, y),
            orientation,
            dirty: true,
            pair_energy: 0.0,
            boundary_energy: 0.0,
        }
    }
}

/// Minimum-image displacement component under a period, computed without
/// touching the neighbour's coordinates.
pub(crate) fn min_image(delta: f64, period: f64) -> f64 {
    delta - (delta / period).round() * period
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
}

fn at_line<T>(line: usize, result: Result<T, ParseErrorKind>) -> Result<T, ConfigLoadError> {
    result.map_err(|kind| ConfigLoadError::Parse { line, kind })
}

#[derive(Debug, Error)]
#[error(
    "Object {object_index} has molecule type {molecule_index} but the topology defines only {n_molecules} molecule(s)"
)]
pub struct TopologyBindError {
    pub object_index: usize,
    pub molecule_index: usize,
    pub n_molecules: usize,
}

/// The state of one simulation: boundary, periodicity, the placed objects,
/// the bound topology and the energy cache.
///
/// A configuration exclusively owns its object list and polygon; the
/// topology is an immutable shared value, so cloning a configuration gives
/// a fully independent copy that shares (not copies) the topology.
///
/// The `unchanged` flag starts false, becomes true after a full energy
/// evaluation and reverts to false on any mutation.
#[derive(Debug, Clone)]
pub struct Configuration {
    boundary: Boundary,
    periodic: bool,
    topology: Option<Arc<Topology>>,
    objects: Vec<PlacedObject>,
    pub(crate) saved_energy: f64,
    pub(crate) unchanged: bool,
}

impl Configuration {
    pub fn new(boundary: Boundary) -> Self {
        Self {
            boundary,
            periodic: false,
            topology: None,
            objects: Vec::new(),
            saved_energy: 0.0,
            unchanged: false,
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn topology(&self) -> Option<&Arc<Topology>> {
        self.topology.as_ref()
    }

    pub fn area(&self) -> f64 {
        self.boundary.area()
    }

    pub fn width(&self) -> f64 {
        self.boundary.width()
    }

    pub fn height(&self) -> f64 {
        self.boundary.height()
    }

    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, i: usize) -> &PlacedObject {
        &self.objects[i]
    }

    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut [PlacedObject] {
        &mut self.objects
    }

    pub fn add_object(&mut self, object: PlacedObject) {
        self.objects.push(object);
        self.touch();
    }

    /// Bind a topology, replacing any previous binding. Rejects topologies
    /// that do not define every molecule type the objects reference.
    pub fn add_topology(&mut self, topology: Arc<Topology>) -> Result<(), TopologyBindError> {
        let n_molecules = topology.n_molecules();
        for (object_index, object) in self.objects.iter().enumerate() {
            if object.molecule_index >= n_molecules {
                return Err(TopologyBindError {
                    object_index,
                    molecule_index: object.molecule_index,
                    n_molecules,
                });
            }
        }
        self.topology = Some(topology);
        self.touch();
        Ok(())
    }

    /// Mark the whole energy cache stale.
    pub(crate) fn touch(&mut self) {
        self.unchanged = false;
        for object in &mut self.objects {
            object.dirty = true;
        }
    }

    /// Genuine invariant check: finite coordinates and, when a topology is
    /// bound, in-range molecule indices.
    pub fn check(&self) -> bool {
        let indices_ok = match &self.topology {
            Some(topology) => self
                .objects
                .iter()
                .all(|o| o.molecule_index < topology.n_molecules()),
            None => true,
        };
        indices_ok
            && self.objects.iter().all(|o| {
                o.position.x.is_finite() && o.position.y.is_finite() && o.orientation.is_finite()
            })
    }

    /// Enable or disable periodic boundary conditions. Periodicity is only
    /// permitted on rectangles; a polygonal boundary that is an exact
    /// axis-aligned rectangle is canonicalised first. Returns whether the
    /// flag now has the requested value.
    pub fn set_periodic(&mut self, periodic: bool) -> bool {
        if !periodic {
            if self.periodic {
                self.periodic = false;
                self.touch();
            }
            return true;
        }
        if !self.boundary.is_rectangle() && !self.polygon_to_rectangle() {
            return false;
        }
        if !self.periodic {
            self.periodic = true;
            self.touch();
        }
        true
    }

    /// Convert a rectangular boundary to its polygon outline. Periodicity
    /// is dropped, as it is not supported on polygons.
    pub fn rectangle_to_polygon(&mut self) -> bool {
        if !self.boundary.is_rectangle() {
            return false;
        }
        self.boundary = Boundary::Polygon(self.boundary.to_polygon());
        if self.periodic {
            self.periodic = false;
            self.touch();
        }
        true
    }

    /// Convert a polygonal boundary that is an exact axis-aligned rectangle
    /// into a rectangle, translating the frame so the bottom-left corner
    /// sits at the origin.
    pub fn polygon_to_rectangle(&mut self) -> bool {
        let Boundary::Polygon(polygon) = &self.boundary else {
            return false;
        };
        let Some((origin, width, height)) = Boundary::axis_aligned_rectangle(polygon) else {
            return false;
        };
        let shift = Vector2::new(-origin.x, -origin.y);
        for object in &mut self.objects {
            object.position += shift;
        }
        self.boundary = Boundary::Rectangle { width, height };
        self.touch();
        true
    }

    /// Centre-to-centre distance between objects `i` and `j`, using the
    /// closest periodic image where applicable.
    pub fn object_distance(&self, i: usize, j: usize) -> f64 {
        let mut delta = self.objects[j].position - self.objects[i].position;
        if self.periodic {
            delta.x = min_image(delta.x, self.boundary.width());
            delta.y = min_image(delta.y, self.boundary.height());
        }
        delta.norm()
    }

    /// Mark dirty every object within `distance` of object `index`
    /// (respecting periodicity), so the next energy evaluation refreshes
    /// their contributions.
    pub fn invalidate_within(&mut self, distance: f64, index: usize) {
        for j in 0..self.objects.len() {
            if j != index && self.object_distance(index, j) < distance {
                self.objects[j].dirty = true;
            }
        }
        self.unchanged = false;
    }

    /// Trial displacement of object `i`: the step length is drawn from an
    /// exponential tail scaled by `d_max`, the direction is uniform, and a
    /// uniform reorientation follows. Positions are wrapped under periodic
    /// conditions; otherwise the boundary energy penalises escapes.
    pub fn move_object(&mut self, i: usize, d_max: f64, rng: &mut impl Rng) {
        self.displace_object(i, d_max, rng);
        self.rotate_object(i, TAU, rng);
    }

    pub(crate) fn displace_object(&mut self, i: usize, d_max: f64, rng: &mut impl Rng) {
        let u = rng.gen_range(0.0f64..1.0).max(f64::MIN_POSITIVE);
        let dist = -2.0 * u.ln() * d_max;
        let angle = rng.gen_range(0.0..TAU);

        let object = &mut self.objects[i];
        object.position.x += dist * angle.sin();
        object.position.y += dist * angle.cos();

        if self.periodic {
            let width = self.boundary.width();
            let height = self.boundary.height();
            let object = &mut self.objects[i];
            while object.position.x < 0.0 {
                object.position.x += width;
            }
            while object.position.x > width {
                object.position.x -= width;
            }
            while object.position.y < 0.0 {
                object.position.y += height;
            }
            while object.position.y > height {
                object.position.y -= height;
            }
        }

        self.objects[i].dirty = true;
        self.unchanged = false;
    }

    /// Uniform rotation of object `i` in [-theta_max, theta_max]; the
    /// orientation is normalised back into [0, 2*pi).
    pub fn rotate_object(&mut self, i: usize, theta_max: f64, rng: &mut impl Rng) {
        let object = &mut self.objects[i];
        object.orientation += rng.gen_range(-theta_max..theta_max);
        while object.orientation < 0.0 {
            object.orientation += TAU;
        }
        while object.orientation >= TAU {
            object.orientation -= TAU;
        }
        object.dirty = true;
        self.unchanged = false;
    }

    /// Isometric expansion: scale the boundary and every object position by
    /// `factor`, leaving orientations untouched.
    pub fn scale(&mut self, factor: f64) {
        self.boundary.scale(factor);
        for object in &mut self.objects {
            object.position.coords *= factor;
        }
        self.touch();
    }

    /// Convex hull of the object centres; with `inflate` the hull is pushed
    /// outward by the topology's maximal atom extent so finite objects fit
    /// inside.
    pub fn convex_hull(&self, inflate: bool) -> Polygon {
        let points: Vec<Point2<f64>> = self.objects.iter().map(|o| o.position).collect();
        let hull = Polygon::convex_hull(&points);
        if !inflate {
            return hull;
        }
        let margin = self
            .topology
            .as_ref()
            .map(|t| t.max_extent())
            .unwrap_or(0.0);
        hull.inflate(margin)
    }

    /// Install a new polygonal boundary (periodicity is dropped).
    pub fn set_polygon(&mut self, polygon: Polygon) {
        self.boundary = Boundary::Polygon(polygon);
        self.periodic = false;
        self.touch();
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    /// Read a configuration record. A first line of two zeros announces a
    /// polygonal boundary; content after the last object is rejected.
    pub fn read_from(reader: impl BufRead) -> Result<Self, ConfigLoadError> {
        let mut scanner = Scanner::new(reader);

        let mut next = |field: &'static str| -> Result<(usize, String), ConfigLoadError> {
            match scanner.next_content_line()? {
                Some(line) => Ok((scanner.line_no(), line)),
                None => Err(ConfigLoadError::Parse {
                    line: scanner.line_no(),
                    kind: ParseErrorKind::UnexpectedEof { field },
                }),
            }
        };

        let (line, content) = next("boundary size")?;
        let fields = at_line(line, io::split_fields("boundary size", &content, 2))?;
        let x_size = at_line(line, io::parse_f64("x size", fields[0]))?;
        let y_size = at_line(line, io::parse_f64("y size", fields[1]))?;

        let boundary = if x_size == 0.0 && y_size == 0.0 {
            let (line, content) = next("vertex count")?;
            let n_vertices = at_line(line, io::parse_usize("vertex count", &content))?;
            let mut polygon = Polygon::with_capacity(n_vertices);
            for _ in 0..n_vertices {
                let (line, content) = next("vertex record")?;
                let fields = at_line(line, io::split_fields("vertex record", &content, 2))?;
                let x = at_line(line, io::parse_f64("vertex x", fields[0]))?;
                let y = at_line(line, io::parse_f64("vertex y", fields[1]))?;
                polygon.add_vertex(x, y);
            }
            Boundary::Polygon(polygon)
        } else {
            Boundary::Rectangle {
                width: x_size,
                height: y_size,
            }
        };

        let (line, content) = next("object count")?;
        let n_objects = at_line(line, io::parse_usize("object count", &content))?;

        let mut objects = Vec::with_capacity(n_objects);
        for _ in 0..n_objects {
            let (line, content) = next("object record")?;
            let fields = at_line(line, io::split_fields("object record", &content, 4))?;
            let molecule_index = at_line(line, io::parse_usize("object type", fields[0]))?;
            let x = at_line(line, io::parse_f64("object x", fields[1]))?;
            let y = at_line(line, io::parse_f64("object y", fields[2]))?;
            let orientation = at_line(line, io::parse_f64("object orientation", fields[3]))?;
            objects.push(PlacedObject::new(molecule_index, x, y, orientation));
        }

        if scanner.next_content_line()?.is_some() {
            return Err(ConfigLoadError::Parse {
                line: scanner.line_no(),
                kind: ParseErrorKind::TrailingContent,
            });
        }

        Ok(Self {
            boundary,
            periodic: false,
            topology: None,
            objects,
            saved_energy: 0.0,
            unchanged: false,
        })
    }

    /// Write the configuration in the format `read_from` accepts.
    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match &self.boundary {
            Boundary::Rectangle { width, height } => {
                writeln!(writer, "{:9.6} {:9.6}", width, height)?;
            }
            Boundary::Polygon(polygon) => {
                writeln!(writer, "{:9.6} {:9.6}", 0.0, 0.0)?;
                writeln!(writer, "{}", polygon.n_vertices())?;
                for v in polygon.vertices() {
                    writeln!(writer, "{:9.6} {:9.6}", v.x, v.y)?;
                }
            }
        }
        writeln!(writer, "{}", self.objects.len())?;
        for object in &self.objects {
            writeln!(
                writer,
                "{:5} {:9.6} {:9.6} {:9.6}",
                object.molecule_index, object.position.x, object.position.y, object.orientation
            )?;
        }
        Ok(())
    }
}
