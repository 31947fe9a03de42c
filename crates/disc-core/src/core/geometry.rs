use nalgebra::{Point2, Rotation2, Vector2};

pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (b - a).norm()
}

/// Distance from `p` to the segment `a`-`b`, via the clamped projection
/// parameter.
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let l2 = ab.norm_squared();
    if l2 == 0.0 {
        return distance(p, a);
    }
    let t = ((p - a).dot(&ab) / l2).clamp(0.0, 1.0);
    let projection = a + ab * t;
    distance(p, &projection)
}

/// A simple planar polygon stored as an ordered vertex list.
///
/// Used both as a simulation boundary and as the output of the convex-hull
/// wrap. The vertex order is free until [`Polygon::order_vertices`] is
/// called, which normalises to a bottom-left first vertex and clockwise
/// winding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2<f64>>,
}

impl Polygon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n_vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(n_vertices),
        }
    }

    pub fn from_vertices(vertices: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            vertices: vertices
                .into_iter()
                .map(|(x, y)| Point2::new(x, y))
                .collect(),
        }
    }

    pub fn add_vertex(&mut self, x: f64, y: f64) {
        self.vertices.push(Point2::new(x, y));
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, i: usize) -> Point2<f64> {
        self.vertices[i]
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    /// Absolute enclosed area by the shoelace formula.
    pub fn area(&self) -> f64 {
        (self.signed_double_area() / 2.0).abs()
    }

    fn signed_double_area(&self) -> f64 {
        let n = self.vertices.len();
        let mut sum = 0.0;
        for i in 0..n {
            let curr = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            sum += curr.x * next.y - next.x * curr.y;
        }
        sum
    }

    /// Minimum enclosing axis-aligned rectangle as (min corner, max corner).
    pub fn bounding_box(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        (min, max)
    }

    pub fn width(&self) -> f64 {
        let (min, max) = self.bounding_box();
        max.x - min.x
    }

    pub fn height(&self) -> f64 {
        let (min, max) = self.bounding_box();
        max.y - min.y
    }

    /// Largest vertex-to-vertex distance.
    pub fn max_dist(&self) -> f64 {
        let mut result = 0.0f64;
        for (i, a) in self.vertices.iter().enumerate() {
            for b in &self.vertices[i + 1..] {
                result = result.max(distance(a, b));
            }
        }
        result
    }

    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.vertices {
            v.x *= factor;
            v.y *= factor;
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        let shift = Vector2::new(dx, dy);
        for v in &mut self.vertices {
            *v += shift;
        }
    }

    /// Clockwise rotation of all vertices about the origin.
    pub fn rotate(&mut self, angle: f64) {
        let rotation = Rotation2::new(-angle);
        for v in &mut self.vertices {
            *v = rotation * *v;
        }
    }

    /// +1 for clockwise winding, -1 for counter-clockwise.
    pub fn winding(&self) -> i32 {
        if self.signed_double_area() < 0.0 { 1 } else { -1 }
    }

    /// Normalise the vertex order: vertex 0 becomes the bottom-left vertex
    /// (minimum y, ties broken by minimum x) and the winding is made
    /// clockwise. The polygon shape is unchanged.
    pub fn order_vertices(&mut self) {
        let mut index = 0;
        let mut min = self.vertices[0];
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            if v.y < min.y || (v.y == min.y && v.x < min.x) {
                index = i;
                min = *v;
            }
        }
        self.vertices.rotate_left(index);
        if self.winding() < 0 {
            self.vertices[1..].reverse();
        }
    }

    /// True iff the polygon has four vertices and opposite sides are equal
    /// as 2-vectors.
    pub fn is_parallelogram(&self) -> bool {
        if self.vertices.len() != 4 {
            return false;
        }
        let side = |i: usize| self.vertices[(i + 1) % 4] - self.vertices[i];
        side(0) == -side(2) && side(1) == -side(3)
    }

    /// Crossing-number containment test.
    ///
    /// The ray is cast in both the +x and -x directions and the results
    /// combined by OR, which removes the artefacts a single ray suffers
    /// when the query point is collinear with an edge. Points collinear
    /// with a horizontal edge are excluded from the crossing count.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut l_test = false;
        let mut r_test = false;

        let n = self.vertices.len();
        for i in 0..n {
            let curr = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            let spans = (curr.y >= y && next.y <= y) || (curr.y <= y && next.y >= y);
            if spans && next.y != curr.y {
                let slope = (next.x - curr.x) / (next.y - curr.y);
                let x_cross = curr.x + (y - curr.y) * slope;
                if x < x_cross {
                    r_test = !r_test;
                }
                if x > x_cross {
                    l_test = !l_test;
                }
            }
        }
        l_test || r_test
    }

    /// Containment with clearance: the point must be inside and at least
    /// `radius` away from every edge.
    pub fn contains_disc(&self, x: f64, y: f64, radius: f64) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        let p = Point2::new(x, y);
        let n = self.vertices.len();
        for i in 0..n {
            let curr = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            if point_segment_distance(&p, &curr, &next) < radius {
                return false;
            }
        }
        true
    }

    pub fn contains_polygon(&self, other: &Polygon) -> bool {
        other.vertices.iter().all(|v| self.contains(v.x, v.y))
    }

    /// Convex hull of a point set by Andrew's monotone chain, returned in
    /// canonical order.
    pub fn convex_hull(points: &[Point2<f64>]) -> Polygon {
        let mut sorted: Vec<Point2<f64>> = points.to_vec();
        sorted.sort_by(|a, b| {
            (a.x, a.y)
                .partial_cmp(&(b.x, b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.dedup();

        if sorted.len() < 3 {
            let mut hull = Polygon::new();
            for p in sorted {
                hull.add_vertex(p.x, p.y);
            }
            return hull;
        }

        let cross = |o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>| {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        };

        let mut lower: Vec<Point2<f64>> = Vec::new();
        for p in &sorted {
            while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(*p);
        }
        let mut upper: Vec<Point2<f64>> = Vec::new();
        for p in sorted.iter().rev() {
            while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(*p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);

        let mut hull = Polygon { vertices: lower };
        hull.order_vertices();
        hull
    }

    /// Offset every edge outward along its outward normal by `margin` and
    /// rebuild the vertices as the intersections of adjacent offset edges.
    /// The polygon must be convex and in clockwise winding.
    pub fn inflate(&self, margin: f64) -> Polygon {
        let n = self.vertices.len();
        if n < 3 || margin == 0.0 {
            return self.clone();
        }

        // Offset line per edge: a point on the shifted edge plus the edge
        // direction.
        let mut lines: Vec<(Point2<f64>, Vector2<f64>)> = Vec::with_capacity(n);
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let d = (b - a).normalize();
            let outward = Vector2::new(-d.y, d.x);
            lines.push((a + outward * margin, d));
        }

        let mut inflated = Polygon::with_capacity(n);
        for i in 0..n {
            let (p1, d1) = lines[(i + n - 1) % n];
            let (p2, d2) = lines[i];
            let denom = d1.x * d2.y - d1.y * d2.x;
            let v = if denom.abs() < 1e-12 {
                // Collinear consecutive edges: the shared vertex just moves
                // along the common normal.
                self.vertices[i] + Vector2::new(-d2.y, d2.x) * margin
            } else {
                let t = ((p2.x - p1.x) * d2.y - (p2.y - p1.y) * d2.x) / denom;
                p1 + d1 * t
            };
            inflated.add_vertex(v.x, v.y);
        }
        inflated
    }
}
