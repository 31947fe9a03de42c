use super::geometry::Polygon;
use nalgebra::Point2;

/// The simulation boundary: a rectangle anchored at the origin, or an
/// arbitrary simple polygon. Periodicity is a property of the owning
/// configuration and is only meaningful for rectangles.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    Rectangle { width: f64, height: f64 },
    Polygon(Polygon),
}

impl Boundary {
    pub fn is_rectangle(&self) -> bool {
        matches!(self, Boundary::Rectangle { .. })
    }

    pub fn area(&self) -> f64 {
        match self {
            Boundary::Rectangle { width, height } => width * height,
            Boundary::Polygon(polygon) => polygon.area(),
        }
    }

    /// Horizontal extent (bounding-box width for polygons).
    pub fn width(&self) -> f64 {
        match self {
            Boundary::Rectangle { width, .. } => *width,
            Boundary::Polygon(polygon) => polygon.width(),
        }
    }

    /// Vertical extent (bounding-box height for polygons).
    pub fn height(&self) -> f64 {
        match self {
            Boundary::Rectangle { height, .. } => *height,
            Boundary::Polygon(polygon) => polygon.height(),
        }
    }

    pub fn min_side(&self) -> f64 {
        self.width().min(self.height())
    }

    /// Uniform scale about the origin.
    pub fn scale(&mut self, factor: f64) {
        match self {
            Boundary::Rectangle { width, height } => {
                *width *= factor;
                *height *= factor;
            }
            Boundary::Polygon(polygon) => polygon.scale(factor),
        }
    }

    /// Whether a disc of radius `radius` centred at (`x`, `y`) lies fully
    /// inside the boundary.
    pub fn contains_disc(&self, x: f64, y: f64, radius: f64) -> bool {
        match self {
            Boundary::Rectangle { width, height } => {
                x >= radius && x + radius <= *width && y >= radius && y + radius <= *height
            }
            Boundary::Polygon(polygon) => polygon.contains_disc(x, y, radius),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Boundary::Rectangle { width, height } => {
                x >= 0.0 && x <= *width && y >= 0.0 && y <= *height
            }
            Boundary::Polygon(polygon) => polygon.contains(x, y),
        }
    }

    /// The boundary outline as a polygon in canonical order. Rectangles
    /// become their four corners.
    pub fn to_polygon(&self) -> Polygon {
        match self {
            Boundary::Rectangle { width, height } => {
                let mut polygon = Polygon::from_vertices([
                    (0.0, 0.0),
                    (0.0, *height),
                    (*width, *height),
                    (*width, 0.0),
                ]);
                polygon.order_vertices();
                polygon
            }
            Boundary::Polygon(polygon) => polygon.clone(),
        }
    }

    /// If `polygon` is an axis-aligned rectangle, return its bottom-left
    /// corner and its width and height. Used to enable periodicity on
    /// parallelogram inputs by canonicalising them to a rectangle.
    pub fn axis_aligned_rectangle(polygon: &Polygon) -> Option<(Point2<f64>, f64, f64)> {
        let mut canonical = polygon.clone();
        if canonical.n_vertices() != 4 {
            return None;
        }
        canonical.order_vertices();
        if !canonical.is_parallelogram() {
            return None;
        }
        let v0 = canonical.vertex(0);
        let v1 = canonical.vertex(1);
        let v3 = canonical.vertex(3);
        // Clockwise from the bottom-left corner the first side runs up the
        // left edge and the last side along the bottom.
        if v1.x != v0.x || v3.y != v0.y {
            return None;
        }
        let width = v3.x - v0.x;
        let height = v1.y - v0.y;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some((v0, width, height))
    }
}
