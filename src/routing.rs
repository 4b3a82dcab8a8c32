//! Orthogonal wire routing
//!
//! This is a local heuristic, not a path planner. Between two points it only
//! ever considers a straight run (when the points share an axis) or the two
//! single-bend L shapes, and picks the L that crosses fewer inflated obstacle
//! rectangles. It never detours around obstacles, so a wire may still cross a
//! symbol body when both L shapes do.

use serde::Serialize;

use crate::document::{Point, Rect, EPSILON_MM};

/// Default clearance added around every obstacle (half of the 2.54 mm grid)
pub const DEFAULT_OBSTACLE_MARGIN_MM: f64 = 1.27;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn is_degenerate(&self) -> bool {
        self.start.approx_eq(self.end)
    }

    /// Whether this axis-aligned segment passes through `rect`.
    ///
    /// The segment is treated as zero-width: it crosses when its fixed
    /// coordinate lies within the rectangle's span on the perpendicular axis
    /// and its extent overlaps the rectangle's range on its own axis.
    fn crosses(&self, rect: &Rect) -> bool {
        let horizontal = (self.start.y - self.end.y).abs() < EPSILON_MM;
        if horizontal {
            let y = self.start.y;
            let (lo, hi) = ordered(self.start.x, self.end.x);
            y >= rect.y_min && y <= rect.y_max && lo <= rect.x_max && hi >= rect.x_min
        } else {
            let x = self.start.x;
            let (lo, hi) = ordered(self.start.y, self.end.y);
            x >= rect.x_min && x <= rect.x_max && lo <= rect.y_max && hi >= rect.y_min
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A routed path: one or two connected axis-aligned segments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub segments: Vec<Segment>,
    /// Number of obstacles the chosen path crosses
    pub crossings: usize,
}

impl Route {
    /// The bend point, if the path has one
    pub fn bend(&self) -> Option<Point> {
        match self.segments.as_slice() {
            [first, _] => Some(first.end),
            _ => None,
        }
    }
}

/// Route from `start` to `end` around `obstacles`, each grown by `margin`.
///
/// Pure: the same inputs always produce the same route. Ties between the two
/// L shapes go to the one bending at `(end.x, start.y)`.
pub fn route(start: Point, end: Point, obstacles: &[Rect], margin: f64) -> Route {
    let inflated: Vec<Rect> = obstacles.iter().map(|r| r.inflate(margin)).collect();

    let shares_x = (start.x - end.x).abs() < EPSILON_MM;
    let shares_y = (start.y - end.y).abs() < EPSILON_MM;
    if shares_x || shares_y {
        let segments = vec![Segment::new(start, end)];
        let crossings = count_crossings(&segments, &inflated);
        return Route {
            segments,
            crossings,
        };
    }

    let candidates = [Point::new(end.x, start.y), Point::new(start.x, end.y)];
    let mut best: Option<Route> = None;
    for bend in candidates {
        let segments = vec![Segment::new(start, bend), Segment::new(bend, end)];
        let crossings = count_crossings(&segments, &inflated);
        let better = match &best {
            Some(current) => crossings < current.crossings,
            None => true,
        };
        if better {
            best = Some(Route {
                segments,
                crossings,
            });
        }
    }

    // Both candidates are always evaluated, so `best` is populated
    best.unwrap_or_else(|| Route {
        segments: vec![Segment::new(start, end)],
        crossings: 0,
    })
}

/// Count rectangles crossed by any segment. A rectangle hit by both
/// segments still counts once.
fn count_crossings(segments: &[Segment], rects: &[Rect]) -> usize {
    rects
        .iter()
        .filter(|rect| segments.iter().any(|segment| segment.crosses(rect)))
        .count()
}
