//! Sheet geometry in millimeters.
//!
//! Origin is the top-left corner of the sheet, x grows to the right and y
//! grows downwards. Every tool and the router rely on this convention.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing coordinates coming from JSON payloads
pub const EPSILON_MM: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by an offset
    pub fn offset(self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }

    /// Vector from `other` to `self`
    pub fn delta_from(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() < EPSILON_MM && (self.y - other.y).abs() < EPSILON_MM
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rect {
    /// Build a normalized rectangle from any two opposite corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x_min: a.x.min(b.x),
            x_max: a.x.max(b.x),
            y_min: a.y.min(b.y),
            y_max: a.y.max(b.y),
        }
    }

    /// Grow the rectangle by `margin` on every side
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect {
            x_min: self.x_min - margin,
            x_max: self.x_max + margin,
            y_min: self.y_min - margin,
            y_max: self.y_max + margin,
        }
    }

    pub fn translate(&self, by: Point) -> Rect {
        Rect {
            x_min: self.x_min + by.x,
            x_max: self.x_max + by.x,
            y_min: self.y_min + by.y,
            y_max: self.y_max + by.y,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }
}

/// Symbol rotation in 90 degree steps, clockwise on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const DEGREES: [u16; 4] = [0, 90, 180, 270];

    /// Exact match against one of the four allowed angles
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        match degrees {
            d if d == 0.0 => Some(Rotation::R0),
            d if d == 90.0 => Some(Rotation::R90),
            d if d == 180.0 => Some(Rotation::R180),
            d if d == 270.0 => Some(Rotation::R270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Rotate an offset around the origin (clockwise on a y-down sheet)
    pub fn apply(self, p: Point) -> Point {
        match self {
            Rotation::R0 => p,
            Rotation::R90 => Point::new(-p.y, p.x),
            Rotation::R180 => Point::new(-p.x, -p.y),
            Rotation::R270 => Point::new(p.y, -p.x),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(f64::from(degrees))
            .ok_or_else(|| format!("rotation must be one of 0, 90, 180, 270 (got {})", degrees))
    }
}

/// Placement orientation: mirroring is applied before rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub rotation: Rotation,
    /// Flip across the horizontal axis (y is negated)
    pub mirror_x: bool,
    /// Flip across the vertical axis (x is negated)
    pub mirror_y: bool,
}

impl Orientation {
    pub fn apply(&self, offset: Point) -> Point {
        let mut p = offset;
        if self.mirror_x {
            p.y = -p.y;
        }
        if self.mirror_y {
            p.x = -p.x;
        }
        self.rotation.apply(p)
    }

    pub fn apply_rect(&self, rect: Rect) -> Rect {
        let a = self.apply(Point::new(rect.x_min, rect.y_min));
        let b = self.apply(Point::new(rect.x_max, rect.y_max));
        Rect::from_corners(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_is_clockwise_on_screen() {
        // A pin pointing right ends up pointing down after 90 degrees
        let right = Point::new(1.0, 0.0);
        assert_eq!(Rotation::R90.apply(right), Point::new(-0.0, 1.0));
        assert_eq!(Rotation::R180.apply(right), Point::new(-1.0, -0.0));
        assert!(Rotation::R270.apply(right).approx_eq(Point::new(0.0, -1.0)));
    }

    #[test]
    fn test_rotation_degrees_parsing() {
        assert_eq!(Rotation::from_degrees(90.0), Some(Rotation::R90));
        assert_eq!(Rotation::from_degrees(45.0), None);
        assert_eq!(Rotation::try_from(270u16), Ok(Rotation::R270));
        assert!(Rotation::try_from(360u16).is_err());

        let json = serde_json::to_string(&Rotation::R180).unwrap();
        assert_eq!(json, "180");
        let back: Rotation = serde_json::from_str("90").unwrap();
        assert_eq!(back, Rotation::R90);
    }

    #[test]
    fn test_mirror_applies_before_rotation() {
        let orientation = Orientation {
            rotation: Rotation::R90,
            mirror_x: false,
            mirror_y: true,
        };
        // (1, 0) -> mirror_y -> (-1, 0) -> rotate 90 -> (0, -1)
        assert!(orientation.apply(Point::new(1.0, 0.0)).approx_eq(Point::new(0.0, -1.0)));
    }

    #[test]
    fn test_rect_transform_stays_normalized() {
        let body = Rect {
            x_min: -1.0,
            x_max: 1.0,
            y_min: -3.0,
            y_max: 3.0,
        };
        let rotated = Orientation {
            rotation: Rotation::R90,
            ..Default::default()
        }
        .apply_rect(body);
        assert!(rotated.x_min < rotated.x_max);
        assert_eq!(rotated.x_max - rotated.x_min, 6.0);
        assert_eq!(rotated.y_max - rotated.y_min, 2.0);
    }

    #[test]
    fn test_rect_inflate_and_contains() {
        let r = Rect::from_corners(Point::new(10.0, 10.0), Point::new(0.0, 0.0));
        assert!(r.contains(Point::new(5.0, 5.0)));
        assert!(!r.contains(Point::new(10.5, 5.0)));
        assert!(r.inflate(1.0).contains(Point::new(10.5, 5.0)));
    }
}
