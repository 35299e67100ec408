//! Plane geometry for system placement and wire routing.
//!
//! Coordinates are [`Fixed64`]. Euclidean lengths need a square root, which
//! is only taken when topology changes (wire creation, waypoint edits,
//! system moves); the tick loop itself only adds, multiplies and divides.

use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64};
use serde::{Deserialize, Serialize};

/// A point on the game board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl Point {
    pub const ORIGIN: Point = Point {
        x: Fixed64::ZERO,
        y: Fixed64::ZERO,
    };

    pub fn new(x: Fixed64, y: Fixed64) -> Self {
        Self { x, y }
    }

    /// Convenience constructor for setup code and tests.
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: f64_to_fixed64(x),
            y: f64_to_fixed64(y),
        }
    }

    /// Euclidean distance, rounded once into fixed-point.
    pub fn distance(self, other: Point) -> Fixed64 {
        let dx = fixed64_to_f64(other.x) - fixed64_to_f64(self.x);
        let dy = fixed64_to_f64(other.y) - fixed64_to_f64(self.y);
        Fixed64::saturating_from_num(dx.hypot(dy))
    }

    /// Linear interpolation from `self` toward `other` by `t` in [0, 1].
    pub fn lerp(self, other: Point, t: Fixed64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// A polyline with cached segment lengths.
///
/// Wires own one of these: `[start port, waypoints.., end port]`.
///
/// Serialized as its points alone; segment lengths are recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polyline {
    points: Vec<Point>,
    segments: Vec<Fixed64>,
    length: Fixed64,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        let segments: Vec<Fixed64> = points
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .collect();
        let length = segments
            .iter()
            .fold(Fixed64::ZERO, |acc, &s| acc.saturating_add(s));
        Self {
            points,
            segments,
            length,
        }
    }

    /// Total length over all segments.
    pub fn length(&self) -> Fixed64 {
        self.length
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The point reached after travelling `distance` from the first point.
    /// Distances past either end clamp to the endpoints.
    pub fn point_at(&self, distance: Fixed64) -> Point {
        let Some(&first) = self.points.first() else {
            return Point::ORIGIN;
        };
        if distance <= Fixed64::ZERO {
            return first;
        }
        let mut remaining = distance;
        for (i, &seg) in self.segments.iter().enumerate() {
            if remaining <= seg {
                if seg == Fixed64::ZERO {
                    return self.points[i + 1];
                }
                return self.points[i].lerp(self.points[i + 1], remaining / seg);
            }
            remaining -= seg;
        }
        self.points.last().copied().unwrap_or(first)
    }

    /// Unit direction of the segment containing `distance`, or zero for a
    /// degenerate polyline.
    pub fn direction_at(&self, distance: Fixed64) -> Point {
        let mut remaining = distance.max(Fixed64::ZERO);
        let last = self.segments.len().saturating_sub(1);
        for (i, &seg) in self.segments.iter().enumerate() {
            if remaining <= seg || i == last {
                if seg == Fixed64::ZERO {
                    return Point::ORIGIN;
                }
                let a = self.points[i];
                let b = self.points[i + 1];
                return Point::new((b.x - a.x) / seg, (b.y - a.y) / seg);
            }
            remaining -= seg;
        }
        Point::ORIGIN
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl From<Polyline> for Vec<Point> {
    fn from(line: Polyline) -> Self {
        line.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(v: f64) -> Fixed64 {
        f64_to_fixed64(v)
    }

    #[test]
    fn distance_three_four_five() {
        let a = Point::from_f64(0.0, 0.0);
        let b = Point::from_f64(3.0, 4.0);
        assert_eq!(a.distance(b), fx(5.0));
    }

    #[test]
    fn polyline_length_sums_segments() {
        let line = Polyline::new(vec![
            Point::from_f64(0.0, 0.0),
            Point::from_f64(3.0, 4.0),
            Point::from_f64(3.0, 10.0),
        ]);
        assert_eq!(line.length(), fx(11.0));
    }

    #[test]
    fn point_at_walks_segments() {
        let line = Polyline::new(vec![
            Point::from_f64(0.0, 0.0),
            Point::from_f64(10.0, 0.0),
            Point::from_f64(10.0, 10.0),
        ]);
        assert_eq!(line.point_at(fx(5.0)), Point::from_f64(5.0, 0.0));
        assert_eq!(line.point_at(fx(15.0)), Point::from_f64(10.0, 5.0));
        assert_eq!(line.point_at(fx(99.0)), Point::from_f64(10.0, 10.0));
        assert_eq!(line.point_at(fx(-1.0)), Point::from_f64(0.0, 0.0));
    }

    #[test]
    fn direction_follows_current_segment() {
        let line = Polyline::new(vec![
            Point::from_f64(0.0, 0.0),
            Point::from_f64(10.0, 0.0),
            Point::from_f64(10.0, 10.0),
        ]);
        assert_eq!(line.direction_at(fx(2.0)), Point::from_f64(1.0, 0.0));
        assert_eq!(line.direction_at(fx(12.0)), Point::from_f64(0.0, 1.0));
    }

    #[test]
    fn zero_length_polyline() {
        let p = Point::from_f64(4.0, 4.0);
        let line = Polyline::new(vec![p, p]);
        assert_eq!(line.length(), Fixed64::ZERO);
        assert_eq!(line.point_at(fx(1.0)), p);
        assert_eq!(line.direction_at(Fixed64::ZERO), Point::ORIGIN);
    }

    #[test]
    fn decoded_polyline_recomputes_lengths() {
        let points = vec![Point::ORIGIN, Point::from_f64(30.0, 40.0)];
        let json = serde_json::to_value(&points).unwrap();
        let line: Polyline = serde_json::from_value(json).unwrap();
        assert_eq!(line.length(), fx(50.0));
        assert_eq!(line.point_at(fx(25.0)), Point::from_f64(15.0, 20.0));

        let encoded = serde_json::to_value(&line).unwrap();
        assert_eq!(encoded.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn far_apart_points_saturate() {
        let a = Point::new(Fixed64::MIN, Fixed64::MIN);
        let b = Point::new(Fixed64::MAX, Fixed64::MAX);
        assert_eq!(a.distance(b), Fixed64::MAX);
        assert_eq!(Polyline::new(vec![a, b, a]).length(), Fixed64::MAX);
    }
}
