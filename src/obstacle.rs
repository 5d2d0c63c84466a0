//! Dynamic obstacles produced by perception and consumed by the avoidance loop.

use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{error::PlannerError, pose::Pose};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn point(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }
}

impl From<na::Point2<f64>> for Vertex {
    fn from(point: na::Point2<f64>) -> Self {
        Self::new(point.x, point.y)
    }
}

impl From<&Pose> for Vertex {
    fn from(pose: &Pose) -> Self {
        Self::new(pose.x, pose.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObstacleShape {
    Circle {
        center: Vertex,
        radius: f64,
    },
    Rectangle {
        center: Vertex,
        /// degrees
        angle: f64,
        length_x: f64,
        length_y: f64,
    },
}

/// An obstacle with its bounding polygon.
///
/// The polygon is expanded by a margin around the shape and is what the
/// path solver builds its visibility graph from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub shape: ObstacleShape,
    pub bounding_box: Vec<Vertex>,
}

impl Obstacle {
    /// Circle whose bounding polygon has `vertices` points on a circle of `bb_radius`.
    pub fn circle(center: Vertex, radius: f64, bb_radius: f64, vertices: usize) -> Self {
        let vertices = vertices.max(3);
        // counter clockwise
        let bounding_box = (0..vertices)
            .map(|i| {
                let angle = (i as f64 * 2.0 * PI) / vertices as f64;
                Vertex::new(
                    center.x + bb_radius * angle.cos(),
                    center.y + bb_radius * angle.sin(),
                )
            })
            .collect();
        Self {
            shape: ObstacleShape::Circle { center, radius },
            bounding_box,
        }
    }

    /// Rectangle rotated by `angle` degrees, bounding box grown by `margin` (ratio of each side).
    pub fn rectangle(center: Vertex, angle: f64, length_x: f64, length_y: f64, margin: f64) -> Self {
        let rotation = na::Rotation2::new(angle.to_radians());
        let half_x = length_x * (1.0 + margin) / 2.0;
        let half_y = length_y * (1.0 + margin) / 2.0;
        let bounding_box = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|(sx, sy)| {
                let offset = rotation * na::Vector2::new(sx * half_x, sy * half_y);
                Vertex::from(center.point() + offset)
            })
            .collect();
        Self {
            shape: ObstacleShape::Rectangle {
                center,
                angle,
                length_x,
                length_y,
            },
            bounding_box,
        }
    }

    pub fn center(&self) -> Vertex {
        match &self.shape {
            ObstacleShape::Circle { center, .. } => *center,
            ObstacleShape::Rectangle { center, .. } => *center,
        }
    }

    /// Point inside the obstacle shape (not its bounding box).
    pub fn contains(&self, point: &Vertex) -> bool {
        match &self.shape {
            ObstacleShape::Circle { center, radius } => {
                na::distance(&center.point(), &point.point()) <= *radius
            }
            ObstacleShape::Rectangle {
                center,
                angle,
                length_x,
                length_y,
            } => {
                let rotation = na::Rotation2::new(angle.to_radians());
                let local = rotation.inverse() * (point.point() - center.point());
                local.x.abs() <= length_x / 2.0 && local.y.abs() <= length_y / 2.0
            }
        }
    }

    /// Point inside the bounding polygon.
    pub fn bounding_box_contains(&self, point: &Vertex) -> bool {
        polygon_contains(&self.bounding_box, point)
    }

    /// Segment crosses one of the bounding polygon edges.
    pub fn intersects_segment(&self, a: &Vertex, b: &Vertex) -> bool {
        let count = self.bounding_box.len();
        (0..count).any(|i| {
            let p3 = &self.bounding_box[i];
            let p4 = &self.bounding_box[(i + 1) % count];
            segments_intersect(a, b, p3, p4)
        })
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        let finite = |v: &Vertex| v.x.is_finite() && v.y.is_finite();
        let valid_shape = match &self.shape {
            ObstacleShape::Circle { center, radius } => {
                finite(center) && radius.is_finite() && *radius > 0.0
            }
            ObstacleShape::Rectangle {
                center,
                angle,
                length_x,
                length_y,
            } => {
                finite(center)
                    && angle.is_finite()
                    && length_x.is_finite()
                    && length_y.is_finite()
                    && *length_x > 0.0
                    && *length_y > 0.0
            }
        };
        if !valid_shape {
            return Err(PlannerError::MalformedObstacle(format!("{:?}", self.shape)));
        }
        if self.bounding_box.len() < 3 || !self.bounding_box.iter().all(finite) {
            return Err(PlannerError::MalformedObstacle(format!(
                "invalid bounding box around {:?}",
                self.center()
            )));
        }
        Ok(())
    }
}

fn orientation(p: &Vertex, q: &Vertex, r: &Vertex) -> f64 {
    (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
}

fn on_segment(p: &Vertex, q: &Vertex, r: &Vertex) -> bool {
    r.x <= p.x.max(q.x) && r.x >= p.x.min(q.x) && r.y <= p.y.max(q.y) && r.y >= p.y.min(q.y)
}

/// Closed segment intersection test, collinear overlaps included.
pub fn segments_intersect(p1: &Vertex, p2: &Vertex, p3: &Vertex, p4: &Vertex) -> bool {
    let d1 = orientation(p3, p4, p1);
    let d2 = orientation(p3, p4, p2);
    let d3 = orientation(p1, p2, p3);
    let d4 = orientation(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(p3, p4, p1))
        || (d2 == 0.0 && on_segment(p3, p4, p2))
        || (d3 == 0.0 && on_segment(p1, p2, p3))
        || (d4 == 0.0 && on_segment(p1, p2, p4))
}

/// Ray casting point in polygon test.
pub fn polygon_contains(polygon: &[Vertex], point: &Vertex) -> bool {
    let mut inside = false;
    let count = polygon.len();
    if count < 3 {
        return false;
    }
    let mut j = count - 1;
    for i in 0..count {
        let (pi, pj) = (&polygon[i], &polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
