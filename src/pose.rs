use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PlannerError;

/// Robot pose on the table. Positions are in millimetres, orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    #[serde(default, alias = "O")]
    pub orientation: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, orientation: f64) -> Self {
        Self { x, y, orientation }
    }

    pub fn from_na(position: na::Point2<f64>, rotation: na::Rotation2<f64>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            orientation: rotation.angle().to_degrees(),
        }
    }

    pub fn position(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }

    pub fn rotation(&self) -> na::Rotation2<f64> {
        na::Rotation2::new(self.orientation.to_radians())
    }

    pub fn distance_to(&self, other: &Pose) -> f64 {
        na::distance(&self.position(), &other.position())
    }

    /// Smallest signed angle in degrees to turn from this pose to `other`.
    pub fn angle_to(&self, other: &Pose) -> f64 {
        self.rotation().angle_to(&other.rotation()).to_degrees()
    }

    /// Heading in degrees of the segment from this pose toward `other`.
    pub fn heading_to(&self, other: &Pose) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    pub fn same_position(&self, other: &Pose) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.orientation.is_finite()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:.1}, {:.1}] -> {:.1}", self.x, self.y, self.orientation)
    }
}

/// Positional and angular tolerance used to decide that two poses are the same target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEpsilon {
    /// mm
    pub distance: f64,
    /// degrees
    pub angle: f64,
}

impl Default for PoseEpsilon {
    fn default() -> Self {
        Self {
            distance: 20.0,
            angle: 5.0,
        }
    }
}

impl PoseEpsilon {
    pub fn close(&self, a: &Pose, b: &Pose) -> bool {
        a.distance_to(b) < self.distance && a.angle_to(b).abs() < self.angle
    }

    pub fn close_position(&self, a: &Pose, b: &Pose) -> bool {
        a.distance_to(b) < self.distance
    }
}

fn default_speed() -> f64 {
    66.0
}

fn default_true() -> bool {
    true
}

/// A pose with the motion constraints the motion layer applies while reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPose {
    #[serde(flatten)]
    pub pose: Pose,
    /// percent of the robot max linear speed
    #[serde(default = "default_speed")]
    pub max_speed_linear: f64,
    /// percent of the robot max angular speed
    #[serde(default = "default_speed")]
    pub max_speed_angular: f64,
    #[serde(default = "default_true")]
    pub allow_reverse: bool,
    #[serde(default)]
    pub bypass_anti_blocking: bool,
    /// 0 means unbounded
    #[serde(default)]
    pub timeout_ms: u32,
    #[serde(default)]
    pub bypass_final_orientation: bool,
    #[serde(default)]
    pub is_intermediate: bool,
}

impl Default for PathPose {
    fn default() -> Self {
        Self::from(Pose::default())
    }
}

impl From<Pose> for PathPose {
    fn from(pose: Pose) -> Self {
        Self {
            pose,
            max_speed_linear: default_speed(),
            max_speed_angular: default_speed(),
            allow_reverse: true,
            bypass_anti_blocking: false,
            timeout_ms: 0,
            bypass_final_orientation: false,
            is_intermediate: false,
        }
    }
}

impl PathPose {
    pub fn new(x: f64, y: f64, orientation: f64) -> Self {
        Pose::new(x, y, orientation).into()
    }

    pub fn with_speeds(mut self, linear: f64, angular: f64) -> Self {
        self.max_speed_linear = linear;
        self.max_speed_angular = angular;
        self
    }

    pub fn with_allow_reverse(mut self, allow_reverse: bool) -> Self {
        self.allow_reverse = allow_reverse;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn intermediate(mut self) -> Self {
        self.is_intermediate = true;
        self.bypass_final_orientation = true;
        self
    }

    pub fn x(&self) -> f64 {
        self.pose.x
    }

    pub fn y(&self) -> f64 {
        self.pose.y
    }

    pub fn orientation(&self) -> f64 {
        self.pose.orientation
    }

    /// Copy the motion constraints of `order` onto this pose.
    pub fn inherit_constraints(&mut self, order: &PathPose) {
        self.allow_reverse = order.allow_reverse;
        self.timeout_ms = order.timeout_ms;
        self.max_speed_linear = order.max_speed_linear;
        self.max_speed_angular = order.max_speed_angular;
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if !self.pose.is_finite() {
            return Err(PlannerError::MalformedPose(format!(
                "non finite coordinates {}",
                self.pose
            )));
        }
        for speed in [self.max_speed_linear, self.max_speed_angular] {
            if !(0.0..=100.0).contains(&speed) {
                return Err(PlannerError::MalformedPose(format!(
                    "speed {} out of range for {}",
                    speed, self.pose
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PathPose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pose)?;
        if self.is_intermediate {
            write!(f, " (intermediate)")?;
        }
        Ok(())
    }
}
