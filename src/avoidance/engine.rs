use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::{
    obstacle::{Obstacle, Vertex},
    pose::PathPose,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AvoidanceStrategy {
    /// straight line, obstacles ignored
    Disabled = 0,
    /// stop in front of obstacles, only direct paths are accepted
    StopAndGo = 1,
    #[default]
    NativeSolver = 2,
}

impl AvoidanceStrategy {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AvoidanceStrategy::StopAndGo,
            2 => AvoidanceStrategy::NativeSolver,
            _ => AvoidanceStrategy::Disabled,
        }
    }
}

impl FromStr for AvoidanceStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "disabled" => Ok(AvoidanceStrategy::Disabled),
            "stopandgo" | "stop_and_go" => Ok(AvoidanceStrategy::StopAndGo),
            "nativesolver" | "native_solver" | "native" => Ok(AvoidanceStrategy::NativeSolver),
            other => Err(format!("unknown avoidance strategy {other}")),
        }
    }
}

/// Geometric path search over a set of obstacles.
#[cfg_attr(test, mockall::automock)]
pub trait PathSolver: Send {
    /// Replace the obstacles the solver plans around.
    fn set_obstacles(&mut self, obstacles: &[Obstacle]);

    /// True when the straight segment from `start` to `goal` is no longer free.
    fn check_recompute(&self, start: &Vertex, goal: &Vertex) -> bool;

    /// Waypoints from `start` to `goal`, both included, or None when unreachable.
    fn solve(&self, start: &Vertex, goal: &Vertex) -> Option<Vec<Vertex>>;
}

/// Turns solver output into a path of poses according to the selected strategy.
pub struct AvoidanceEngine<S> {
    solver: S,
    strategy: AvoidanceStrategy,
}

impl<S: PathSolver> AvoidanceEngine<S> {
    pub fn new(solver: S, strategy: AvoidanceStrategy) -> Self {
        Self { solver, strategy }
    }

    pub fn strategy(&self) -> AvoidanceStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: AvoidanceStrategy) {
        self.strategy = strategy;
    }

    pub fn set_obstacles(&mut self, obstacles: &[Obstacle]) {
        self.solver.set_obstacles(obstacles);
    }

    /// Cheap test telling if the route toward `goal` must be recomputed.
    pub fn check_recompute(&self, current: &PathPose, goal: &PathPose) -> bool {
        match self.strategy {
            AvoidanceStrategy::NativeSolver => self
                .solver
                .check_recompute(&Vertex::from(&current.pose), &Vertex::from(&goal.pose)),
            _ => true,
        }
    }

    /// Path from `current` to `goal`.
    ///
    /// Empty when unreachable, `[current]` when already there, otherwise
    /// `[current, intermediate.., goal]`.
    pub fn get_path(
        &mut self,
        current: &PathPose,
        goal: &PathPose,
        obstacles: &[Obstacle],
    ) -> Vec<PathPose> {
        if current.pose == goal.pose {
            return vec![*current];
        }

        match self.strategy {
            AvoidanceStrategy::Disabled => vec![*current, *goal],
            AvoidanceStrategy::StopAndGo => {
                let start = Vertex::from(&current.pose);
                let end = Vertex::from(&goal.pose);
                if obstacles.iter().any(|o| o.contains(&start)) {
                    debug!("Avoidance: pose current in obstacle");
                    return vec![];
                }
                if obstacles.iter().any(|o| o.contains(&end)) {
                    debug!("Avoidance: pose order in obstacle");
                    return vec![];
                }
                let path = self.solve(current, goal, obstacles);
                if path.len() > 2 {
                    debug!("Avoidance: stop and go rejects path of {} poses", path.len());
                    return vec![];
                }
                path
            }
            AvoidanceStrategy::NativeSolver => self.solve(current, goal, obstacles),
        }
    }

    fn solve(&mut self, current: &PathPose, goal: &PathPose, obstacles: &[Obstacle]) -> Vec<PathPose> {
        self.solver.set_obstacles(obstacles);
        let Some(waypoints) = self
            .solver
            .solve(&Vertex::from(&current.pose), &Vertex::from(&goal.pose))
        else {
            debug!("Avoidance: solver found no path");
            return vec![];
        };

        let mut path = vec![*current];
        let inner = waypoints
            .iter()
            .skip(1)
            .take(waypoints.len().saturating_sub(2));
        for vertex in inner {
            let seen = path
                .iter()
                .any(|p| p.pose.x == vertex.x && p.pose.y == vertex.y);
            if seen || (vertex.x == goal.pose.x && vertex.y == goal.pose.y) {
                continue;
            }
            path.push(PathPose::new(vertex.x, vertex.y, 0.0).intermediate());
        }
        path.push(*goal);
        path
    }
}
