//! Avoidance worker.
//!
//! Runs on its own OS thread at the path refresh interval. It talks to the
//! planner only through [`SharedMemory`], the blocked report channel and the
//! latest path channel.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::{
    engine::{AvoidanceEngine, AvoidanceStrategy, PathSolver},
    visibility::VisibilityRoadMap,
};
use crate::{
    configuration::AvoidanceConfig,
    error::PlannerError,
    pose::{PathPose, PoseEpsilon},
    shared::SharedMemory,
    util::LatestSender,
};

/// Reports sent back to the planner besides paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvoidanceReport {
    /// no path toward the pose order this cycle
    Blocked,
}

/// Path emitted toward the pose order. `pose_order` is the next pose the
/// motion layer must reach, `path` the remaining poses including it.
#[derive(Debug, Clone, PartialEq)]
pub struct AvoidancePath {
    pub path: Vec<PathPose>,
    pub pose_order: PathPose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GoalReached,
    NotMoved,
    RouteStillValid,
    SamePoseOrder,
    PoseOrderChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// no pose order
    Idle,
    Skipped(SkipReason),
    Blocked,
    /// already at the pose order
    Arrived,
    Emitted(AvoidancePath),
}

pub struct AvoidanceLoop<S> {
    shared: Arc<SharedMemory>,
    engine: AvoidanceEngine<S>,
    reports: UnboundedSender<AvoidanceReport>,
    paths: LatestSender<AvoidancePath>,
    epsilon: PoseEpsilon,
    pose_order: Option<PathPose>,
    last_pose_current: Option<PathPose>,
    last_emitted_pose_order: Option<PathPose>,
    pending: Option<AvoidancePath>,
    computations: usize,
}

impl<S: PathSolver> AvoidanceLoop<S> {
    pub fn new(
        shared: Arc<SharedMemory>,
        solver: S,
        epsilon: PoseEpsilon,
        reports: UnboundedSender<AvoidanceReport>,
        paths: LatestSender<AvoidancePath>,
    ) -> Self {
        let strategy = shared.properties.avoidance_strategy();
        Self {
            shared,
            engine: AvoidanceEngine::new(solver, strategy),
            reports,
            paths,
            epsilon,
            pose_order: None,
            last_pose_current: None,
            last_emitted_pose_order: None,
            pending: None,
            computations: 0,
        }
    }

    /// Number of path computations run so far.
    pub fn computations(&self) -> usize {
        self.computations
    }

    /// Publish the path computed by the previous cycle.
    pub fn publish_pending(&mut self) {
        let Some(path) = self.pending.take() else {
            return;
        };
        if self.shared.has_new_pose_order() {
            debug!("Avoidance: pose order changed, dropping computed path");
            return;
        }
        if self.paths.send(path).is_err() {
            warn!("Avoidance: path receiver is gone");
        }
    }

    /// One cycle without the publication and timing.
    pub fn step(&mut self) -> CycleOutcome {
        if let Some(pose_order) = self.shared.take_new_pose_order() {
            debug!("Avoidance: new pose order {:?}", pose_order);
            self.pose_order = pose_order;
            self.last_pose_current = None;
            self.last_emitted_pose_order = None;
            self.pending = None;
        }
        if self.shared.take_last_pose_invalidated() {
            self.last_pose_current = None;
            self.last_emitted_pose_order = None;
        }
        self.engine
            .set_strategy(self.shared.properties.avoidance_strategy());

        let Some(pose_order) = self.pose_order else {
            self.last_pose_current = None;
            self.last_emitted_pose_order = None;
            return CycleOutcome::Idle;
        };
        let pose_current = PathPose::from(self.shared.pose_current());

        let obstacles = match self.engine.strategy() {
            AvoidanceStrategy::Disabled => vec![],
            _ => self.shared.obstacles(),
        };

        if let Some(last_pose_current) = self.last_pose_current {
            if self.epsilon.close(&pose_current.pose, &pose_order.pose) {
                return CycleOutcome::Skipped(SkipReason::GoalReached);
            }
            // a robot standing still is only skipped when obstacles cannot matter,
            // otherwise a new obstacle would never be noticed
            let unmoved = last_pose_current.pose.same_position(&pose_current.pose);
            let barely_moved = !unmoved
                && self
                    .epsilon
                    .close_position(&last_pose_current.pose, &pose_current.pose);
            if barely_moved || (unmoved && self.engine.strategy() == AvoidanceStrategy::Disabled)
            {
                return CycleOutcome::Skipped(SkipReason::NotMoved);
            }
            if self.engine.strategy() == AvoidanceStrategy::NativeSolver {
                if let Some(last_emitted) = self.last_emitted_pose_order {
                    self.engine.set_obstacles(&obstacles);
                    let direct_route_free = !self.engine.check_recompute(&pose_current, &pose_order);
                    let next_route_free = !self.engine.check_recompute(&pose_current, &last_emitted);
                    if next_route_free && !(direct_route_free && last_emitted != pose_order) {
                        return CycleOutcome::Skipped(SkipReason::RouteStillValid);
                    }
                }
            }
        }

        self.computations += 1;
        let mut path = if pose_current.pose.same_position(&pose_order.pose)
            && !self.epsilon.close(&pose_current.pose, &pose_order.pose)
        {
            // rotation only
            vec![pose_current, pose_order]
        } else {
            self.engine.get_path(&pose_current, &pose_order, &obstacles)
        };

        if path.is_empty() {
            debug!("Avoidance: no path from {} to {}", pose_current, pose_order);
            self.last_pose_current = None;
            self.last_emitted_pose_order = None;
            if self.reports.send(AvoidanceReport::Blocked).is_err() {
                warn!("Avoidance: report receiver is gone");
            }
            return CycleOutcome::Blocked;
        }

        self.last_pose_current = Some(pose_current);
        for pose in path.iter_mut() {
            pose.inherit_constraints(&pose_order);
        }
        if path.len() == 1 {
            return CycleOutcome::Arrived;
        }

        if path.len() > 2 && path[1].is_intermediate {
            let heading = path[1].pose.heading_to(&path[2].pose);
            path[1].pose.orientation = heading;
            path[1].allow_reverse = true;
        }

        let next = path[1];
        if let Some(last_emitted) = self.last_emitted_pose_order {
            let unchanged = if next.bypass_final_orientation {
                self.epsilon.close_position(&last_emitted.pose, &next.pose)
            } else {
                self.epsilon.close(&last_emitted.pose, &next.pose)
            };
            if unchanged {
                return CycleOutcome::Skipped(SkipReason::SamePoseOrder);
            }
        }
        if self.shared.has_new_pose_order() {
            return CycleOutcome::Skipped(SkipReason::PoseOrderChanged);
        }

        self.last_emitted_pose_order = Some(next);
        let emitted = AvoidancePath {
            path: path[1..].to_vec(),
            pose_order: next,
        };
        self.pending = Some(emitted.clone());
        CycleOutcome::Emitted(emitted)
    }

    /// Run until the shared exiting flag is raised.
    pub fn run(mut self) {
        info!(
            "Avoidance worker started for robot {}",
            self.shared.properties.robot_id()
        );
        let mut loop_start = Instant::now();
        while !self.shared.properties.exiting() {
            self.publish_pending();

            let interval = self.shared.properties.path_refresh_interval();
            let elapsed = loop_start.elapsed();
            if elapsed > interval {
                warn!(
                    "Avoidance: cycle took {:?}, longer than the {:?} refresh interval",
                    elapsed, interval
                );
            } else {
                thread::sleep(interval - elapsed);
            }
            loop_start = Instant::now();

            let outcome = self.step();
            debug!("Avoidance cycle: {:?}", outcome);
        }
        info!("Avoidance worker exiting");
    }
}

/// Handle on the avoidance worker thread.
pub struct AvoidanceWorker {
    handle: JoinHandle<()>,
    shared: Arc<SharedMemory>,
}

impl AvoidanceWorker {
    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Raise the exiting flag and wait for the thread off the async runtime.
    pub async fn stop(self) -> Result<(), PlannerError> {
        self.shared.properties.set_exiting(true);
        let handle = self.handle;
        let result = tokio::task::spawn_blocking(move || handle.join()).await;
        self.shared.properties.set_exiting(false);
        match result {
            Ok(Ok(())) => Ok(()),
            _ => Err(PlannerError::AvoidanceDied),
        }
    }
}

/// Start the avoidance worker with the visibility road map solver.
pub fn spawn_avoidance(
    shared: Arc<SharedMemory>,
    config: &AvoidanceConfig,
    reports: UnboundedSender<AvoidanceReport>,
    paths: LatestSender<AvoidancePath>,
) -> Result<AvoidanceWorker, PlannerError> {
    let solver = VisibilityRoadMap::new(
        shared.properties.table(),
        config.max_distance,
        config.expand_distance,
    );
    spawn_avoidance_with(shared, solver, config.pose_epsilon, reports, paths)
}

/// Start the avoidance worker on its own named thread with any solver.
pub fn spawn_avoidance_with<S: PathSolver + 'static>(
    shared: Arc<SharedMemory>,
    solver: S,
    epsilon: PoseEpsilon,
    reports: UnboundedSender<AvoidanceReport>,
    paths: LatestSender<AvoidancePath>,
) -> Result<AvoidanceWorker, PlannerError> {
    shared.properties.set_exiting(false);
    let avoidance = AvoidanceLoop::new(Arc::clone(&shared), solver, epsilon, reports, paths);
    let handle = thread::Builder::new()
        .name(format!("avoidance-{}", shared.properties.robot_id()))
        .spawn(move || avoidance.run())?;
    Ok(AvoidanceWorker { handle, shared })
}
