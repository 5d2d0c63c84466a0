use serde::{Deserialize, Serialize};

use crate::{
    action::ActuatorCommand,
    avoidance::{AvoidancePath, AvoidanceStrategy},
    context::{Camp, StartPosition, TableKind},
    obstacle::{Obstacle, Vertex},
    pose::{PathPose, Pose},
    strategy::StrategyKind,
};

/// Everything that mutates the planner goes through one of these.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", content = "data", rename_all = "snake_case")]
pub enum PlannerCommand {
    Play,
    Stop,
    /// step mode, only honoured while stopped with the pose reached
    Next,
    Reset,
    SetPoseStart(PathPose),
    SetPoseCurrent(Pose),
    PoseReached,
    IntermediatePoseReached,
    /// raw detections, projected to round obstacles
    SetDetectorObstacles(Vec<Vertex>),
    SetMonitorObstacles(Vec<Obstacle>),
    SetAvoidanceStrategy(AvoidanceStrategy),
    SetStrategy(StrategyKind),
    /// mirrors every action pose and the start pose, resets the game
    SetCamp(Camp),
    SetTable(TableKind),
    SetStartPosition(StartPosition),
    /// milliseconds
    SetPathRefreshInterval(u64),
    #[serde(skip)]
    AvoidancePath(AvoidancePath),
    #[serde(skip)]
    AvoidanceBlocked,
    /// seconds elapsed since the previous tick
    #[serde(skip)]
    CountdownTick(f64),
    #[serde(skip)]
    CheckAvoidance,
    Shutdown,
}

/// Everything the planner tells the outside world.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PlannerEvent {
    /// next pose for the motion layer
    PoseOrder(PathPose),
    PoseStart(PathPose),
    /// nothing left to do, reported in place of a motion pose reached
    PoseReached,
    Path(Vec<PathPose>),
    Brake,
    ActionStarted(String),
    ActionFinished(String),
    Actuator(ActuatorCommand),
    Score(i32),
    GameEnd { score: i32 },
}

impl PlannerEvent {
    /// Topic suffix the event is published under.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerEvent::PoseOrder(_) => "pose_order",
            PlannerEvent::PoseStart(_) => "pose_start",
            PlannerEvent::PoseReached => "pose_reached",
            PlannerEvent::Path(_) => "path",
            PlannerEvent::Brake => "brake",
            PlannerEvent::ActionStarted(_) => "action_started",
            PlannerEvent::ActionFinished(_) => "action_finished",
            PlannerEvent::Actuator(_) => "actuator",
            PlannerEvent::Score(_) => "score",
            PlannerEvent::GameEnd { .. } => "game_end",
        }
    }
}
