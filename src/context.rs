use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{
    avoidance::AvoidanceStrategy,
    configuration::GameConfig,
    obstacle::Vertex,
    pose::{PathPose, Pose},
};

/// Table limits in mm, table centre is the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for TableBounds {
    fn default() -> Self {
        TableKind::Game.bounds()
    }
}

impl TableBounds {
    pub fn contains(&self, point: &Vertex) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableKind {
    #[default]
    Game,
    /// half table used at the workshop
    Training,
}

impl TableKind {
    pub fn bounds(&self) -> TableBounds {
        match self {
            TableKind::Game => TableBounds {
                x_min: -1000.0,
                x_max: 1000.0,
                y_min: -1500.0,
                y_max: 1500.0,
            },
            TableKind::Training => TableBounds {
                x_min: -1000.0,
                x_max: 0.0,
                y_min: -1500.0,
                y_max: 1500.0,
            },
        }
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "game" => Ok(TableKind::Game),
            "training" => Ok(TableKind::Training),
            other => Err(format!("unknown table {other}")),
        }
    }
}

/// Side of the table the robot plays from.
///
/// Poses are written for the yellow side. Blue mirrors them across the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Camp {
    Blue,
    #[default]
    Yellow,
}

impl Camp {
    pub fn adapt_y(&self, y: f64) -> f64 {
        match self {
            Camp::Yellow => y,
            Camp::Blue => -y,
        }
    }

    pub fn adapt_angle(&self, angle: f64) -> f64 {
        match self {
            Camp::Yellow => angle,
            Camp::Blue => -angle,
        }
    }

    pub fn adapt_pose(&self, mut pose: PathPose) -> PathPose {
        pose.pose.y = self.adapt_y(pose.pose.y);
        pose.pose.orientation = self.adapt_angle(pose.pose.orientation);
        pose
    }
}

impl FromStr for Camp {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "blue" => Ok(Camp::Blue),
            "yellow" => Ok(Camp::Yellow),
            other => Err(format!("unknown camp {other}")),
        }
    }
}

/// Starting areas. The main robot uses the first three, the small ones the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartPosition {
    #[default]
    Bottom,
    Top,
    Opposite,
    Pami2,
    Pami3,
    Pami4,
    Pami5,
}

impl StartPosition {
    /// Start pose for the yellow camp on the game table, before any adaptation.
    fn yellow_pose(&self, robot_length: f64, robot_width: f64, offset_x: f64) -> Pose {
        let pami_x = |slot: f64| 550.0 + 100.0 * slot + offset_x;
        let pami_y = -1350.0 - robot_length / 2.0;
        match self {
            StartPosition::Bottom => Pose::new(
                -550.0 - robot_length / 2.0,
                -100.0 - robot_width / 2.0,
                0.0,
            ),
            StartPosition::Top => Pose::new(
                550.0 + robot_length / 2.0 + offset_x,
                -900.0 - robot_width / 2.0,
                180.0,
            ),
            StartPosition::Opposite => Pose::new(
                -350.0 + robot_width / 2.0,
                1050.0 + robot_length / 2.0,
                -90.0,
            ),
            StartPosition::Pami2 => Pose::new(pami_x(0.5), pami_y, 90.0),
            StartPosition::Pami3 => Pose::new(pami_x(1.5), pami_y, 90.0),
            StartPosition::Pami4 => Pose::new(pami_x(2.5), pami_y, 90.0),
            StartPosition::Pami5 => Pose::new(pami_x(3.5), pami_y, 90.0),
        }
    }

    pub fn pose(&self, camp: Camp, table: TableKind, robot_length: f64, robot_width: f64) -> Pose {
        let offset_x = match table {
            TableKind::Game => 0.0,
            TableKind::Training => -1000.0,
        };
        let pose = self.yellow_pose(robot_length, robot_width, offset_x);
        Pose::new(pose.x, camp.adapt_y(pose.y), camp.adapt_angle(pose.orientation))
    }

    pub fn is_valid(&self, table: TableKind, robot_id: u8) -> bool {
        if table == TableKind::Training && *self == StartPosition::Opposite {
            return false;
        }
        let main_robot_area = matches!(
            self,
            StartPosition::Bottom | StartPosition::Top | StartPosition::Opposite
        );
        robot_id != 1 || main_robot_area
    }
}

impl FromStr for StartPosition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bottom" => Ok(StartPosition::Bottom),
            "top" => Ok(StartPosition::Top),
            "opposite" => Ok(StartPosition::Opposite),
            "pami2" => Ok(StartPosition::Pami2),
            "pami3" => Ok(StartPosition::Pami3),
            "pami4" => Ok(StartPosition::Pami4),
            "pami5" => Ok(StartPosition::Pami5),
            other => Err(format!("unknown start position {other}")),
        }
    }
}

/// State of one game session.
///
/// Cloned for every branch of the lookahead search, so hooks and weights must
/// only ever touch state reachable from here.
#[derive(Debug, Clone)]
pub struct GameContext {
    pub robot_id: u8,
    pub score: i32,
    pub minimum_score: i32,
    /// seconds
    pub game_duration: f64,
    /// seconds remaining
    pub countdown: f64,
    pub last_countdown: f64,
    pub playing: bool,
    pub table: TableKind,
    pub camp: Camp,
    pub start_position: StartPosition,
    /// mm, used with the obstacle robot width to place the start pose
    pub robot_length: f64,
    pub avoidance_strategy: AvoidanceStrategy,
    pub pose_current: Pose,
    /// mm/s, used to estimate travel time in simulation
    pub average_speed: f64,
    /// named game elements still worth visiting
    pub targets: BTreeMap<String, bool>,
}

impl GameContext {
    pub fn new(robot_id: u8, config: &GameConfig) -> Self {
        let mut context = Self {
            robot_id,
            score: config.minimum_score,
            minimum_score: config.minimum_score,
            game_duration: config.game_duration,
            countdown: config.game_duration,
            last_countdown: config.game_duration,
            playing: false,
            table: config.table,
            camp: config.camp,
            start_position: config.start_position,
            robot_length: config.robot_length,
            avoidance_strategy: config.avoidance_strategy,
            pose_current: Pose::default(),
            average_speed: config.average_speed,
            targets: BTreeMap::new(),
        };
        context.reset();
        context
    }

    pub fn reset(&mut self) {
        self.score = self.minimum_score;
        self.countdown = self.game_duration;
        self.last_countdown = self.game_duration;
        self.playing = false;
        self.targets.clear();
    }

    pub fn table_bounds(&self) -> TableBounds {
        self.table.bounds()
    }

    pub fn target_enabled(&self, name: &str) -> bool {
        self.targets.get(name).copied().unwrap_or(false)
    }

    pub fn set_target(&mut self, name: &str, enabled: bool) {
        self.targets.insert(name.to_owned(), enabled);
    }

    pub fn start_pose(&self, robot_width: f64) -> Pose {
        self.start_position
            .pose(self.camp, self.table, self.robot_length, robot_width)
    }

    pub fn time_elapsed(&self) -> f64 {
        self.game_duration - self.countdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_countdown_and_score() {
        let mut context = GameContext::new(1, &GameConfig::default());
        context.score = 42;
        context.countdown = 3.0;
        context.playing = true;
        context.set_target("crate", true);
        context.reset();
        assert_eq!(context.score, context.minimum_score);
        assert_eq!(context.countdown, context.game_duration);
        assert!(!context.playing);
        assert!(!context.target_enabled("crate"));
    }

    #[test]
    fn blue_camp_mirrors_y_and_angle() {
        let pose = PathPose::new(600.0, 1000.0, 90.0).with_speeds(40.0, 30.0);
        assert_eq!(Camp::Yellow.adapt_pose(pose), pose);
        let mirrored = Camp::Blue.adapt_pose(pose);
        assert_eq!(mirrored.pose, Pose::new(600.0, -1000.0, -90.0));
        assert_eq!(mirrored.max_speed_linear, 40.0);
        assert_eq!("BLUE".parse::<Camp>(), Ok(Camp::Blue));
        assert_eq!(Camp::default(), Camp::Yellow);
    }

    #[test]
    fn start_pose_follows_camp_and_table() {
        let top = StartPosition::Top;
        assert_eq!(
            top.pose(Camp::Yellow, TableKind::Game, 300.0, 200.0),
            Pose::new(700.0, -1000.0, 180.0)
        );
        assert_eq!(
            top.pose(Camp::Blue, TableKind::Game, 300.0, 200.0),
            Pose::new(700.0, 1000.0, -180.0)
        );
        assert_eq!(
            top.pose(Camp::Yellow, TableKind::Training, 300.0, 200.0).x,
            -300.0
        );
        assert_eq!(
            StartPosition::Opposite.pose(Camp::Yellow, TableKind::Game, 300.0, 200.0),
            Pose::new(-250.0, 1200.0, -90.0)
        );
    }

    #[test]
    fn start_position_validity() {
        assert!(StartPosition::Opposite.is_valid(TableKind::Game, 1));
        assert!(!StartPosition::Opposite.is_valid(TableKind::Training, 1));
        assert!(!StartPosition::Pami2.is_valid(TableKind::Game, 1));
        assert!(StartPosition::Pami2.is_valid(TableKind::Game, 2));
        assert_eq!("pami3".parse::<StartPosition>(), Ok(StartPosition::Pami3));
    }

    #[test]
    fn table_kind_from_str() {
        assert_eq!("Training".parse::<TableKind>(), Ok(TableKind::Training));
        assert!("moon".parse::<TableKind>().is_err());
        assert!(TableKind::Game
            .bounds()
            .contains(&Vertex::new(0.0, 1400.0)));
        assert!(!TableKind::Training
            .bounds()
            .contains(&Vertex::new(500.0, 0.0)));
    }
}
