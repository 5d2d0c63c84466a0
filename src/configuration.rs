use config::Config;
use serde::Deserialize;
use std::{path::PathBuf, str, time::Duration};
use tracing::*;

use crate::{
    avoidance::AvoidanceStrategy,
    context::{Camp, StartPosition, TableKind},
    error::ErrorWrapper,
    pose::{PathPose, PoseEpsilon},
    strategy::{SelectionMode, StrategyKind},
};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub avoidance: AvoidanceConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub zenoh: PlannerZenohConfig,
}

impl AppConfig {
    pub fn load_config(config: &Option<PathBuf>) -> anyhow::Result<Self> {
        let settings = if let Some(config) = config {
            info!("Using configuration from {:?}", config);
            Config::builder()
                .add_source(config::Environment::with_prefix("APP").separator("__"))
                .add_source(config::File::with_name(
                    config
                        .to_str()
                        .ok_or_else(|| anyhow::anyhow!("Failed to convert path"))?,
                ))
                .build()?
        } else {
            info!("Using dev configuration");
            Config::builder()
                .add_source(config::Environment::with_prefix("APP").separator("__"))
                .add_source(config::File::with_name("config/settings"))
                .add_source(config::File::with_name("config/dev_settings").required(false))
                .build()?
        };

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PlannerConfig {
    pub robot_id: u8,
    /// consecutive blocked reports before the current action is interrupted
    pub blocked_threshold: u32,
    /// seconds left when end game actions are forced in
    pub force_blocked_at: f64,
    pub countdown_tick_ms: u64,
    /// how often the avoidance worker is checked for liveness
    pub supervisor_interval_ms: u64,
    pub strategy_kind: StrategyKind,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            robot_id: 1,
            blocked_threshold: 10,
            force_blocked_at: 15.0,
            countdown_tick_ms: 200,
            supervisor_interval_ms: 500,
            strategy_kind: StrategyKind::Configured,
        }
    }
}

impl PlannerConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AvoidanceConfig {
    pub path_refresh_interval_ms: u64,
    /// mm, road map nodes further from the robot are ignored
    pub max_distance: f64,
    /// mm, push of road map nodes away from obstacle polygons
    pub expand_distance: f64,
    pub pose_epsilon: PoseEpsilon,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            path_refresh_interval_ms: 200,
            max_distance: 2500.0,
            expand_distance: 10.0,
            pose_epsilon: PoseEpsilon::default(),
        }
    }
}

impl AvoidanceConfig {
    pub fn path_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.path_refresh_interval_ms)
    }
}

/// Projection of raw detections into obstacles.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ObstacleConfig {
    /// mm
    pub radius: f64,
    /// mm, half of it is added to the bounding polygon radius
    pub robot_width: f64,
    pub bb_vertices: usize,
    /// rectangle bounding box margin, ratio of the side length
    pub bb_margin: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            radius: 300.0,
            robot_width: 295.0,
            bb_vertices: 6,
            bb_margin: 0.2,
        }
    }
}

impl ObstacleConfig {
    pub fn bounding_box_radius(&self) -> f64 {
        self.radius + self.robot_width / 2.0
    }

    pub fn vertices(&self) -> usize {
        self.bb_vertices.clamp(3, 20)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub minimum_score: i32,
    /// seconds
    pub game_duration: f64,
    pub table: TableKind,
    pub camp: Camp,
    pub start_position: StartPosition,
    /// mm
    pub robot_length: f64,
    pub avoidance_strategy: AvoidanceStrategy,
    /// mm/s
    pub average_speed: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            minimum_score: 0,
            game_duration: 100.0,
            table: TableKind::Game,
            camp: Camp::Yellow,
            start_position: StartPosition::Bottom,
            robot_length: 295.0,
            avoidance_strategy: AvoidanceStrategy::NativeSolver,
            average_speed: 300.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ActionConfig {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub score: i32,
    #[serde(default = "default_true")]
    pub interruptable: bool,
    #[serde(default)]
    pub target: Option<String>,
    pub poses: Vec<PathPose>,
    #[serde(default)]
    pub min_countdown: Option<f64>,
    #[serde(default)]
    pub max_countdown: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ParkingConfig {
    pub pose: PathPose,
    #[serde(default = "default_parking_score")]
    pub score: i32,
    /// seconds left when parking becomes eligible
    #[serde(default = "default_parking_countdown")]
    pub countdown: f64,
}

fn default_true() -> bool {
    true
}

fn default_parking_score() -> i32 {
    10
}

fn default_parking_countdown() -> f64 {
    15.0
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    pub selection: SelectionMode,
    pub goap_depth: usize,
    pub can_wait: bool,
    pub wait_delay_ms: u64,
    pub actions: Vec<ActionConfig>,
    pub parking: Option<ParkingConfig>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            selection: SelectionMode::Greedy,
            goap_depth: 3,
            can_wait: true,
            wait_delay_ms: 2000,
            actions: vec![],
            parking: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PlannerZenohConfig {
    pub connect: Vec<zenoh_config::EndPoint>,
    pub listen: Vec<zenoh_config::EndPoint>,
    pub config_path: Option<String>,
    /// key expression prefix of every planner topic
    pub prefix: String,
}

impl Default for PlannerZenohConfig {
    fn default() -> Self {
        Self {
            connect: vec![],
            listen: vec![],
            config_path: None,
            prefix: "planner".to_owned(),
        }
    }
}

impl PlannerZenohConfig {
    pub fn get_zenoh_config(&self) -> anyhow::Result<zenoh::config::Config> {
        let mut config = if let Some(conf_file) = &self.config_path {
            zenoh::config::Config::from_file(conf_file).map_err(ErrorWrapper::ZenohError)?
        } else {
            zenoh::config::Config::default()
        };
        if !self.connect.is_empty() {
            config.connect.endpoints.clone_from(&self.connect);
        }
        if !self.listen.is_empty() {
            config.listen.endpoints.clone_from(&self.listen);
        }
        Ok(config)
    }

    /// Full key expression for `topic` under this robot's prefix.
    pub fn topic(&self, robot_id: u8, topic: &str) -> String {
        format!("{}/{}/{}", self.prefix, robot_id, topic)
    }
}
