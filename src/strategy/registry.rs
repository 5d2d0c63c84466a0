use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Strategy;
use crate::{
    action::{Action, ParkingAction, PatrolAction, ScoredAction},
    configuration::{ActionConfig, StrategyConfig},
    context::Camp,
    error::PlannerError,
    pose::PathPose,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// actions listed in the settings file
    #[default]
    Configured,
    /// bench test driving a 500 mm square
    Square,
    /// bench test driving between two poses
    BackAndForth,
}

impl FromStr for StrategyKind {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "configured" => Ok(StrategyKind::Configured),
            "square" => Ok(StrategyKind::Square),
            "backandforth" | "back_and_forth" => Ok(StrategyKind::BackAndForth),
            _ => Err(PlannerError::UnknownStrategy(value.to_owned())),
        }
    }
}

impl ActionConfig {
    /// Build the action with its poses mirrored for `camp`.
    pub fn build(&self, camp: Camp) -> Action {
        let mut behavior = ScoredAction::new(self.weight, self.score)
            .with_countdown_window(self.min_countdown, self.max_countdown);
        if let Some(target) = &self.target {
            behavior = behavior.with_target(target);
        }
        Action::new(&self.name, behavior)
            .with_poses(self.poses.iter().map(|pose| camp.adapt_pose(*pose)))
            .with_interruptable(self.interruptable)
    }
}

/// Fill a new pool for `kind`, poses adapted to `camp`.
pub fn build_strategy(kind: StrategyKind, config: &StrategyConfig, camp: Camp) -> Strategy {
    let actions = match kind {
        StrategyKind::Configured => {
            let mut actions: Vec<Action> = config
                .actions
                .iter()
                .map(|action| action.build(camp))
                .collect();
            if let Some(parking) = &config.parking {
                actions.push(ParkingAction::action(
                    camp.adapt_pose(parking.pose),
                    parking.score,
                    parking.countdown,
                ));
            }
            actions
        }
        StrategyKind::Square => vec![PatrolAction::action(
            "Square action",
            [
                PathPose::new(-250.0, -250.0, 0.0),
                PathPose::new(250.0, -250.0, 90.0),
                PathPose::new(250.0, 250.0, 180.0),
                PathPose::new(-250.0, 250.0, -90.0),
            ]
            .into_iter()
            .map(|pose| camp.adapt_pose(pose))
            .collect(),
        )],
        StrategyKind::BackAndForth => vec![PatrolAction::action(
            "Back and forth action",
            [
                PathPose::new(-500.0, 0.0, 0.0),
                PathPose::new(500.0, 0.0, 0.0),
            ]
            .into_iter()
            .map(|pose| camp.adapt_pose(pose))
            .collect(),
        )],
    };
    Strategy::new(actions, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ParkingConfig;

    #[test]
    fn configured_strategy_reads_actions_and_parking() {
        let config = StrategyConfig {
            actions: vec![ActionConfig {
                name: "crate".to_owned(),
                weight: 5.0,
                score: 3,
                interruptable: false,
                target: Some("crate".to_owned()),
                poses: vec![PathPose::new(100.0, 200.0, 0.0)],
                min_countdown: None,
                max_countdown: None,
            }],
            parking: Some(ParkingConfig {
                pose: PathPose::new(0.0, 0.0, 90.0),
                score: 10,
                countdown: 15.0,
            }),
            ..StrategyConfig::default()
        };
        let strategy = build_strategy(StrategyKind::Configured, &config, Camp::Yellow);
        assert_eq!(strategy.len(), 2);
        let names: Vec<_> = strategy.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["crate", "Parking action at (0, 0)"]);
        assert!(!strategy.iter().next().unwrap().interruptable);

        let blue = build_strategy(StrategyKind::Configured, &config, Camp::Blue);
        let crate_action = blue.iter().next().unwrap();
        assert_eq!(
            crate_action.poses[0].pose,
            PathPose::new(100.0, -200.0, 0.0)
        );
        let parking = blue.iter().nth(1).unwrap();
        assert_eq!(parking.poses[0].pose.orientation(), -90.0);
    }

    #[test]
    fn kind_from_str() {
        assert_eq!(
            "back_and_forth".parse::<StrategyKind>().unwrap(),
            StrategyKind::BackAndForth
        );
        assert!(matches!(
            "dance".parse::<StrategyKind>(),
            Err(PlannerError::UnknownStrategy(_))
        ));
    }
}
