use std::time::Duration;
use tracing::{debug, info};

use super::{Action, ActionBehavior, HookContext};
use crate::{context::GameContext, pose::PathPose};

/// Visit poses and score points when done.
///
/// The optional target is claimed before the first pose and given back on
/// recycle, so a second action on the same target is ineligible meanwhile.
#[derive(Debug, Clone)]
pub struct ScoredAction {
    pub weight: f64,
    pub score: i32,
    pub target: Option<String>,
    /// eligible only while countdown is at least this
    pub min_countdown: Option<f64>,
    /// eligible only while countdown is at most this
    pub max_countdown: Option<f64>,
}

impl ScoredAction {
    pub fn new(weight: f64, score: i32) -> Self {
        Self {
            weight,
            score,
            target: None,
            min_countdown: None,
            max_countdown: None,
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_owned());
        self
    }

    pub fn with_countdown_window(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_countdown = min;
        self.max_countdown = max;
        self
    }
}

impl ActionBehavior for ScoredAction {
    fn weight(&self, game: &GameContext) -> f64 {
        if self.min_countdown.is_some_and(|min| game.countdown < min) {
            return 0.0;
        }
        if self.max_countdown.is_some_and(|max| game.countdown > max) {
            return 0.0;
        }
        if let Some(target) = &self.target {
            if game.targets.get(target) == Some(&false) {
                return 0.0;
            }
        }
        self.weight
    }

    fn before_action(&mut self, context: &mut HookContext<'_>) {
        if let Some(target) = &self.target {
            context.game.set_target(target, false);
        }
    }

    fn after_action(&mut self, context: &mut HookContext<'_>) {
        context.game.score += self.score;
        debug!("Score is now {}", context.game.score);
    }

    fn recycle(&mut self, context: &mut HookContext<'_>) {
        if let Some(target) = &self.target {
            context.game.set_target(target, true);
        }
    }

    fn clone_box(&self) -> Box<dyn ActionBehavior> {
        Box::new(self.clone())
    }
}

/// Used when nothing else is eligible. Waits, re-arms recycled actions and
/// queues another wait.
#[derive(Debug, Clone)]
pub struct WaitAction {
    pub delay: Duration,
}

impl WaitAction {
    pub const NAME: &'static str = "Wait action";

    pub fn action(delay: Duration) -> Action {
        Action::new(Self::NAME, WaitAction { delay })
    }
}

impl ActionBehavior for WaitAction {
    fn weight(&self, _game: &GameContext) -> f64 {
        1.0
    }

    fn after_action(&mut self, context: &mut HookContext<'_>) {
        context.execution.sleep(self.delay);
        context.strategy.amnesty();
        context.strategy.push(WaitAction::action(self.delay));
    }

    fn clone_box(&self) -> Box<dyn ActionBehavior> {
        Box::new(self.clone())
    }
}

/// End of game parking. Clears the remaining actions when started and puts
/// them back if interrupted.
#[derive(Clone)]
pub struct ParkingAction {
    pub score: i32,
    /// eligible once countdown is at most this
    pub countdown: f64,
    backup: Vec<Action>,
}

impl ParkingAction {
    pub fn action(pose: PathPose, score: i32, countdown: f64) -> Action {
        Action::new(
            &format!("Parking action at ({}, {})", pose.x() as i64, pose.y() as i64),
            ParkingAction {
                score,
                countdown,
                backup: vec![],
            },
        )
        .with_poses([pose.with_allow_reverse(false)])
        .with_interruptable(false)
    }
}

impl ActionBehavior for ParkingAction {
    fn weight(&self, game: &GameContext) -> f64 {
        if game.countdown > self.countdown {
            return 0.0;
        }
        9_999_000.0
    }

    fn before_action(&mut self, context: &mut HookContext<'_>) {
        self.backup = context.strategy.drain();
    }

    fn after_action(&mut self, context: &mut HookContext<'_>) {
        context.game.score += self.score;
        if !context.execution.is_simulated() {
            info!("Robot parked, score {}", context.game.score);
        }
        context.strategy.drain();
        self.backup.clear();
    }

    fn recycle(&mut self, context: &mut HookContext<'_>) {
        for action in self.backup.drain(..) {
            context.strategy.push(action);
        }
    }

    fn clone_box(&self) -> Box<dyn ActionBehavior> {
        Box::new(self.clone())
    }
}

/// Bench motion test. Runs its poses then queues itself again.
#[derive(Debug, Clone)]
pub struct PatrolAction {
    poses: Vec<PathPose>,
}

impl PatrolAction {
    pub fn action(name: &str, poses: Vec<PathPose>) -> Action {
        Action::new(
            name,
            PatrolAction {
                poses: poses.clone(),
            },
        )
        .with_poses(poses)
    }
}

impl ActionBehavior for PatrolAction {
    fn weight(&self, _game: &GameContext) -> f64 {
        1_000_000.0
    }

    fn after_action(&mut self, context: &mut HookContext<'_>) {
        context
            .strategy
            .push(PatrolAction::action("Patrol action", self.poses.clone()));
    }

    fn clone_box(&self) -> Box<dyn ActionBehavior> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::ExecutionContext, configuration::GameConfig, strategy::Strategy};

    fn game() -> GameContext {
        GameContext::new(1, &GameConfig::default())
    }

    #[test]
    fn scored_action_claims_and_returns_target() {
        let mut game = game();
        let mut strategy = Strategy::default();
        let mut execution = ExecutionContext::real();
        let mut action = Action::new("crate", ScoredAction::new(10.0, 4).with_target("crate"));
        assert_eq!(action.weight(&game), 10.0);

        let mut context = HookContext {
            game: &mut game,
            execution: &mut execution,
            strategy: &mut strategy,
        };
        action.before_action(&mut context);
        assert_eq!(action.weight(&*context.game), 0.0);
        action.recycle(&mut context);
        assert!(action.recycled);
        assert_eq!(action.weight(&*context.game), 10.0);
    }

    #[test]
    fn scored_action_countdown_window() {
        let mut game = game();
        let action = Action::new(
            "late",
            ScoredAction::new(5.0, 1).with_countdown_window(None, Some(30.0)),
        );
        assert_eq!(action.weight(&game), 0.0);
        game.countdown = 20.0;
        assert_eq!(action.weight(&game), 5.0);
    }

    #[test]
    fn wait_action_rearms_pool() {
        let mut game = game();
        let mut strategy = Strategy::default();
        let mut recycled = Action::new("a", ScoredAction::new(1.0, 1));
        recycled.recycled = true;
        strategy.push(recycled);

        let wait = WaitAction::action(Duration::from_secs(2));
        let evaluation = wait.evaluate(&mut game, &mut strategy);
        assert_eq!(evaluation.hook_time, Duration::from_secs(2));
        assert_eq!(strategy.len(), 2);
        assert!(strategy.iter().all(|a| !a.recycled));
        assert!(strategy.iter().any(|a| a.name == WaitAction::NAME));
    }

    #[test]
    fn parking_clears_and_restores_strategy() {
        let mut game = game();
        let mut strategy = Strategy::default();
        strategy.push(Action::new("a", ScoredAction::new(1.0, 1)));
        let mut execution = ExecutionContext::real();
        let mut parking = ParkingAction::action(PathPose::new(0.0, 0.0, 0.0), 10, 15.0);
        assert!(!parking.interruptable);
        assert_eq!(parking.weight(&game), 0.0);
        game.countdown = 10.0;
        assert!(parking.weight(&game) > 0.0);

        let mut context = HookContext {
            game: &mut game,
            execution: &mut execution,
            strategy: &mut strategy,
        };
        parking.before_action(&mut context);
        assert!(context.strategy.is_empty());
        parking.recycle(&mut context);
        assert_eq!(context.strategy.len(), 1);
    }

    #[test]
    fn parking_scores_on_completion() {
        let mut game = game();
        game.countdown = 10.0;
        let mut strategy = Strategy::default();
        strategy.push(Action::new("a", ScoredAction::new(1.0, 1)));
        let parking = ParkingAction::action(PathPose::new(0.0, 0.0, 0.0), 10, 15.0);
        parking.evaluate(&mut game, &mut strategy);
        assert_eq!(game.score, game.minimum_score + 10);
        assert!(strategy.is_empty());
    }
}
